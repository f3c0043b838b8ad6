//! Record change notifications
//!
//! Services report every write through an [`EventSink`]. The core never
//! depends on what the sink does with it.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use super::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Book,
    Contact,
    Category,
    Stage,
    Loan,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Book => "book",
            EntityKind::Contact => "contact",
            EntityKind::Category => "category",
            EntityKind::Stage => "stage",
            EntityKind::Loan => "loan",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::Created => "create",
            ChangeKind::Updated => "update",
            ChangeKind::Deleted => "delete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordChange {
    pub entity: EntityKind,
    pub id: i32,
    pub change: ChangeKind,
    /// Names of the fields written; empty for deletions
    pub fields: Vec<String>,
}

impl RecordChange {
    pub fn created(entity: EntityKind, id: i32) -> Self {
        Self {
            entity,
            id,
            change: ChangeKind::Created,
            fields: Vec::new(),
        }
    }

    pub fn updated(entity: EntityKind, id: i32, fields: &[&str]) -> Self {
        Self {
            entity,
            id,
            change: ChangeKind::Updated,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    pub fn deleted(entity: EntityKind, id: i32) -> Self {
        Self {
            entity,
            id,
            change: ChangeKind::Deleted,
            fields: Vec::new(),
        }
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_record_changed(&self, change: RecordChange) -> Result<(), DomainError>;
}

/// Logs each change through `tracing`
pub struct TracingEventSink;

#[async_trait]
impl EventSink for TracingEventSink {
    async fn on_record_changed(&self, change: RecordChange) -> Result<(), DomainError> {
        tracing::info!(
            entity = change.entity.as_str(),
            id = change.id,
            change = change.change.as_str(),
            fields = ?change.fields,
            "record changed"
        );
        Ok(())
    }
}

pub struct NoopEventSink;

#[async_trait]
impl EventSink for NoopEventSink {
    async fn on_record_changed(&self, _change: RecordChange) -> Result<(), DomainError> {
        Ok(())
    }
}
