//! Event sink persisting record changes to `operation_log`

use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};

use crate::domain::{DomainError, EventSink, RecordChange};
use crate::models::operation_log;

pub struct OperationLogSink {
    db: DatabaseConnection,
}

impl OperationLogSink {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl EventSink for OperationLogSink {
    async fn on_record_changed(&self, change: RecordChange) -> Result<(), DomainError> {
        let payload = if change.fields.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(&change.fields)
                    .map_err(|e| DomainError::Internal(e.to_string()))?,
            )
        };

        let entry = operation_log::ActiveModel {
            entity_type: Set(change.entity.as_str().to_owned()),
            entity_id: Set(change.id),
            operation: Set(change.change.as_str().to_owned()),
            payload: Set(payload),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            ..Default::default()
        };
        entry.insert(&self.db).await?;

        Ok(())
    }
}
