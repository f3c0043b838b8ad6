//! Stage Service - Book workflow stages
//!
//! At most one stage is the default. Saving a stage as default moves the
//! flag to it; the previous default is cleared in the same transaction.

use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{
    BookFilter, CreateStageInput, DomainError, EntityKind, RecordChange, Stage, StageFilter,
    UpdateStageInput,
};
use crate::infrastructure::AppState;

#[derive(Debug, Clone, Serialize)]
pub struct StageView {
    #[serde(flatten)]
    pub stage: Stage,
    pub book_count: usize,
}

async fn validate_stage(
    state: &AppState,
    name: &str,
    code: &str,
    own_id: Option<i32>,
) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("Stage name is required"));
    }
    if code.trim().is_empty() {
        return Err(DomainError::validation("Stage code is required"));
    }

    let same_code = state
        .stage_repo
        .find_all(StageFilter {
            code: Some(code.to_string()),
            ..Default::default()
        })
        .await?;
    if same_code.iter().any(|s| Some(s.id) != own_id) {
        return Err(DomainError::validation(format!(
            "Stage code '{}' already exists",
            code
        )));
    }
    Ok(())
}

pub async fn create_stage(state: &AppState, input: CreateStageInput) -> Result<Stage, DomainError> {
    validate_stage(state, &input.name, &input.code, None).await?;

    let stage = state.stage_repo.create(input).await?;
    tracing::info!(
        "Stage {} created: {} (default={})",
        stage.id,
        stage.code,
        stage.is_default
    );

    state
        .notify(RecordChange::created(EntityKind::Stage, stage.id))
        .await;
    Ok(stage)
}

pub async fn update_stage(
    state: &AppState,
    id: i32,
    input: UpdateStageInput,
) -> Result<Stage, DomainError> {
    let mut stage = state
        .stage_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let mut fields = Vec::new();

    if let Some(name) = input.name {
        stage.name = name;
        fields.push("name");
    }
    if let Some(code) = input.code {
        stage.code = code;
        fields.push("code");
    }
    if let Some(description) = input.description {
        stage.description = description;
        fields.push("description");
    }
    if let Some(sequence) = input.sequence {
        stage.sequence = sequence;
        fields.push("sequence");
    }
    if let Some(fold) = input.fold {
        stage.fold = fold;
        fields.push("fold");
    }
    if let Some(is_default) = input.is_default {
        stage.is_default = is_default;
        fields.push("is_default");
    }

    validate_stage(state, &stage.name, &stage.code, Some(id)).await?;

    let stage = state.stage_repo.update(stage).await?;
    if stage.is_default {
        tracing::info!("Stage {} is now the default stage", stage.code);
    }

    state
        .notify(RecordChange::updated(EntityKind::Stage, stage.id, &fields))
        .await;
    Ok(stage)
}

/// The stage given to new books, if one is flagged
pub async fn default_stage(state: &AppState) -> Result<Option<Stage>, DomainError> {
    let mut defaults = state
        .stage_repo
        .find_all(StageFilter {
            is_default: Some(true),
            ..Default::default()
        })
        .await?;
    Ok(if defaults.is_empty() {
        None
    } else {
        Some(defaults.remove(0))
    })
}

pub async fn get_stage(state: &AppState, id: i32) -> Result<StageView, DomainError> {
    let stage = state
        .stage_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let books = state
        .book_repo
        .find_all(BookFilter {
            stage_id: Some(id),
            ..Default::default()
        })
        .await?;

    Ok(StageView {
        stage,
        book_count: books.len(),
    })
}

/// List stages with their book counts, ordered by sequence then name
pub async fn list_stages(
    state: &AppState,
    filter: StageFilter,
) -> Result<Vec<StageView>, DomainError> {
    let stages = state.stage_repo.find_all(filter).await?;

    let mut counts: HashMap<i32, usize> = HashMap::new();
    for book in state.book_repo.find_all(BookFilter::default()).await? {
        if let Some(stage_id) = book.stage_id {
            *counts.entry(stage_id).or_insert(0) += 1;
        }
    }

    Ok(stages
        .into_iter()
        .map(|stage| StageView {
            book_count: counts.get(&stage.id).copied().unwrap_or(0),
            stage,
        })
        .collect())
}

/// Delete a stage no book is in
pub async fn delete_stage(state: &AppState, id: i32) -> Result<(), DomainError> {
    let view = get_stage(state, id).await?;
    if view.book_count > 0 {
        return Err(DomainError::validation(format!(
            "Cannot delete stage '{}': {} book(s) are in it",
            view.stage.name, view.book_count
        )));
    }

    state.stage_repo.delete(id).await?;
    tracing::info!("Stage {} deleted", view.stage.code);

    state
        .notify(RecordChange::deleted(EntityKind::Stage, id))
        .await;
    Ok(())
}
