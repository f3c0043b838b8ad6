//! SeaORM implementation of StageRepository
//!
//! The single-default rule is applied inside the write transaction: every
//! other default is cleared before the new one is stored, so the partial
//! unique index on `is_default` never sees two defaults.

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait, sea_query::Expr,
};

use crate::domain::{CreateStageInput, DomainError, Stage, StageFilter, StageRepository};
use crate::models::stage::{ActiveModel, Column, Entity as StageEntity, Model};

pub struct SeaOrmStageRepository {
    db: DatabaseConnection,
}

impl SeaOrmStageRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<Model> for Stage {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            description: model.description,
            sequence: model.sequence,
            fold: model.fold,
            is_default: model.is_default,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Clear the default flag on every stage except `keep`
async fn clear_defaults<C: ConnectionTrait>(conn: &C, keep: Option<i32>) -> Result<u64, DbErr> {
    let mut update = StageEntity::update_many()
        .col_expr(Column::IsDefault, Expr::value(false))
        .filter(Column::IsDefault.eq(true));
    if let Some(id) = keep {
        update = update.filter(Column::Id.ne(id));
    }
    let result = update.exec(conn).await?;
    Ok(result.rows_affected)
}

#[async_trait]
impl StageRepository for SeaOrmStageRepository {
    async fn find_all(&self, filter: StageFilter) -> Result<Vec<Stage>, DomainError> {
        let mut query = StageEntity::find();

        if let Some(code) = filter.code {
            query = query.filter(Column::Code.eq(code));
        }
        if let Some(is_default) = filter.is_default {
            query = query.filter(Column::IsDefault.eq(is_default));
        }

        let stages = query
            .order_by_asc(Column::Sequence)
            .order_by_asc(Column::Name)
            .all(&self.db)
            .await?;
        Ok(stages.into_iter().map(Stage::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Stage>, DomainError> {
        let stage = StageEntity::find_by_id(id).one(&self.db).await?;
        Ok(stage.map(Stage::from))
    }

    async fn create(&self, input: CreateStageInput) -> Result<Stage, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();
        let txn = self.db.begin().await?;

        if input.is_default {
            let cleared = clear_defaults(&txn, None).await?;
            tracing::debug!("Cleared {} previous default stage(s)", cleared);
        }

        let stage = ActiveModel {
            name: Set(input.name),
            code: Set(input.code),
            description: Set(input.description),
            sequence: Set(input.sequence),
            fold: Set(input.fold),
            is_default: Set(input.is_default),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };
        let model = stage.insert(&txn).await?;

        txn.commit().await?;
        Ok(Stage::from(model))
    }

    async fn update(&self, stage: Stage) -> Result<Stage, DomainError> {
        let txn = self.db.begin().await?;

        let existing = StageEntity::find_by_id(stage.id)
            .one(&txn)
            .await?
            .ok_or(DomainError::NotFound)?;

        if stage.is_default {
            let cleared = clear_defaults(&txn, Some(stage.id)).await?;
            tracing::debug!("Cleared {} previous default stage(s)", cleared);
        }

        let mut active: ActiveModel = existing.into();
        active.name = Set(stage.name);
        active.code = Set(stage.code);
        active.description = Set(stage.description);
        active.sequence = Set(stage.sequence);
        active.fold = Set(stage.fold);
        active.is_default = Set(stage.is_default);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());
        let model = active.update(&txn).await?;

        txn.commit().await?;
        Ok(Stage::from(model))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let result = StageEntity::delete_by_id(id).exec(&self.db).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        Ok(())
    }
}
