//! SeaORM implementation of CategoryRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, sea_query::Expr,
};

use crate::domain::{
    Category, CategoryFilter, CategoryRepository, CreateCategoryInput, DomainError,
};
use crate::models::book_categories;
use crate::models::category::{ActiveModel, Column, Entity as CategoryEntity, Model};

pub struct SeaOrmCategoryRepository {
    db: DatabaseConnection,
}

impl SeaOrmCategoryRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<Model> for Category {
    fn from(model: Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            code: model.code,
            parent_id: model.parent_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[async_trait]
impl CategoryRepository for SeaOrmCategoryRepository {
    async fn find_all(&self, filter: CategoryFilter) -> Result<Vec<Category>, DomainError> {
        let mut query = CategoryEntity::find();

        if let Some(name) = filter.name {
            query = query.filter(Column::Name.eq(name));
        }
        if let Some(code) = filter.code {
            query = query.filter(Column::Code.eq(code));
        }
        if let Some(parent_id) = filter.parent_id {
            query = query.filter(Column::ParentId.eq(parent_id));
        }

        let categories = query.order_by_asc(Column::Name).all(&self.db).await?;
        Ok(categories.into_iter().map(Category::from).collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError> {
        let category = CategoryEntity::find_by_id(id).one(&self.db).await?;
        Ok(category.map(Category::from))
    }

    async fn create(&self, input: CreateCategoryInput) -> Result<Category, DomainError> {
        let now = chrono::Utc::now().to_rfc3339();

        let category = ActiveModel {
            name: Set(input.name),
            code: Set(input.code),
            parent_id: Set(input.parent_id),
            created_at: Set(now.clone()),
            updated_at: Set(now),
            ..Default::default()
        };

        let model = category.insert(&self.db).await?;
        Ok(Category::from(model))
    }

    async fn update(&self, category: Category) -> Result<Category, DomainError> {
        let existing = CategoryEntity::find_by_id(category.id)
            .one(&self.db)
            .await?
            .ok_or(DomainError::NotFound)?;

        let mut active: ActiveModel = existing.into();
        active.name = Set(category.name);
        active.code = Set(category.code);
        active.parent_id = Set(category.parent_id);
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let model = active.update(&self.db).await?;
        Ok(Category::from(model))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let txn = self.db.begin().await?;

        CategoryEntity::update_many()
            .col_expr(Column::ParentId, Expr::value(Option::<i32>::None))
            .filter(Column::ParentId.eq(id))
            .exec(&txn)
            .await?;
        book_categories::Entity::delete_many()
            .filter(book_categories::Column::CategoryId.eq(id))
            .exec(&txn)
            .await?;
        let result = CategoryEntity::delete_by_id(id).exec(&txn).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }
}
