use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub title: String,
    #[sea_orm(unique)]
    pub isbn: Option<String>,
    pub pages: Option<i32>,
    pub description: Option<String>,
    pub total_copies: i32,
    pub author_id: Option<i32>,
    pub stage_id: Option<i32>,
    pub date_published: Option<Date>,
    pub active: bool,
    pub color: i32,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::contact::Entity",
        from = "Column::AuthorId",
        to = "super::contact::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    Author,
    #[sea_orm(
        belongs_to = "super::stage::Entity",
        from = "Column::StageId",
        to = "super::stage::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    Stage,
    #[sea_orm(has_many = "super::loan::Entity")]
    Loans,
}

impl Related<super::contact::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl Related<super::stage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stage.def()
    }
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loans.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        super::book_categories::Relation::Category.def()
    }

    fn via() -> Option<RelationDef> {
        Some(super::book_categories::Relation::Book.def().rev())
    }
}

impl ActiveModelBehavior for ActiveModel {}
