//! SeaORM implementation of BookRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;

use crate::domain::{Book, BookFilter, BookRepository, CreateBookInput, DomainError};
use crate::models::book::{ActiveModel, Column, Entity as BookEntity, Model};
use crate::models::{book_categories, loan};

/// SeaORM-based implementation of BookRepository
pub struct SeaOrmBookRepository {
    db: DatabaseConnection,
}

impl SeaOrmBookRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_book(model: Model, category_ids: Vec<i32>) -> Book {
    Book {
        id: model.id,
        title: model.title,
        isbn: model.isbn,
        pages: model.pages,
        description: model.description,
        total_copies: model.total_copies,
        author_id: model.author_id,
        category_ids,
        stage_id: model.stage_id,
        date_published: model.date_published,
        active: model.active,
        color: model.color,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Category ids per book, sorted
async fn category_ids_by_book<C: ConnectionTrait>(
    conn: &C,
    book_ids: Vec<i32>,
) -> Result<HashMap<i32, Vec<i32>>, DbErr> {
    let mut map: HashMap<i32, Vec<i32>> = HashMap::new();
    if book_ids.is_empty() {
        return Ok(map);
    }

    let links = book_categories::Entity::find()
        .filter(book_categories::Column::BookId.is_in(book_ids))
        .all(conn)
        .await?;

    for link in links {
        map.entry(link.book_id).or_default().push(link.category_id);
    }
    for ids in map.values_mut() {
        ids.sort_unstable();
    }
    Ok(map)
}

async fn replace_categories<C: ConnectionTrait>(
    conn: &C,
    book_id: i32,
    category_ids: &[i32],
) -> Result<(), DbErr> {
    book_categories::Entity::delete_many()
        .filter(book_categories::Column::BookId.eq(book_id))
        .exec(conn)
        .await?;

    let mut ids = category_ids.to_vec();
    ids.sort_unstable();
    ids.dedup();

    for category_id in ids {
        let link = book_categories::ActiveModel {
            book_id: Set(book_id),
            category_id: Set(category_id),
        };
        book_categories::Entity::insert(link)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

async fn insert_book<C: ConnectionTrait>(conn: &C, input: CreateBookInput) -> Result<Book, DbErr> {
    let now = chrono::Utc::now().to_rfc3339();

    let new_book = ActiveModel {
        title: Set(input.title),
        isbn: Set(input.isbn),
        pages: Set(input.pages),
        description: Set(input.description),
        total_copies: Set(input.total_copies),
        author_id: Set(input.author_id),
        stage_id: Set(input.stage_id),
        date_published: Set(input.date_published),
        active: Set(true),
        color: Set(0),
        created_at: Set(now.clone()),
        updated_at: Set(now),
        ..Default::default()
    };

    let model = new_book.insert(conn).await?;
    replace_categories(conn, model.id, &input.category_ids).await?;

    let mut category_ids = input.category_ids;
    category_ids.sort_unstable();
    category_ids.dedup();
    Ok(to_book(model, category_ids))
}

#[async_trait]
impl BookRepository for SeaOrmBookRepository {
    async fn find_all(&self, filter: BookFilter) -> Result<Vec<Book>, DomainError> {
        let mut query = BookEntity::find();

        if let Some(title) = &filter.title
            && !title.is_empty()
        {
            query = query.filter(Column::Title.contains(title));
        }
        if let Some(isbn) = filter.isbn {
            query = query.filter(Column::Isbn.eq(isbn));
        }
        if let Some(author_id) = filter.author_id {
            query = query.filter(Column::AuthorId.eq(author_id));
        }
        if let Some(stage_id) = filter.stage_id {
            query = query.filter(Column::StageId.eq(stage_id));
        }
        if let Some(active) = filter.active {
            query = query.filter(Column::Active.eq(active));
        }
        if let Some(category_id) = filter.category_id {
            let book_ids: Vec<i32> = book_categories::Entity::find()
                .filter(book_categories::Column::CategoryId.eq(category_id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|link| link.book_id)
                .collect();
            query = query.filter(Column::Id.is_in(book_ids));
        }

        let models = query.order_by_asc(Column::Title).all(&self.db).await?;

        let mut categories =
            category_ids_by_book(&self.db, models.iter().map(|m| m.id).collect()).await?;

        Ok(models
            .into_iter()
            .map(|m| {
                let ids = categories.remove(&m.id).unwrap_or_default();
                to_book(m, ids)
            })
            .collect())
    }

    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError> {
        let Some(model) = BookEntity::find_by_id(id).one(&self.db).await? else {
            return Ok(None);
        };

        let mut categories = category_ids_by_book(&self.db, vec![id]).await?;
        Ok(Some(to_book(
            model,
            categories.remove(&id).unwrap_or_default(),
        )))
    }

    async fn create(&self, input: CreateBookInput) -> Result<Book, DomainError> {
        let txn = self.db.begin().await?;
        let book = insert_book(&txn, input).await?;
        txn.commit().await?;
        Ok(book)
    }

    async fn create_many(&self, inputs: Vec<CreateBookInput>) -> Result<Vec<Book>, DomainError> {
        let txn = self.db.begin().await?;

        let mut books = Vec::with_capacity(inputs.len());
        for input in inputs {
            books.push(insert_book(&txn, input).await?);
        }

        txn.commit().await?;
        Ok(books)
    }

    async fn update(&self, book: Book) -> Result<Book, DomainError> {
        if BookEntity::find_by_id(book.id).one(&self.db).await?.is_none() {
            return Err(DomainError::NotFound);
        }

        let txn = self.db.begin().await?;

        let active = ActiveModel {
            id: Set(book.id),
            title: Set(book.title),
            isbn: Set(book.isbn),
            pages: Set(book.pages),
            description: Set(book.description),
            total_copies: Set(book.total_copies),
            author_id: Set(book.author_id),
            stage_id: Set(book.stage_id),
            date_published: Set(book.date_published),
            active: Set(book.active),
            color: Set(book.color),
            created_at: Set(book.created_at),
            updated_at: Set(chrono::Utc::now().to_rfc3339()),
        };
        let model = active.update(&txn).await?;
        replace_categories(&txn, model.id, &book.category_ids).await?;

        txn.commit().await?;

        let mut category_ids = book.category_ids;
        category_ids.sort_unstable();
        category_ids.dedup();
        Ok(to_book(model, category_ids))
    }

    async fn delete(&self, id: i32) -> Result<(), DomainError> {
        let txn = self.db.begin().await?;

        loan::Entity::delete_many()
            .filter(loan::Column::BookId.eq(id))
            .exec(&txn)
            .await?;
        book_categories::Entity::delete_many()
            .filter(book_categories::Column::BookId.eq(id))
            .exec(&txn)
            .await?;
        let result = BookEntity::delete_by_id(id).exec(&txn).await?;

        if result.rows_affected == 0 {
            return Err(DomainError::NotFound);
        }

        txn.commit().await?;
        Ok(())
    }
}
