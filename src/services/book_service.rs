//! Book Service - Catalog writes and availability-enriched reads
//!
//! Every read goes through [`BookView`], which recomputes availability from
//! the book's current loans.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::{
    Book, BookFilter, CreateBookInput, DomainError, EntityKind, Loan, LoanFilter, LoanState,
    RecordChange, UpdateBookInput,
};
use crate::infrastructure::AppState;
use crate::services::availability::{self, Availability};
use crate::services::stage_service;

/// A book with its loan-derived fields
#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    #[serde(flatten)]
    pub book: Book,
    #[serde(flatten)]
    pub availability: Availability,
    /// All loans ever recorded for the book
    pub loan_count: usize,
    /// Expected return date of the first ongoing loan
    pub expected_return_date: Option<NaiveDate>,
    pub display_name: String,
}

impl BookView {
    /// `loans` must all belong to `book`.
    pub fn new(book: Book, loans: &[Loan]) -> Self {
        let availability = availability::compute(book.total_copies, loans);
        let expected_return_date = loans
            .iter()
            .filter(|l| l.state == LoanState::Ongoing)
            .min_by_key(|l| l.id)
            .and_then(|l| l.expected_return_date);

        Self {
            display_name: book.display_name(),
            availability,
            loan_count: loans.len(),
            expected_return_date,
            book,
        }
    }
}

/// ISBN-10 or ISBN-13, counted in characters
pub fn validate_isbn(isbn: &str) -> Result<(), DomainError> {
    let len = isbn.chars().count();
    if len != 10 && len != 13 {
        return Err(DomainError::validation(format!(
            "ISBN '{}' must be 10 or 13 characters long, got {}",
            isbn, len
        )));
    }
    Ok(())
}

/// The fields of a book that carry invariants
struct BookFields<'a> {
    title: &'a str,
    isbn: Option<&'a str>,
    pages: Option<i32>,
    total_copies: i32,
    author_id: Option<i32>,
    stage_id: Option<i32>,
    category_ids: &'a [i32],
}

impl<'a> From<&'a CreateBookInput> for BookFields<'a> {
    fn from(input: &'a CreateBookInput) -> Self {
        Self {
            title: &input.title,
            isbn: input.isbn.as_deref(),
            pages: input.pages,
            total_copies: input.total_copies,
            author_id: input.author_id,
            stage_id: input.stage_id,
            category_ids: &input.category_ids,
        }
    }
}

impl<'a> From<&'a Book> for BookFields<'a> {
    fn from(book: &'a Book) -> Self {
        Self {
            title: &book.title,
            isbn: book.isbn.as_deref(),
            pages: book.pages,
            total_copies: book.total_copies,
            author_id: book.author_id,
            stage_id: book.stage_id,
            category_ids: &book.category_ids,
        }
    }
}

/// Checks that need no store access
fn check_fields(fields: &BookFields<'_>) -> Result<(), DomainError> {
    if fields.title.trim().is_empty() {
        return Err(DomainError::validation("Book title is required"));
    }
    if let Some(isbn) = fields.isbn {
        validate_isbn(isbn)?;
    }
    if let Some(pages) = fields.pages
        && pages <= 0
    {
        return Err(DomainError::validation(format!(
            "Number of pages must be positive, got {}",
            pages
        )));
    }
    if fields.total_copies < 0 {
        return Err(DomainError::validation(format!(
            "Total copies cannot be negative, got {}",
            fields.total_copies
        )));
    }
    Ok(())
}

/// Full validation, `own_id` being the book under update
async fn validate_book(
    state: &AppState,
    fields: &BookFields<'_>,
    own_id: Option<i32>,
) -> Result<(), DomainError> {
    check_fields(fields)?;

    if let Some(isbn) = fields.isbn {
        let duplicates = state
            .book_repo
            .find_all(BookFilter {
                isbn: Some(isbn.to_string()),
                ..Default::default()
            })
            .await?;
        if duplicates.iter().any(|b| Some(b.id) != own_id) {
            return Err(DomainError::validation(format!(
                "ISBN {} is already used by another book",
                isbn
            )));
        }
    }

    if let Some(author_id) = fields.author_id {
        let author = state
            .contact_repo
            .find_by_id(author_id)
            .await?
            .ok_or_else(|| {
                DomainError::validation(format!("Author {} does not exist", author_id))
            })?;
        if author.is_company || !author.is_author {
            return Err(DomainError::validation(format!(
                "'{}' is not an individual author",
                author.name
            )));
        }
    }

    if let Some(stage_id) = fields.stage_id
        && state.stage_repo.find_by_id(stage_id).await?.is_none()
    {
        return Err(DomainError::validation(format!(
            "Stage {} does not exist",
            stage_id
        )));
    }

    for category_id in fields.category_ids {
        if state.category_repo.find_by_id(*category_id).await?.is_none() {
            return Err(DomainError::validation(format!(
                "Category {} does not exist",
                category_id
            )));
        }
    }

    Ok(())
}

async fn prepare_book(
    state: &AppState,
    mut input: CreateBookInput,
) -> Result<CreateBookInput, DomainError> {
    validate_book(state, &BookFields::from(&input), None).await?;
    if input.stage_id.is_none() {
        input.stage_id = stage_service::default_stage(state).await?.map(|s| s.id);
    }
    Ok(input)
}

/// Create a book; without a stage it lands in the current default stage.
pub async fn create_book(state: &AppState, input: CreateBookInput) -> Result<Book, DomainError> {
    let input = prepare_book(state, input).await?;
    let book = state.book_repo.create(input).await?;
    tracing::info!("Book {} created: {}", book.id, book.display_name());

    state
        .notify(RecordChange::created(EntityKind::Book, book.id))
        .await;
    Ok(book)
}

/// Create several books in one transaction
pub async fn create_books(
    state: &AppState,
    inputs: Vec<CreateBookInput>,
) -> Result<Vec<Book>, DomainError> {
    let mut seen_isbns = HashSet::new();
    let mut prepared = Vec::with_capacity(inputs.len());

    for input in inputs {
        if let Some(isbn) = &input.isbn
            && !seen_isbns.insert(isbn.clone())
        {
            return Err(DomainError::validation(format!(
                "ISBN {} appears twice in the batch",
                isbn
            )));
        }
        prepared.push(prepare_book(state, input).await?);
    }

    let books = state.book_repo.create_many(prepared).await?;
    tracing::info!("Created {} books in one batch", books.len());

    for book in &books {
        state
            .notify(RecordChange::created(EntityKind::Book, book.id))
            .await;
    }
    Ok(books)
}

pub async fn update_book(
    state: &AppState,
    id: i32,
    input: UpdateBookInput,
) -> Result<Book, DomainError> {
    let mut book = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let mut fields = Vec::new();

    if let Some(title) = input.title {
        book.title = title;
        fields.push("title");
    }
    if let Some(isbn) = input.isbn {
        book.isbn = isbn;
        fields.push("isbn");
    }
    if let Some(pages) = input.pages {
        book.pages = pages;
        fields.push("pages");
    }
    if let Some(description) = input.description {
        book.description = description;
        fields.push("description");
    }
    if let Some(total_copies) = input.total_copies {
        book.total_copies = total_copies;
        fields.push("total_copies");
    }
    if let Some(author_id) = input.author_id {
        book.author_id = author_id;
        fields.push("author_id");
    }
    if let Some(category_ids) = input.category_ids {
        book.category_ids = category_ids;
        fields.push("category_ids");
    }
    if let Some(stage_id) = input.stage_id {
        book.stage_id = Some(stage_id);
        fields.push("stage_id");
    }
    if let Some(date_published) = input.date_published {
        book.date_published = date_published;
        fields.push("date_published");
    }
    if let Some(active) = input.active {
        book.active = active;
        fields.push("active");
    }
    if let Some(color) = input.color {
        book.color = color;
        fields.push("color");
    }

    let mut checked = BookFields::from(&book);
    // The author's role is checked when assigned, not on unrelated edits
    if !fields.contains(&"author_id") {
        checked.author_id = None;
    }
    validate_book(state, &checked, Some(id)).await?;

    let book = state.book_repo.update(book).await?;
    state
        .notify(RecordChange::updated(EntityKind::Book, book.id, &fields))
        .await;
    Ok(book)
}

/// Get a single book with its availability
pub async fn get_book(state: &AppState, id: i32) -> Result<BookView, DomainError> {
    let book = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let loans = state.loan_repo.find_all(LoanFilter::for_book(id)).await?;

    Ok(BookView::new(book, &loans))
}

/// List books with availability, ordered by title
pub async fn list_books(
    state: &AppState,
    filter: BookFilter,
) -> Result<Vec<BookView>, DomainError> {
    tracing::debug!(
        "List books - Filters: title={:?}, author={:?}, category={:?}, stage={:?}, status={:?}",
        filter.title,
        filter.author_id,
        filter.category_id,
        filter.stage_id,
        filter.status
    );

    let status = filter.status;
    let books = state.book_repo.find_all(filter).await?;

    let mut loans_by_book: HashMap<i32, Vec<Loan>> = HashMap::new();
    for loan in state.loan_repo.find_all(LoanFilter::default()).await? {
        loans_by_book.entry(loan.book_id).or_default().push(loan);
    }

    Ok(books
        .into_iter()
        .map(|book| {
            let loans = loans_by_book.remove(&book.id).unwrap_or_default();
            BookView::new(book, &loans)
        })
        .filter(|view| status.is_none_or(|s| view.availability.book_status == s))
        .collect())
}

/// Delete a book. Refused while any of its loans is ongoing; closed loans go
/// with it.
pub async fn delete_book(state: &AppState, id: i32) -> Result<(), DomainError> {
    let guard = state.lock_book(id).await;

    let book = state
        .book_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;

    let ongoing = state
        .loan_repo
        .find_all(LoanFilter::for_book(id).with_state(LoanState::Ongoing))
        .await?;
    if !ongoing.is_empty() {
        return Err(DomainError::validation(format!(
            "Cannot delete '{}': {} loan(s) still ongoing",
            book.title,
            ongoing.len()
        )));
    }

    state.book_repo.delete(id).await?;
    drop(guard);
    state.release_book(id);
    tracing::info!("Book {} deleted", id);

    state
        .notify(RecordChange::deleted(EntityKind::Book, id))
        .await;
    Ok(())
}
