//! Repository trait definitions
//!
//! These traits define the contract for data access.
//! Implementations live in the infrastructure layer.

use async_trait::async_trait;

use super::DomainError;
use super::entities::*;

/// Filter criteria for book queries
#[derive(Debug, Default, Clone)]
pub struct BookFilter {
    /// Case-insensitive title substring
    pub title: Option<String>,
    pub isbn: Option<String>,
    pub author_id: Option<i32>,
    pub category_id: Option<i32>,
    pub stage_id: Option<i32>,
    pub active: Option<bool>,
    /// Derived from loans, so it is applied by the book service after the
    /// availability computation. Repositories ignore it.
    pub status: Option<BookStatus>,
}

/// Filter criteria for contact queries
#[derive(Debug, Default, Clone)]
pub struct ContactFilter {
    pub is_author: Option<bool>,
    pub is_company: Option<bool>,
    /// Case-insensitive name substring
    pub name: Option<String>,
    /// Applied in memory by the contact service. Repositories ignore it.
    pub has_active_loans: Option<bool>,
    /// Applied in memory by the contact service. Repositories ignore it.
    pub has_overdue_loans: Option<bool>,
}

#[derive(Debug, Default, Clone)]
pub struct CategoryFilter {
    pub name: Option<String>,
    pub code: Option<String>,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Default, Clone)]
pub struct StageFilter {
    pub code: Option<String>,
    pub is_default: Option<bool>,
}

/// Filter parameters for listing loans
#[derive(Debug, Default, Clone)]
pub struct LoanFilter {
    pub book_id: Option<i32>,
    pub borrower_id: Option<i32>,
    pub state: Option<LoanState>,
}

impl LoanFilter {
    pub fn for_book(book_id: i32) -> Self {
        Self {
            book_id: Some(book_id),
            ..Default::default()
        }
    }

    pub fn for_borrower(borrower_id: i32) -> Self {
        Self {
            borrower_id: Some(borrower_id),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: LoanState) -> Self {
        self.state = Some(state);
        self
    }
}

/// Repository trait for Book entity
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Find all books matching the filter criteria, ordered by title
    async fn find_all(&self, filter: BookFilter) -> Result<Vec<Book>, DomainError>;

    /// Find a single book by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Book>, DomainError>;

    /// Create a new book
    async fn create(&self, input: CreateBookInput) -> Result<Book, DomainError>;

    /// Create several books in one transaction
    async fn create_many(&self, inputs: Vec<CreateBookInput>) -> Result<Vec<Book>, DomainError>;

    /// Persist every field of an existing book, category links included
    async fn update(&self, book: Book) -> Result<Book, DomainError>;

    /// Delete a book together with its loans and category links
    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

/// Repository trait for Contact entity
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn find_all(&self, filter: ContactFilter) -> Result<Vec<Contact>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Contact>, DomainError>;

    async fn create(&self, input: CreateContactInput) -> Result<Contact, DomainError>;

    async fn update(&self, contact: Contact) -> Result<Contact, DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

/// Repository trait for Category entity
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    /// Find all categories matching the filter, ordered by name
    async fn find_all(&self, filter: CategoryFilter) -> Result<Vec<Category>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Category>, DomainError>;

    async fn create(&self, input: CreateCategoryInput) -> Result<Category, DomainError>;

    async fn update(&self, category: Category) -> Result<Category, DomainError>;

    /// Delete a category; children lose their parent, book links are dropped
    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

/// Repository trait for Stage entity
///
/// Saving a stage flagged as default clears the flag on every other stage in
/// the same transaction.
#[async_trait]
pub trait StageRepository: Send + Sync {
    /// Find all stages matching the filter, ordered by sequence then name
    async fn find_all(&self, filter: StageFilter) -> Result<Vec<Stage>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Stage>, DomainError>;

    async fn create(&self, input: CreateStageInput) -> Result<Stage, DomainError>;

    async fn update(&self, stage: Stage) -> Result<Stage, DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}

/// Repository trait for Loan entity
#[async_trait]
pub trait LoanRepository: Send + Sync {
    /// Find loans matching the filter, most recent loan date first
    async fn find_all(&self, filter: LoanFilter) -> Result<Vec<Loan>, DomainError>;

    async fn find_by_id(&self, id: i32) -> Result<Option<Loan>, DomainError>;

    async fn create(&self, loan: NewLoan) -> Result<Loan, DomainError>;

    /// Create several loans in one transaction
    async fn create_many(&self, loans: Vec<NewLoan>) -> Result<Vec<Loan>, DomainError>;

    /// Persist every field of an existing loan
    async fn update(&self, loan: Loan) -> Result<Loan, DomainError>;

    /// Persist several loans in one transaction
    async fn update_many(&self, loans: Vec<Loan>) -> Result<Vec<Loan>, DomainError>;

    async fn delete(&self, id: i32) -> Result<(), DomainError>;
}
