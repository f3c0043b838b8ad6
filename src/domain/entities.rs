//! Typed catalog entities, state enums and write inputs

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Lifecycle state of a loan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanState {
    /// Copies are out with the borrower and count against availability
    #[default]
    Ongoing,
    /// Returned
    Done,
    /// Reported lost
    Lost,
}

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Ongoing => "ongoing",
            LoanState::Done => "done",
            LoanState::Lost => "lost",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LoanState::Ongoing)
    }
}

impl fmt::Display for LoanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ongoing" => Ok(LoanState::Ongoing),
            "done" => Ok(LoanState::Done),
            "lost" => Ok(LoanState::Lost),
            other => Err(DomainError::Internal(format!("Unknown loan state '{}'", other))),
        }
    }
}

/// Availability status of a book, derived from its loans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    Available,
    Borrowed,
    Lost,
}

impl BookStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::Available => "available",
            BookStatus::Borrowed => "borrowed",
            BookStatus::Lost => "lost",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the copies of a lost loan are gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    Misplaced,
    Damaged,
    Stolen,
    Other,
}

impl LossType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LossType::Misplaced => "misplaced",
            LossType::Damaged => "damaged",
            LossType::Stolen => "stolen",
            LossType::Other => "other",
        }
    }
}

impl FromStr for LossType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "misplaced" => Ok(LossType::Misplaced),
            "damaged" => Ok(LossType::Damaged),
            "stolen" => Ok(LossType::Stolen),
            "other" => Ok(LossType::Other),
            other => Err(DomainError::Internal(format!("Unknown loss type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub isbn: Option<String>,
    pub pages: Option<i32>,
    pub description: Option<String>,
    pub total_copies: i32,
    pub author_id: Option<i32>,
    pub category_ids: Vec<i32>,
    pub stage_id: Option<i32>,
    pub date_published: Option<NaiveDate>,
    pub active: bool,
    pub color: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl Book {
    /// "Title (ISBN)" when an ISBN is known, otherwise the bare title.
    pub fn display_name(&self) -> String {
        match &self.isbn {
            Some(isbn) => format!("{} ({})", self.title, isbn),
            None => self.title.clone(),
        }
    }
}

/// Input for creating a book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookInput {
    pub title: String,
    pub isbn: Option<String>,
    pub pages: Option<i32>,
    pub description: Option<String>,
    pub total_copies: i32,
    pub author_id: Option<i32>,
    #[serde(default)]
    pub category_ids: Vec<i32>,
    pub stage_id: Option<i32>,
    pub date_published: Option<NaiveDate>,
}

impl Default for CreateBookInput {
    fn default() -> Self {
        Self {
            title: String::new(),
            isbn: None,
            pages: None,
            description: None,
            total_copies: 1,
            author_id: None,
            category_ids: Vec::new(),
            stage_id: None,
            date_published: None,
        }
    }
}

/// Input for updating a book; `None` leaves a field untouched
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateBookInput {
    pub title: Option<String>,
    pub isbn: Option<Option<String>>,
    pub pages: Option<Option<i32>>,
    pub description: Option<Option<String>>,
    pub total_copies: Option<i32>,
    pub author_id: Option<Option<i32>>,
    pub category_ids: Option<Vec<i32>>,
    pub stage_id: Option<i32>,
    pub date_published: Option<Option<NaiveDate>>,
    pub active: Option<bool>,
    pub color: Option<i32>,
}

/// A contact. Authors and borrowers are roles of the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: i32,
    pub name: String,
    pub is_company: bool,
    pub is_author: bool,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub birth_place: Option<String>,
    pub biography: Option<String>,
    pub awards: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateContactInput {
    pub name: String,
    pub is_company: bool,
    pub is_author: bool,
    pub birth_date: Option<NaiveDate>,
    pub death_date: Option<NaiveDate>,
    pub birth_place: Option<String>,
    pub biography: Option<String>,
    pub awards: Option<String>,
    pub website: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateContactInput {
    pub name: Option<String>,
    pub is_company: Option<bool>,
    pub is_author: Option<bool>,
    pub birth_date: Option<Option<NaiveDate>>,
    pub death_date: Option<Option<NaiveDate>>,
    pub birth_place: Option<Option<String>>,
    pub biography: Option<Option<String>>,
    pub awards: Option<Option<String>>,
    pub website: Option<Option<String>>,
    pub email: Option<Option<String>>,
    pub phone: Option<Option<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub parent_id: Option<i32>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub code: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub parent_id: Option<Option<i32>>,
}

/// Workflow stage of a book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    pub id: i32,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub sequence: i32,
    pub fold: bool,
    pub is_default: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateStageInput {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub sequence: i32,
    pub fold: bool,
    pub is_default: bool,
}

impl Default for CreateStageInput {
    fn default() -> Self {
        Self {
            name: String::new(),
            code: String::new(),
            description: None,
            sequence: 1,
            fold: false,
            is_default: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateStageInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<Option<String>>,
    pub sequence: Option<i32>,
    pub fold: Option<bool>,
    pub is_default: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: i32,
    pub book_id: i32,
    pub borrower_id: i32,
    pub loan_date: NaiveDate,
    pub expected_return_date: Option<NaiveDate>,
    pub return_date: Option<NaiveDate>,
    pub quantity: i32,
    pub state: LoanState,
    pub loss_type: Option<LossType>,
    pub loss_description: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for creating a loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateLoanInput {
    pub book_id: i32,
    pub borrower_id: Option<i32>,
    /// Defaults to today
    pub loan_date: Option<NaiveDate>,
    pub expected_return_date: Option<NaiveDate>,
    pub quantity: i32,
    pub notes: Option<String>,
}

impl CreateLoanInput {
    pub fn new(book_id: i32, borrower_id: i32) -> Self {
        Self {
            book_id,
            borrower_id: Some(borrower_id),
            loan_date: None,
            expected_return_date: None,
            quantity: 1,
            notes: None,
        }
    }
}

/// Validated loan ready to be stored in `ongoing` state
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub book_id: i32,
    pub borrower_id: i32,
    pub loan_date: NaiveDate,
    pub expected_return_date: Option<NaiveDate>,
    pub quantity: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateLoanInput {
    pub borrower_id: Option<i32>,
    pub quantity: Option<i32>,
    pub expected_return_date: Option<Option<NaiveDate>>,
    pub notes: Option<Option<String>>,
}
