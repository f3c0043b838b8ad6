//! Loan Service - Loan lifecycle and availability checks
//!
//! State machine: `ongoing -> done`, `ongoing -> lost`, and `done/lost ->
//! ongoing` through [`reopen_loan`]. Every write that can put copies back
//! into circulation is checked against the book's remaining capacity while
//! holding that book's lock, so loans for one book are validated one at a
//! time.

use chrono::{Duration, Local, NaiveDate};
use std::collections::HashMap;
use tokio::sync::OwnedMutexGuard;

use crate::domain::{
    Book, Contact, CreateLoanInput, DomainError, EntityKind, Loan, LoanFilter, LoanState,
    LossType, NewLoan, RecordChange, UpdateLoanInput,
};
use crate::infrastructure::AppState;
use crate::services::availability;

/// Current local date
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// An ongoing loan whose expected return date has passed.
pub fn is_overdue(loan: &Loan, today: NaiveDate) -> bool {
    loan.state == LoanState::Ongoing
        && loan
            .expected_return_date
            .is_some_and(|expected| today > expected)
}

/// Days between the loan date and its return (or `today` while not returned).
pub fn loan_duration_days(loan: &Loan, today: NaiveDate) -> i64 {
    let end = loan.return_date.unwrap_or(today);
    (end - loan.loan_date).num_days().max(0)
}

fn check_quantity(quantity: i32) -> Result<(), DomainError> {
    if quantity <= 0 {
        return Err(DomainError::validation(format!(
            "Loan quantity must be positive, got {}",
            quantity
        )));
    }
    Ok(())
}

fn check_dates(loan_date: NaiveDate, expected: Option<NaiveDate>) -> Result<(), DomainError> {
    if let Some(expected) = expected
        && expected < loan_date
    {
        return Err(DomainError::validation(format!(
            "Expected return date {} is before the loan date {}",
            expected, loan_date
        )));
    }
    Ok(())
}

async fn require_borrower(
    state: &AppState,
    borrower_id: Option<i32>,
) -> Result<Contact, DomainError> {
    let borrower_id =
        borrower_id.ok_or_else(|| DomainError::validation("A loan requires a borrower"))?;

    let borrower = state
        .contact_repo
        .find_by_id(borrower_id)
        .await?
        .ok_or_else(|| {
            DomainError::validation(format!("Borrower {} does not exist", borrower_id))
        })?;

    if borrower.is_company {
        return Err(DomainError::validation(format!(
            "Borrower '{}' is a company; loans go to individual contacts",
            borrower.name
        )));
    }
    Ok(borrower)
}

async fn load_book(state: &AppState, book_id: i32) -> Result<Book, DomainError> {
    state
        .book_repo
        .find_by_id(book_id)
        .await?
        .ok_or(DomainError::NotFound)
}

/// Fail unless `quantity` fits in what the other ongoing loans leave over.
///
/// `pending` counts copies claimed by earlier entries of the same batch.
async fn check_capacity(
    state: &AppState,
    book: &Book,
    quantity: i32,
    exclude_loan_id: Option<i32>,
    pending: i32,
) -> Result<(), DomainError> {
    let ongoing = state
        .loan_repo
        .find_all(LoanFilter::for_book(book.id).with_state(LoanState::Ongoing))
        .await?;

    let remaining =
        availability::remaining_capacity(book.total_copies, &ongoing, exclude_loan_id) - pending;

    if quantity > remaining {
        tracing::warn!(
            "Rejected loan of {} copies of book {}: {} remaining",
            quantity,
            book.id,
            remaining
        );
        return Err(DomainError::validation(format!(
            "Not enough copies of '{}' available: requested {}, available {}",
            book.title,
            quantity,
            remaining.max(0)
        )));
    }
    Ok(())
}

/// Read a loan and take its book's lock; the loan is re-read under the lock.
async fn lock_loan(
    state: &AppState,
    id: i32,
) -> Result<(Loan, OwnedMutexGuard<()>), DomainError> {
    let loan = state
        .loan_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;

    let guard = state.lock_book(loan.book_id).await;

    let loan = state
        .loan_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    Ok((loan, guard))
}

/// Validate everything about a new loan except the book's capacity
async fn prepare_loan(state: &AppState, input: CreateLoanInput) -> Result<NewLoan, DomainError> {
    check_quantity(input.quantity)?;
    let borrower = require_borrower(state, input.borrower_id).await?;

    let loan_date = input.loan_date.unwrap_or_else(today);
    check_dates(loan_date, input.expected_return_date)?;

    Ok(NewLoan {
        book_id: input.book_id,
        borrower_id: borrower.id,
        loan_date,
        expected_return_date: input.expected_return_date,
        quantity: input.quantity,
        notes: input.notes,
    })
}

/// Create a new loan in `ongoing` state
pub async fn create_loan(state: &AppState, input: CreateLoanInput) -> Result<Loan, DomainError> {
    let new_loan = prepare_loan(state, input).await?;

    let _guard = state.lock_book(new_loan.book_id).await;
    let book = load_book(state, new_loan.book_id).await?;
    check_capacity(state, &book, new_loan.quantity, None, 0).await?;

    let loan = state.loan_repo.create(new_loan).await?;
    tracing::info!(
        "Loan {} created: {} copies of book {} to contact {}",
        loan.id,
        loan.quantity,
        loan.book_id,
        loan.borrower_id
    );

    state
        .notify(RecordChange::created(EntityKind::Loan, loan.id))
        .await;
    Ok(loan)
}

/// Create several loans at once; nothing is stored unless every loan fits.
pub async fn create_loans(
    state: &AppState,
    inputs: Vec<CreateLoanInput>,
) -> Result<Vec<Loan>, DomainError> {
    if inputs.is_empty() {
        return Ok(Vec::new());
    }

    let mut book_ids: Vec<i32> = inputs.iter().map(|i| i.book_id).collect();
    book_ids.sort_unstable();
    book_ids.dedup();

    // Ascending order so overlapping batches cannot deadlock
    let mut guards = Vec::with_capacity(book_ids.len());
    for book_id in &book_ids {
        guards.push(state.lock_book(*book_id).await);
    }

    let mut books: HashMap<i32, Book> = HashMap::new();
    for book_id in book_ids {
        books.insert(book_id, load_book(state, book_id).await?);
    }

    let mut pending: HashMap<i32, i32> = HashMap::new();
    let mut new_loans = Vec::with_capacity(inputs.len());
    for input in inputs {
        let new_loan = prepare_loan(state, input).await?;
        let book = &books[&new_loan.book_id];
        let claimed = pending.entry(book.id).or_insert(0);

        check_capacity(state, book, new_loan.quantity, None, *claimed).await?;

        *claimed += new_loan.quantity;
        new_loans.push(new_loan);
    }

    let loans = state.loan_repo.create_many(new_loans).await?;
    tracing::info!("Created {} loans in one batch", loans.len());

    for loan in &loans {
        state
            .notify(RecordChange::created(EntityKind::Loan, loan.id))
            .await;
    }
    Ok(loans)
}

/// Lend copies of a book for the configured loan period, starting today.
pub async fn borrow_book(
    state: &AppState,
    book_id: i32,
    borrower_id: i32,
    quantity: i32,
) -> Result<Loan, DomainError> {
    let book = load_book(state, book_id).await?;
    let loans = state.loan_repo.find_all(LoanFilter::for_book(book_id)).await?;
    let current = availability::compute(book.total_copies, &loans);

    if current.available_copies <= 0 {
        return Err(DomainError::validation(format!(
            "No copies available for borrowing. Available: {}, On loan: {}",
            current.available_copies, current.copies_on_loan
        )));
    }

    let loan_date = today();
    create_loan(
        state,
        CreateLoanInput {
            book_id,
            borrower_id: Some(borrower_id),
            loan_date: Some(loan_date),
            expected_return_date: Some(loan_date + Duration::days(state.config.default_loan_days)),
            quantity,
            notes: None,
        },
    )
    .await
}

/// Change quantity, borrower, expected return date or notes of a loan
pub async fn update_loan(
    state: &AppState,
    id: i32,
    input: UpdateLoanInput,
) -> Result<Loan, DomainError> {
    let (mut loan, _guard) = lock_loan(state, id).await?;
    let mut fields = Vec::new();

    if let Some(quantity) = input.quantity {
        check_quantity(quantity)?;
        loan.quantity = quantity;
        fields.push("quantity");
    }
    if let Some(borrower_id) = input.borrower_id {
        loan.borrower_id = require_borrower(state, Some(borrower_id)).await?.id;
        fields.push("borrower_id");
    }
    if let Some(expected) = input.expected_return_date {
        check_dates(loan.loan_date, expected)?;
        loan.expected_return_date = expected;
        fields.push("expected_return_date");
    }
    if let Some(notes) = input.notes {
        loan.notes = notes;
        fields.push("notes");
    }

    if loan.state == LoanState::Ongoing && input.quantity.is_some() {
        let book = load_book(state, loan.book_id).await?;
        check_capacity(state, &book, loan.quantity, Some(loan.id), 0).await?;
    }

    let loan = state.loan_repo.update(loan).await?;
    state
        .notify(RecordChange::updated(EntityKind::Loan, loan.id, &fields))
        .await;
    Ok(loan)
}

/// Close an ongoing loan as returned today
pub async fn return_book(state: &AppState, id: i32) -> Result<Loan, DomainError> {
    let (mut loan, _guard) = lock_loan(state, id).await?;

    if loan.state != LoanState::Ongoing {
        return Err(DomainError::InvalidState(format!(
            "Loan {} is already {}",
            loan.id, loan.state
        )));
    }

    loan.state = LoanState::Done;
    loan.return_date = Some(today());
    let loan = state.loan_repo.update(loan).await?;
    tracing::info!("Loan {} returned ({} copies of book {})", loan.id, loan.quantity, loan.book_id);

    state
        .notify(RecordChange::updated(
            EntityKind::Loan,
            loan.id,
            &["state", "return_date"],
        ))
        .await;
    Ok(loan)
}

/// Close an ongoing loan as lost
pub async fn mark_lost(
    state: &AppState,
    id: i32,
    loss_type: Option<LossType>,
    loss_description: Option<String>,
) -> Result<Loan, DomainError> {
    let (mut loan, _guard) = lock_loan(state, id).await?;

    if loan.state != LoanState::Ongoing {
        return Err(DomainError::InvalidState(format!(
            "Loan {} is already {}",
            loan.id, loan.state
        )));
    }

    loan.state = LoanState::Lost;
    loan.loss_type = loss_type;
    loan.loss_description = loss_description;
    let loan = state.loan_repo.update(loan).await?;
    tracing::info!("Loan {} marked lost ({} copies of book {})", loan.id, loan.quantity, loan.book_id);

    state
        .notify(RecordChange::updated(
            EntityKind::Loan,
            loan.id,
            &["state", "loss_type", "loss_description"],
        ))
        .await;
    Ok(loan)
}

/// Put a returned or lost loan back in `ongoing`, if its copies are still free.
pub async fn reopen_loan(state: &AppState, id: i32) -> Result<Loan, DomainError> {
    let (mut loan, _guard) = lock_loan(state, id).await?;

    if loan.state == LoanState::Ongoing {
        return Err(DomainError::InvalidState(format!(
            "Loan {} is already ongoing",
            loan.id
        )));
    }

    let book = load_book(state, loan.book_id).await?;
    check_capacity(state, &book, loan.quantity, Some(loan.id), 0).await?;

    let previous = loan.state;
    loan.state = LoanState::Ongoing;
    loan.return_date = None;
    loan.loss_type = None;
    loan.loss_description = None;
    let loan = state.loan_repo.update(loan).await?;
    tracing::info!("Loan {} reopened from {}", loan.id, previous);

    state
        .notify(RecordChange::updated(
            EntityKind::Loan,
            loan.id,
            &["state", "return_date", "loss_type", "loss_description"],
        ))
        .await;
    Ok(loan)
}

/// Delete a closed loan
pub async fn delete_loan(state: &AppState, id: i32) -> Result<(), DomainError> {
    let (loan, _guard) = lock_loan(state, id).await?;

    if loan.state == LoanState::Ongoing {
        return Err(DomainError::validation(
            "Cannot delete an ongoing loan. Return it or mark it lost first.",
        ));
    }

    state.loan_repo.delete(id).await?;
    state
        .notify(RecordChange::deleted(EntityKind::Loan, id))
        .await;
    Ok(())
}

/// Return every ongoing loan of a book. Returns the number of loans closed.
pub async fn return_all_for_book(state: &AppState, book_id: i32) -> Result<usize, DomainError> {
    load_book(state, book_id).await?;
    let _guard = state.lock_book(book_id).await;

    let ongoing = state
        .loan_repo
        .find_all(LoanFilter::for_book(book_id).with_state(LoanState::Ongoing))
        .await?;

    let returned_on = today();
    let ongoing = ongoing
        .into_iter()
        .map(|mut loan| {
            loan.state = LoanState::Done;
            loan.return_date = Some(returned_on);
            loan
        })
        .collect();

    let returned = state.loan_repo.update_many(ongoing).await?;
    let count = returned.len();
    for loan in &returned {
        state
            .notify(RecordChange::updated(
                EntityKind::Loan,
                loan.id,
                &["state", "return_date"],
            ))
            .await;
    }

    tracing::info!("Returned {} ongoing loans of book {}", count, book_id);
    Ok(count)
}

/// Get a single loan by ID
pub async fn get_loan(state: &AppState, id: i32) -> Result<Loan, DomainError> {
    state
        .loan_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)
}

/// List loans, most recent first
pub async fn list_loans(state: &AppState, filter: LoanFilter) -> Result<Vec<Loan>, DomainError> {
    state.loan_repo.find_all(filter).await
}

/// Ongoing loans past their expected return date
pub async fn list_overdue_loans(state: &AppState) -> Result<Vec<Loan>, DomainError> {
    let as_of = today();
    let ongoing = state
        .loan_repo
        .find_all(LoanFilter::default().with_state(LoanState::Ongoing))
        .await?;

    Ok(ongoing
        .into_iter()
        .filter(|loan| is_overdue(loan, as_of))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn loan(state: LoanState, expected: Option<NaiveDate>) -> Loan {
        Loan {
            id: 1,
            book_id: 1,
            borrower_id: 1,
            loan_date: date(2025, 3, 1),
            expected_return_date: expected,
            return_date: None,
            quantity: 1,
            state,
            loss_type: None,
            loss_description: None,
            notes: None,
            created_at: String::new(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_overdue_only_after_expected_date() {
        let l = loan(LoanState::Ongoing, Some(date(2025, 3, 15)));
        assert!(!is_overdue(&l, date(2025, 3, 14)));
        assert!(!is_overdue(&l, date(2025, 3, 15)));
        assert!(is_overdue(&l, date(2025, 3, 16)));
    }

    #[test]
    fn test_closed_or_open_ended_loans_are_never_overdue() {
        let late = date(2026, 1, 1);
        assert!(!is_overdue(&loan(LoanState::Done, Some(date(2025, 3, 15))), late));
        assert!(!is_overdue(&loan(LoanState::Lost, Some(date(2025, 3, 15))), late));
        assert!(!is_overdue(&loan(LoanState::Ongoing, None), late));
    }

    #[test]
    fn test_duration_stops_at_return_date() {
        let mut l = loan(LoanState::Ongoing, None);
        assert_eq!(loan_duration_days(&l, date(2025, 3, 11)), 10);

        l.state = LoanState::Done;
        l.return_date = Some(date(2025, 3, 5));
        assert_eq!(loan_duration_days(&l, date(2025, 3, 11)), 4);
    }

    #[test]
    fn test_duration_never_negative() {
        let l = loan(LoanState::Ongoing, None);
        assert_eq!(loan_duration_days(&l, date(2025, 2, 1)), 0);
    }

    #[test]
    fn test_quantity_must_be_positive() {
        assert!(check_quantity(0).unwrap_err().is_validation());
        assert!(check_quantity(-2).unwrap_err().is_validation());
        assert!(check_quantity(1).is_ok());
    }
}
