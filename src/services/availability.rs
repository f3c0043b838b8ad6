//! Availability Calculator - copies on hand vs. copies on loan
//!
//! Pure functions over a book's copy count and its loans. Nothing here
//! touches storage, so every book read recomputes the numbers from the
//! current loan rows.

use serde::Serialize;

use crate::domain::{BookStatus, Loan, LoanState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Availability {
    pub copies_on_loan: i32,
    pub available_copies: i32,
    pub lost_copies: i32,
    pub book_status: BookStatus,
}

fn quantity_in_state<'a>(loans: impl IntoIterator<Item = &'a Loan>, state: LoanState) -> i32 {
    loans
        .into_iter()
        .filter(|l| l.state == state)
        .map(|l| l.quantity)
        .sum()
}

/// Compute availability for a book holding `total_copies` copies.
///
/// Loans belonging to other books must be filtered out by the caller.
pub fn compute(total_copies: i32, loans: &[Loan]) -> Availability {
    let copies_on_loan = quantity_in_state(loans, LoanState::Ongoing);
    let lost_copies = quantity_in_state(loans, LoanState::Lost);
    let available_copies = (total_copies - copies_on_loan).max(0);

    let book_status = if lost_copies > 0 && available_copies == 0 && copies_on_loan == 0 {
        BookStatus::Lost
    } else if available_copies == 0 {
        BookStatus::Borrowed
    } else {
        BookStatus::Available
    };

    Availability {
        copies_on_loan,
        available_copies,
        lost_copies,
        book_status,
    }
}

/// Copies left for a loan once every other ongoing loan is served.
///
/// `exclude_loan_id` is the loan being created or mutated; it never counts
/// against itself. The result is negative when the book is over-allocated.
pub fn remaining_capacity(total_copies: i32, loans: &[Loan], exclude_loan_id: Option<i32>) -> i32 {
    let others = quantity_in_state(
        loans.iter().filter(|l| Some(l.id) != exclude_loan_id),
        LoanState::Ongoing,
    );
    total_copies - others
}
