//! Loan lifecycle tests
//! Availability checks, state transitions and overdue detection

use chrono::Duration;
use sea_orm::EntityTrait;
use std::sync::Arc;

use library_app::config::Config;
use library_app::db;
use library_app::domain::{
    BookStatus, CreateBookInput, CreateContactInput, CreateLoanInput, DomainError, LoanFilter,
    LoanState, LossType, NoopEventSink, UpdateBookInput, UpdateLoanInput,
};
use library_app::infrastructure::{AppState, OperationLogSink};
use library_app::models::operation_log;
use library_app::services::{book_service, contact_service, loan_service};

// Helper to create a test state over an in-memory database
async fn setup_test_state() -> AppState {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    AppState::new(db, Config::default()).with_event_sink(Arc::new(NoopEventSink))
}

// Helper to create a borrower
async fn create_borrower(state: &AppState, name: &str) -> i32 {
    contact_service::create_contact(
        state,
        CreateContactInput {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create borrower")
    .id
}

// Helper to create a book with the given number of copies
async fn create_test_book(state: &AppState, title: &str, total_copies: i32) -> i32 {
    book_service::create_book(
        state,
        CreateBookInput {
            title: title.to_string(),
            total_copies,
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create book")
    .id
}

fn loan_of(book_id: i32, borrower_id: i32, quantity: i32) -> CreateLoanInput {
    CreateLoanInput {
        quantity,
        ..CreateLoanInput::new(book_id, borrower_id)
    }
}

#[tokio::test]
async fn test_single_copy_lend_return_lend_again() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let bob = create_borrower(&state, "Bob").await;
    let book_id = create_test_book(&state, "Ficciones", 1).await;

    let loan_a = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .expect("First loan should fit");
    assert_eq!(loan_a.state, LoanState::Ongoing);

    let view = book_service::get_book(&state, book_id).await.unwrap();
    assert_eq!(view.availability.book_status, BookStatus::Borrowed);
    assert_eq!(view.availability.available_copies, 0);

    let err = loan_service::create_loan(&state, loan_of(book_id, bob, 1))
        .await
        .unwrap_err();
    assert!(err.is_validation(), "Expected validation error, got {:?}", err);

    loan_service::return_book(&state, loan_a.id)
        .await
        .expect("Return should succeed");
    let view = book_service::get_book(&state, book_id).await.unwrap();
    assert_eq!(view.availability.book_status, BookStatus::Available);

    let loan_b = loan_service::create_loan(&state, loan_of(book_id, bob, 1))
        .await
        .expect("Second loan should fit after return");
    assert_eq!(loan_b.state, LoanState::Ongoing);
}

#[tokio::test]
async fn test_quantity_bounded_by_total_copies() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 3).await;

    let err = loan_service::create_loan(&state, loan_of(book_id, alice, 4))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    loan_service::create_loan(&state, loan_of(book_id, alice, 2))
        .await
        .expect("Two of three copies should fit");
    let err = loan_service::create_loan(&state, loan_of(book_id, alice, 2))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let view = book_service::get_book(&state, book_id).await.unwrap();
    assert_eq!(view.availability.copies_on_loan, 2);
    assert_eq!(view.availability.available_copies, 1);
    assert_eq!(view.loan_count, 1);
}

#[tokio::test]
async fn test_invalid_loan_inputs_rejected() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 3).await;

    let err = loan_service::create_loan(&state, loan_of(book_id, alice, 0))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let mut no_borrower = loan_of(book_id, alice, 1);
    no_borrower.borrower_id = None;
    assert!(
        loan_service::create_loan(&state, no_borrower)
            .await
            .unwrap_err()
            .is_validation()
    );

    assert!(
        loan_service::create_loan(&state, loan_of(book_id, 9999, 1))
            .await
            .unwrap_err()
            .is_validation()
    );

    let err = loan_service::create_loan(&state, loan_of(9999, alice, 1))
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::NotFound);

    let today = loan_service::today();
    let mut backwards = loan_of(book_id, alice, 1);
    backwards.loan_date = Some(today);
    backwards.expected_return_date = Some(today - Duration::days(1));
    assert!(
        loan_service::create_loan(&state, backwards)
            .await
            .unwrap_err()
            .is_validation()
    );

    let loans = loan_service::list_loans(&state, LoanFilter::for_book(book_id))
        .await
        .unwrap();
    assert!(loans.is_empty());
}

#[tokio::test]
async fn test_company_cannot_borrow() {
    let state = setup_test_state().await;
    let publisher = contact_service::create_contact(
        &state,
        CreateContactInput {
            name: "Sur Editions".to_string(),
            is_company: true,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let book_id = create_test_book(&state, "Dune", 1).await;

    let err = loan_service::create_loan(&state, loan_of(book_id, publisher.id, 1))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_return_twice_is_invalid_state() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 1).await;

    let loan = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();

    let returned = loan_service::return_book(&state, loan.id).await.unwrap();
    assert_eq!(returned.state, LoanState::Done);
    assert_eq!(returned.return_date, Some(loan_service::today()));

    let err = loan_service::return_book(&state, loan.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));

    let err = loan_service::mark_lost(&state, loan.id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));
}

#[tokio::test]
async fn test_lost_copies_and_lost_status() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 1).await;

    let loan = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();
    let lost = loan_service::mark_lost(
        &state,
        loan.id,
        Some(LossType::Damaged),
        Some("Left in the rain".to_string()),
    )
    .await
    .unwrap();
    assert_eq!(lost.state, LoanState::Lost);
    assert_eq!(lost.loss_type, Some(LossType::Damaged));

    // The copy is no longer out, so the book counts as available again
    let view = book_service::get_book(&state, book_id).await.unwrap();
    assert_eq!(view.availability.lost_copies, 1);
    assert_eq!(view.availability.book_status, BookStatus::Available);

    book_service::update_book(
        &state,
        book_id,
        UpdateBookInput {
            total_copies: Some(0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let view = book_service::get_book(&state, book_id).await.unwrap();
    assert_eq!(view.availability.book_status, BookStatus::Lost);
}

#[tokio::test]
async fn test_reopen_revalidates_availability() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let bob = create_borrower(&state, "Bob").await;
    let book_id = create_test_book(&state, "Dune", 1).await;

    let first = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();
    loan_service::return_book(&state, first.id).await.unwrap();
    let second = loan_service::create_loan(&state, loan_of(book_id, bob, 1))
        .await
        .unwrap();

    let err = loan_service::reopen_loan(&state, first.id).await.unwrap_err();
    assert!(err.is_validation());

    loan_service::return_book(&state, second.id).await.unwrap();
    let reopened = loan_service::reopen_loan(&state, first.id).await.unwrap();
    assert_eq!(reopened.state, LoanState::Ongoing);
    assert_eq!(reopened.return_date, None);

    let err = loan_service::reopen_loan(&state, first.id).await.unwrap_err();
    assert!(matches!(err, DomainError::InvalidState(_)));
}

#[tokio::test]
async fn test_reopen_clears_loss_data() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 1).await;

    let loan = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();
    loan_service::mark_lost(&state, loan.id, Some(LossType::Misplaced), None)
        .await
        .unwrap();

    let reopened = loan_service::reopen_loan(&state, loan.id).await.unwrap();
    assert_eq!(reopened.state, LoanState::Ongoing);
    assert_eq!(reopened.loss_type, None);
    assert_eq!(reopened.loss_description, None);
}

#[tokio::test]
async fn test_batch_over_allocation_persists_nothing() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let bob = create_borrower(&state, "Bob").await;
    let dune = create_test_book(&state, "Dune", 2).await;
    let emma = create_test_book(&state, "Emma", 5).await;

    let err = loan_service::create_loans(
        &state,
        vec![
            loan_of(emma, alice, 1),
            loan_of(dune, alice, 1),
            loan_of(dune, bob, 2),
        ],
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());

    let all = loan_service::list_loans(&state, LoanFilter::default())
        .await
        .unwrap();
    assert!(all.is_empty(), "Nothing should be stored: {:?}", all);

    let loans = loan_service::create_loans(
        &state,
        vec![loan_of(dune, alice, 1), loan_of(dune, bob, 1)],
    )
    .await
    .expect("Batch within capacity should succeed");
    assert_eq!(loans.len(), 2);
    assert!(loans.iter().all(|l| l.state == LoanState::Ongoing));
}

#[tokio::test]
async fn test_concurrent_loans_cannot_over_allocate() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let bob = create_borrower(&state, "Bob").await;
    let book_id = create_test_book(&state, "Dune", 1).await;

    let (a, b) = tokio::join!(
        loan_service::create_loan(&state, loan_of(book_id, alice, 1)),
        loan_service::create_loan(&state, loan_of(book_id, bob, 1)),
    );
    assert_eq!(
        [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
        1,
        "Exactly one loan should win: {:?} / {:?}",
        a,
        b
    );

    let view = book_service::get_book(&state, book_id).await.unwrap();
    assert_eq!(view.availability.copies_on_loan, 1);
}

#[tokio::test]
async fn test_update_loan_quantity_revalidated() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let bob = create_borrower(&state, "Bob").await;
    let book_id = create_test_book(&state, "Dune", 3).await;

    let loan = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();
    loan_service::create_loan(&state, loan_of(book_id, bob, 1))
        .await
        .unwrap();

    // The loan's own copy does not count against itself
    let updated = loan_service::update_loan(
        &state,
        loan.id,
        UpdateLoanInput {
            quantity: Some(2),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.quantity, 2);

    let err = loan_service::update_loan(
        &state,
        loan.id,
        UpdateLoanInput {
            quantity: Some(3),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());

    let moved = loan_service::update_loan(
        &state,
        loan.id,
        UpdateLoanInput {
            borrower_id: Some(bob),
            notes: Some(Some("Handed over".to_string())),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(moved.borrower_id, bob);
    assert_eq!(moved.notes.as_deref(), Some("Handed over"));
}

#[tokio::test]
async fn test_delete_only_closed_loans() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 1).await;

    let loan = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();
    assert!(
        loan_service::delete_loan(&state, loan.id)
            .await
            .unwrap_err()
            .is_validation()
    );

    loan_service::return_book(&state, loan.id).await.unwrap();
    loan_service::delete_loan(&state, loan.id)
        .await
        .expect("Closed loan should be deletable");
    assert_eq!(
        loan_service::get_loan(&state, loan.id).await.unwrap_err(),
        DomainError::NotFound
    );
}

#[tokio::test]
async fn test_borrow_book_uses_default_loan_period() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 1).await;

    let loan = loan_service::borrow_book(&state, book_id, alice, 1)
        .await
        .unwrap();
    let today = loan_service::today();
    assert_eq!(loan.loan_date, today);
    assert_eq!(
        loan.expected_return_date,
        Some(today + Duration::days(state.config.default_loan_days))
    );

    let err = loan_service::borrow_book(&state, book_id, alice, 1)
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_return_all_for_book() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let bob = create_borrower(&state, "Bob").await;
    let book_id = create_test_book(&state, "Dune", 2).await;

    loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();
    loan_service::create_loan(&state, loan_of(book_id, bob, 1))
        .await
        .unwrap();

    let count = loan_service::return_all_for_book(&state, book_id)
        .await
        .unwrap();
    assert_eq!(count, 2);

    let ongoing = loan_service::list_loans(
        &state,
        LoanFilter::for_book(book_id).with_state(LoanState::Ongoing),
    )
    .await
    .unwrap();
    assert!(ongoing.is_empty());

    let view = book_service::get_book(&state, book_id).await.unwrap();
    assert_eq!(view.availability.available_copies, 2);
}

#[tokio::test]
async fn test_overdue_listing() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 3).await;
    let today = loan_service::today();

    let late = loan_service::create_loan(
        &state,
        CreateLoanInput {
            loan_date: Some(today - Duration::days(30)),
            expected_return_date: Some(today - Duration::days(10)),
            ..CreateLoanInput::new(book_id, alice)
        },
    )
    .await
    .unwrap();
    loan_service::create_loan(
        &state,
        CreateLoanInput {
            expected_return_date: Some(today + Duration::days(10)),
            ..CreateLoanInput::new(book_id, alice)
        },
    )
    .await
    .unwrap();

    assert!(loan_service::is_overdue(&late, today));
    assert_eq!(loan_service::loan_duration_days(&late, today), 30);

    let overdue = loan_service::list_overdue_loans(&state).await.unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].id, late.id);

    let returned = loan_service::return_book(&state, late.id).await.unwrap();
    assert!(!loan_service::is_overdue(&returned, today));
    assert!(loan_service::list_overdue_loans(&state).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_changes_written_to_operation_log() {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    let state = AppState::new(db.clone(), Config::default())
        .with_event_sink(Arc::new(OperationLogSink::new(db.clone())));

    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 1).await;
    let loan = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();
    loan_service::return_book(&state, loan.id).await.unwrap();

    let entries = operation_log::Entity::find().all(&db).await.unwrap();
    let loan_ops: Vec<&str> = entries
        .iter()
        .filter(|e| e.entity_type == "loan")
        .map(|e| e.operation.as_str())
        .collect();
    assert_eq!(loan_ops, vec!["create", "update"]);
    assert_eq!(entries.len(), 4);
}

#[tokio::test]
async fn test_bulk_loan_update_is_all_or_nothing() {
    let state = setup_test_state().await;
    let alice = create_borrower(&state, "Alice").await;
    let book_id = create_test_book(&state, "Dune", 2).await;

    let loan = loan_service::create_loan(&state, loan_of(book_id, alice, 1))
        .await
        .unwrap();

    let mut returned = loan.clone();
    returned.state = LoanState::Done;
    returned.return_date = Some(loan_service::today());
    let mut missing = loan.clone();
    missing.id = 9999;

    let err = state
        .loan_repo
        .update_many(vec![returned, missing])
        .await
        .unwrap_err();
    assert_eq!(err, DomainError::NotFound);

    let stored = loan_service::get_loan(&state, loan.id).await.unwrap();
    assert_eq!(stored.state, LoanState::Ongoing);
    assert_eq!(stored.return_date, None);
}
