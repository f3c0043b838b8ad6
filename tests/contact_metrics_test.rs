//! Contact tests
//! Author and borrower metrics, date invariants and delete guards

use chrono::{Duration, NaiveDate};
use std::sync::Arc;

use library_app::config::Config;
use library_app::db;
use library_app::domain::{
    ContactFilter, CreateBookInput, CreateContactInput, CreateLoanInput, DomainError,
    NoopEventSink, UpdateContactInput,
};
use library_app::infrastructure::AppState;
use library_app::services::{book_service, contact_service, loan_service};

async fn setup_test_state() -> AppState {
    let db = db::init_db("sqlite::memory:")
        .await
        .expect("Failed to init DB");
    AppState::new(db, Config::default()).with_event_sink(Arc::new(NoopEventSink))
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

async fn create_person(state: &AppState, name: &str) -> i32 {
    contact_service::create_contact(
        state,
        CreateContactInput {
            name: name.to_string(),
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create contact")
    .id
}

async fn create_author(state: &AppState, name: &str) -> i32 {
    contact_service::create_contact(
        state,
        CreateContactInput {
            name: name.to_string(),
            is_author: true,
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create author")
    .id
}

async fn create_book_by(
    state: &AppState,
    title: &str,
    author_id: Option<i32>,
    published: Option<NaiveDate>,
) -> i32 {
    book_service::create_book(
        state,
        CreateBookInput {
            title: title.to_string(),
            author_id,
            date_published: published,
            total_copies: 5,
            ..Default::default()
        },
    )
    .await
    .expect("Failed to create book")
    .id
}

#[tokio::test]
async fn test_death_before_birth_rejected() {
    let state = setup_test_state().await;

    let err = contact_service::create_contact(
        &state,
        CreateContactInput {
            name: "Jorge Luis Borges".to_string(),
            is_author: true,
            birth_date: Some(date(1899, 8, 24)),
            death_date: Some(date(1850, 1, 1)),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());

    let borges = contact_service::create_contact(
        &state,
        CreateContactInput {
            name: "Jorge Luis Borges".to_string(),
            is_author: true,
            birth_date: Some(date(1899, 8, 24)),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let err = contact_service::update_contact(
        &state,
        borges.id,
        UpdateContactInput {
            death_date: Some(Some(date(1850, 1, 1))),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());

    let updated = contact_service::update_contact(
        &state,
        borges.id,
        UpdateContactInput {
            death_date: Some(Some(date(1986, 6, 14))),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.death_date, Some(date(1986, 6, 14)));

    let view = contact_service::get_contact(&state, borges.id).await.unwrap();
    assert_eq!(view.metrics.age, Some(86));
    assert!(!view.metrics.is_alive);
}

#[tokio::test]
async fn test_author_publication_metrics() {
    let state = setup_test_state().await;
    let author = create_author(&state, "Ursula K. Le Guin").await;

    create_book_by(&state, "The Dispossessed", Some(author), Some(date(1974, 5, 1))).await;
    create_book_by(&state, "A Wizard of Earthsea", Some(author), Some(date(1968, 11, 1))).await;
    create_book_by(&state, "Untitled drafts", Some(author), None).await;
    create_book_by(&state, "Someone else's", None, Some(date(1900, 1, 1))).await;

    let view = contact_service::get_contact(&state, author).await.unwrap();
    assert_eq!(view.metrics.book_count, 3);
    assert_eq!(view.metrics.first_publication, Some(date(1968, 11, 1)));
    assert_eq!(view.metrics.last_publication, Some(date(1974, 5, 1)));
    assert!(view.metrics.is_alive);
    assert_eq!(view.metrics.age, None);
}

#[tokio::test]
async fn test_borrower_loan_metrics() {
    let state = setup_test_state().await;
    let alice = create_person(&state, "Alice").await;
    let book_id = create_book_by(&state, "Dune", None, None).await;
    let today = loan_service::today();

    loan_service::create_loan(
        &state,
        CreateLoanInput {
            loan_date: Some(today - Duration::days(20)),
            expected_return_date: Some(today - Duration::days(3)),
            ..CreateLoanInput::new(book_id, alice)
        },
    )
    .await
    .unwrap();
    loan_service::create_loan(
        &state,
        CreateLoanInput {
            expected_return_date: Some(today + Duration::days(7)),
            ..CreateLoanInput::new(book_id, alice)
        },
    )
    .await
    .unwrap();
    let closed = loan_service::create_loan(&state, CreateLoanInput::new(book_id, alice))
        .await
        .unwrap();
    loan_service::return_book(&state, closed.id).await.unwrap();

    let view = contact_service::get_contact(&state, alice).await.unwrap();
    assert_eq!(view.metrics.active_loans_count, 2);
    assert_eq!(view.metrics.overdue_loans_count, 1);
    assert_eq!(view.metrics.on_time_loans_count, 1);
    assert_eq!(view.metrics.book_count, 0);
}

#[tokio::test]
async fn test_list_contacts_by_loan_activity() {
    let state = setup_test_state().await;
    let alice = create_person(&state, "Alice").await;
    let bob = create_person(&state, "Bob").await;
    let _carol = create_person(&state, "Carol").await;
    let book_id = create_book_by(&state, "Dune", None, None).await;
    let today = loan_service::today();

    loan_service::create_loan(
        &state,
        CreateLoanInput {
            loan_date: Some(today - Duration::days(30)),
            expected_return_date: Some(today - Duration::days(1)),
            ..CreateLoanInput::new(book_id, alice)
        },
    )
    .await
    .unwrap();
    loan_service::create_loan(&state, CreateLoanInput::new(book_id, bob))
        .await
        .unwrap();

    let active = contact_service::list_contacts(
        &state,
        ContactFilter {
            has_active_loans: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let names: Vec<&str> = active.iter().map(|v| v.contact.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Bob"]);

    let overdue = contact_service::list_contacts(
        &state,
        ContactFilter {
            has_overdue_loans: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(overdue.len(), 1);
    assert_eq!(overdue[0].contact.id, alice);

    let idle = contact_service::list_contacts(
        &state,
        ContactFilter {
            has_active_loans: Some(false),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(idle.len(), 1);
    assert_eq!(idle[0].contact.name, "Carol");
}

#[tokio::test]
async fn test_toggle_author_and_filter() {
    let state = setup_test_state().await;
    let id = create_person(&state, "Mary Shelley").await;

    let toggled = contact_service::toggle_author(&state, id).await.unwrap();
    assert!(toggled.is_author);

    let authors = contact_service::list_contacts(
        &state,
        ContactFilter {
            is_author: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(authors.len(), 1);

    let toggled = contact_service::toggle_author(&state, id).await.unwrap();
    assert!(!toggled.is_author);
}

#[tokio::test]
async fn test_delete_contact_guards() {
    let state = setup_test_state().await;
    let author = create_author(&state, "Author").await;
    let borrower = create_person(&state, "Borrower").await;
    let free = create_person(&state, "Nobody").await;

    let book_id = create_book_by(&state, "Dune", Some(author), None).await;
    let loan = loan_service::create_loan(&state, CreateLoanInput::new(book_id, borrower))
        .await
        .unwrap();

    let err = contact_service::delete_contact(&state, author)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = contact_service::delete_contact(&state, borrower)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    // A returned loan still references the borrower
    loan_service::return_book(&state, loan.id).await.unwrap();
    let err = contact_service::delete_contact(&state, borrower)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    loan_service::delete_loan(&state, loan.id).await.unwrap();
    contact_service::delete_contact(&state, borrower)
        .await
        .expect("Borrower without loans should be deletable");

    contact_service::delete_contact(&state, free).await.unwrap();
    assert_eq!(
        contact_service::get_contact(&state, free).await.unwrap_err(),
        DomainError::NotFound
    );
}

#[tokio::test]
async fn test_borrower_cannot_become_company_while_borrowing() {
    let state = setup_test_state().await;
    let alice = create_person(&state, "Alice").await;
    let book_id = create_book_by(&state, "Dune", None, None).await;

    let loan = loan_service::create_loan(&state, CreateLoanInput::new(book_id, alice))
        .await
        .unwrap();

    let err = contact_service::update_contact(
        &state,
        alice,
        UpdateContactInput {
            is_company: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());

    let view = contact_service::get_contact(&state, alice).await.unwrap();
    assert!(!view.contact.is_company);

    // Once the loan is closed the flag may change
    loan_service::return_book(&state, loan.id).await.unwrap();
    let updated = contact_service::update_contact(
        &state,
        alice,
        UpdateContactInput {
            is_company: Some(true),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert!(updated.is_company);
}
