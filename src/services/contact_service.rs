//! Contact Service - Authors, borrowers and their derived metrics
//!
//! Author metrics come from the books a contact wrote, borrower metrics from
//! the loans made to the contact. Both are recomputed on every read.

use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{
    Book, BookFilter, Contact, ContactFilter, CreateContactInput, DomainError, EntityKind, Loan,
    LoanFilter, LoanState, RecordChange, UpdateContactInput,
};
use crate::infrastructure::AppState;
use crate::services::loan_service::{is_overdue, today};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactMetrics {
    /// Books naming this contact as author
    pub book_count: usize,
    pub first_publication: Option<NaiveDate>,
    pub last_publication: Option<NaiveDate>,
    /// Ongoing loans borrowed by this contact
    pub active_loans_count: usize,
    pub overdue_loans_count: usize,
    pub on_time_loans_count: usize,
    pub age: Option<i32>,
    pub is_alive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContactView {
    #[serde(flatten)]
    pub contact: Contact,
    #[serde(flatten)]
    pub metrics: ContactMetrics,
}

/// Whole years from `birth` to `death`, or to `today` while alive.
pub fn compute_age(
    birth: Option<NaiveDate>,
    death: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<i32> {
    let birth = birth?;
    let end = death.unwrap_or(today);

    let mut years = end.year() - birth.year();
    if (end.month(), end.day()) < (birth.month(), birth.day()) {
        years -= 1;
    }
    Some(years.max(0))
}

/// `books` are the ones authored by the contact, `loans` the ones borrowed.
pub fn compute_metrics(
    contact: &Contact,
    books: &[Book],
    loans: &[Loan],
    today: NaiveDate,
) -> ContactMetrics {
    let published = books.iter().filter_map(|b| b.date_published);
    let active: Vec<&Loan> = loans
        .iter()
        .filter(|l| l.state == LoanState::Ongoing)
        .collect();
    let overdue = active.iter().filter(|l| is_overdue(l, today)).count();

    ContactMetrics {
        book_count: books.len(),
        first_publication: published.clone().min(),
        last_publication: published.max(),
        active_loans_count: active.len(),
        overdue_loans_count: overdue,
        on_time_loans_count: active.len() - overdue,
        age: compute_age(contact.birth_date, contact.death_date, today),
        is_alive: contact.death_date.is_none(),
    }
}

fn validate_contact(
    name: &str,
    birth: Option<NaiveDate>,
    death: Option<NaiveDate>,
) -> Result<(), DomainError> {
    if name.trim().is_empty() {
        return Err(DomainError::validation("Contact name is required"));
    }
    if let Some(birth) = birth
        && birth > today()
    {
        return Err(DomainError::validation(format!(
            "Birth date {} is in the future",
            birth
        )));
    }
    if let (Some(birth), Some(death)) = (birth, death)
        && death < birth
    {
        return Err(DomainError::validation(format!(
            "Death date {} is before birth date {}",
            death, birth
        )));
    }
    Ok(())
}

async fn metrics_for(state: &AppState, contact: &Contact) -> Result<ContactMetrics, DomainError> {
    let books = state
        .book_repo
        .find_all(BookFilter {
            author_id: Some(contact.id),
            ..Default::default()
        })
        .await?;
    let loans = state
        .loan_repo
        .find_all(LoanFilter::for_borrower(contact.id))
        .await?;

    Ok(compute_metrics(contact, &books, &loans, today()))
}

pub async fn create_contact(
    state: &AppState,
    input: CreateContactInput,
) -> Result<Contact, DomainError> {
    validate_contact(&input.name, input.birth_date, input.death_date)?;

    let contact = state.contact_repo.create(input).await?;
    tracing::info!("Contact {} created: {}", contact.id, contact.name);

    state
        .notify(RecordChange::created(EntityKind::Contact, contact.id))
        .await;
    Ok(contact)
}

pub async fn update_contact(
    state: &AppState,
    id: i32,
    input: UpdateContactInput,
) -> Result<Contact, DomainError> {
    let mut contact = state
        .contact_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let mut fields = Vec::new();

    if let Some(name) = input.name {
        contact.name = name;
        fields.push("name");
    }
    if let Some(is_company) = input.is_company {
        contact.is_company = is_company;
        fields.push("is_company");
    }
    if let Some(is_author) = input.is_author {
        contact.is_author = is_author;
        fields.push("is_author");
    }
    if let Some(birth_date) = input.birth_date {
        contact.birth_date = birth_date;
        fields.push("birth_date");
    }
    if let Some(death_date) = input.death_date {
        contact.death_date = death_date;
        fields.push("death_date");
    }
    if let Some(birth_place) = input.birth_place {
        contact.birth_place = birth_place;
        fields.push("birth_place");
    }
    if let Some(biography) = input.biography {
        contact.biography = biography;
        fields.push("biography");
    }
    if let Some(awards) = input.awards {
        contact.awards = awards;
        fields.push("awards");
    }
    if let Some(website) = input.website {
        contact.website = website;
        fields.push("website");
    }
    if let Some(email) = input.email {
        contact.email = email;
        fields.push("email");
    }
    if let Some(phone) = input.phone {
        contact.phone = phone;
        fields.push("phone");
    }

    validate_contact(&contact.name, contact.birth_date, contact.death_date)?;

    if input.is_company == Some(true) {
        let ongoing = state
            .loan_repo
            .find_all(LoanFilter::for_borrower(id).with_state(LoanState::Ongoing))
            .await?;
        if !ongoing.is_empty() {
            return Err(DomainError::validation(format!(
                "'{}' cannot become a company while borrowing {} loan(s)",
                contact.name,
                ongoing.len()
            )));
        }
    }

    let contact = state.contact_repo.update(contact).await?;
    state
        .notify(RecordChange::updated(EntityKind::Contact, contact.id, &fields))
        .await;
    Ok(contact)
}

/// Flip the author flag
pub async fn toggle_author(state: &AppState, id: i32) -> Result<Contact, DomainError> {
    let mut contact = state
        .contact_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;

    contact.is_author = !contact.is_author;
    let contact = state.contact_repo.update(contact).await?;
    tracing::info!("Contact {} is_author={}", contact.id, contact.is_author);

    state
        .notify(RecordChange::updated(EntityKind::Contact, contact.id, &["is_author"]))
        .await;
    Ok(contact)
}

/// Get a contact with its author and borrower metrics
pub async fn get_contact(state: &AppState, id: i32) -> Result<ContactView, DomainError> {
    let contact = state
        .contact_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;
    let metrics = metrics_for(state, &contact).await?;

    Ok(ContactView { contact, metrics })
}

/// List contacts with metrics, ordered by name
pub async fn list_contacts(
    state: &AppState,
    filter: ContactFilter,
) -> Result<Vec<ContactView>, DomainError> {
    let has_active_loans = filter.has_active_loans;
    let has_overdue_loans = filter.has_overdue_loans;
    let contacts = state.contact_repo.find_all(filter).await?;

    let mut books_by_author: HashMap<i32, Vec<Book>> = HashMap::new();
    for book in state.book_repo.find_all(BookFilter::default()).await? {
        if let Some(author_id) = book.author_id {
            books_by_author.entry(author_id).or_default().push(book);
        }
    }
    let mut loans_by_borrower: HashMap<i32, Vec<Loan>> = HashMap::new();
    for loan in state.loan_repo.find_all(LoanFilter::default()).await? {
        loans_by_borrower.entry(loan.borrower_id).or_default().push(loan);
    }

    let as_of = today();
    Ok(contacts
        .into_iter()
        .map(|contact| {
            let books = books_by_author.remove(&contact.id).unwrap_or_default();
            let loans = loans_by_borrower.remove(&contact.id).unwrap_or_default();
            let metrics = compute_metrics(&contact, &books, &loans, as_of);
            ContactView { contact, metrics }
        })
        .filter(|view| {
            has_active_loans.is_none_or(|want| (view.metrics.active_loans_count > 0) == want)
        })
        .filter(|view| {
            has_overdue_loans.is_none_or(|want| (view.metrics.overdue_loans_count > 0) == want)
        })
        .collect())
}

/// Delete a contact that neither authored a book nor appears on any loan
pub async fn delete_contact(state: &AppState, id: i32) -> Result<(), DomainError> {
    let contact = state
        .contact_repo
        .find_by_id(id)
        .await?
        .ok_or(DomainError::NotFound)?;

    let books = state
        .book_repo
        .find_all(BookFilter {
            author_id: Some(id),
            ..Default::default()
        })
        .await?;
    if !books.is_empty() {
        return Err(DomainError::validation(format!(
            "Cannot delete '{}': author of {} book(s)",
            contact.name,
            books.len()
        )));
    }

    let loans = state
        .loan_repo
        .find_all(LoanFilter::for_borrower(id))
        .await?;
    let ongoing = loans
        .iter()
        .filter(|l| l.state == LoanState::Ongoing)
        .count();
    if ongoing > 0 {
        return Err(DomainError::validation(format!(
            "Cannot delete '{}': {} loan(s) still ongoing",
            contact.name, ongoing
        )));
    }
    if !loans.is_empty() {
        return Err(DomainError::validation(format!(
            "Cannot delete '{}': referenced by {} past loan(s)",
            contact.name,
            loans.len()
        )));
    }

    state.contact_repo.delete(id).await?;
    tracing::info!("Contact {} deleted", id);

    state
        .notify(RecordChange::deleted(EntityKind::Contact, id))
        .await;
    Ok(())
}
