//! Application state containing repositories and shared resources

use dashmap::DashMap;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    BookRepository, CategoryRepository, ContactRepository, EventSink, LoanRepository,
    RecordChange, StageRepository, TracingEventSink,
};
use crate::infrastructure::config::Config;
use crate::infrastructure::{
    SeaOrmBookRepository, SeaOrmCategoryRepository, SeaOrmContactRepository,
    SeaOrmLoanRepository, SeaOrmStageRepository,
};

/// Application state shared by every service call
#[derive(Clone)]
pub struct AppState {
    db: DatabaseConnection,
    pub config: Config,
    /// Book repository
    pub book_repo: Arc<dyn BookRepository>,
    /// Contact (author/borrower) repository
    pub contact_repo: Arc<dyn ContactRepository>,
    /// Category repository
    pub category_repo: Arc<dyn CategoryRepository>,
    /// Stage repository
    pub stage_repo: Arc<dyn StageRepository>,
    /// Loan repository
    pub loan_repo: Arc<dyn LoanRepository>,
    pub events: Arc<dyn EventSink>,
    /// One lock per book, held across loan read-check-write windows
    book_locks: Arc<DashMap<i32, Arc<Mutex<()>>>>,
}

impl AppState {
    /// Create a new AppState with all repositories initialized
    pub fn new(db: DatabaseConnection, config: Config) -> Self {
        Self {
            book_repo: Arc::new(SeaOrmBookRepository::new(db.clone())),
            contact_repo: Arc::new(SeaOrmContactRepository::new(db.clone())),
            category_repo: Arc::new(SeaOrmCategoryRepository::new(db.clone())),
            stage_repo: Arc::new(SeaOrmStageRepository::new(db.clone())),
            loan_repo: Arc::new(SeaOrmLoanRepository::new(db.clone())),
            events: Arc::new(TracingEventSink),
            book_locks: Arc::new(DashMap::new()),
            config,
            db,
        }
    }

    /// Replace the event sink
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    /// Get the database connection
    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    /// Serialize loan mutations touching `book_id`.
    pub(crate) async fn lock_book(&self, book_id: i32) -> OwnedMutexGuard<()> {
        let lock = self
            .book_locks
            .entry(book_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry of a book nobody holds or waits on.
    pub(crate) fn release_book(&self, book_id: i32) {
        self.book_locks
            .remove_if(&book_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Report a write to the event sink. Sink failures are logged only.
    pub(crate) async fn notify(&self, change: RecordChange) {
        let entity = change.entity;
        let id = change.id;
        if let Err(e) = self.events.on_record_changed(change).await {
            tracing::warn!("Event sink failed for {} {}: {}", entity, id, e);
        }
    }
}
