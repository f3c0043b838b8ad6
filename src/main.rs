use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use std::sync::Arc;

use library_app::domain::LoanFilter;
use library_app::infrastructure::{AppState, OperationLogSink};
use library_app::services::loan_service;
use library_app::{config, db, seed};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_app=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env();
    tracing::info!(
        "Starting library-app (profile={}, database={})",
        config.profile,
        config.database_url
    );

    let db = db::init_db(&config.database_url)
        .await
        .expect("Failed to initialize database");

    if config.seed_stages {
        match seed::seed_default_stages(&db).await {
            Ok(0) => tracing::debug!("Default stages already present"),
            Ok(n) => tracing::info!("Seeded {} default stages", n),
            Err(e) => tracing::error!("Failed to seed stages: {}", e),
        }
    }

    let state =
        AppState::new(db.clone(), config).with_event_sink(Arc::new(OperationLogSink::new(db)));

    let loans = match loan_service::list_loans(&state, LoanFilter::default()).await {
        Ok(loans) => loans,
        Err(e) => {
            tracing::error!("Failed to load loans: {}", e);
            return;
        }
    };
    tracing::info!("{} loans on record", loans.len());

    match loan_service::list_overdue_loans(&state).await {
        Ok(overdue) if overdue.is_empty() => tracing::info!("No overdue loans"),
        Ok(overdue) => {
            let today = loan_service::today();
            for loan in &overdue {
                tracing::warn!(
                    "Loan {} overdue: book {} with contact {} since {:?} ({} days out)",
                    loan.id,
                    loan.book_id,
                    loan.borrower_id,
                    loan.expected_return_date,
                    loan_service::loan_duration_days(loan, today)
                );
            }
            tracing::info!("{} overdue loans", overdue.len());
        }
        Err(e) => tracing::error!("Failed to compute overdue loans: {}", e),
    }
}
