//! Infrastructure layer - Framework implementations
//!
//! This layer contains:
//! - Database connection and schema (db)
//! - Configuration loading (config)
//! - Default stage seeding (seed)
//! - Repository implementations (repositories)
//! - Operation log event sink (event_log)
//! - Application state (state)

pub mod config;
pub mod db;
pub mod event_log;
pub mod repositories;
pub mod seed;
pub mod state;

pub use event_log::OperationLogSink;
pub use repositories::*;
pub use state::AppState;
