//! Services Layer
//!
//! Business rules over the repositories held by [`AppState`](crate::infrastructure::AppState).
//! Every function validates against records read in the same call.

pub mod availability;
pub mod book_service;
pub mod category_service;
pub mod contact_service;
pub mod loan_service;
pub mod stage_service;

pub use availability::Availability;
pub use book_service::BookView;
pub use category_service::CategoryView;
pub use contact_service::{ContactMetrics, ContactView};
pub use stage_service::StageView;
