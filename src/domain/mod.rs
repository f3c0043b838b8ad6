//! Domain layer - Pure business abstractions
//!
//! Typed entities, repository contracts, the change-notification hook and
//! domain error types. No SeaORM entity types leak in here.

pub mod entities;
pub mod errors;
pub mod events;
pub mod repositories;

pub use entities::*;
pub use errors::DomainError;
pub use events::{ChangeKind, EntityKind, EventSink, NoopEventSink, RecordChange, TracingEventSink};
pub use repositories::*;
