//! Transaction aggregate

pub mod model;
pub mod repository;

pub use model::{AuthorizationStatus, StopReason, TransactionState};
pub use repository::TransactionRepository;
