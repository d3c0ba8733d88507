//! Database repository implementations
//!
//! Per-aggregate SeaORM repositories.

pub mod charge_point_repository;
pub mod transaction_repository;

pub use charge_point_repository::SeaOrmChargePointRepository;
pub use transaction_repository::SeaOrmTransactionRepository;

use crate::domain::DomainError;

pub(crate) fn db_err(e: sea_orm::DbErr) -> DomainError {
    DomainError::Storage(format!("Database error: {}", e))
}
