//! Transaction repository interface

use async_trait::async_trait;

use super::model::TransactionState;
use crate::domain::DomainResult;

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    /// Write a finalized transaction. Records are write-once: an existing
    /// `transaction_id` yields `Conflict`.
    async fn create(&self, transaction: TransactionState) -> DomainResult<()>;
    async fn find_by_id(&self, transaction_id: i32) -> DomainResult<Option<TransactionState>>;
    async fn find_by_charge_point(&self, charge_point_id: &str)
        -> DomainResult<Vec<TransactionState>>;
    async fn find_all(&self) -> DomainResult<Vec<TransactionState>>;
    /// Highest stored transaction id, 0 when empty. Seeds the id sequence.
    async fn max_id(&self) -> DomainResult<i32>;
}
