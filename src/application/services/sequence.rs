//! Transaction id allocation

use std::sync::atomic::{AtomicI32, Ordering};

use tracing::info;

use crate::domain::{DomainResult, TransactionRepository};

/// Process-wide transaction id sequence.
///
/// Ids are unique and strictly increasing across every charge point.
#[derive(Debug)]
pub struct TransactionSequence {
    next: AtomicI32,
}

impl TransactionSequence {
    /// Start at `first`; values below 1 start at 1.
    pub fn starting_at(first: i32) -> Self {
        Self {
            next: AtomicI32::new(first.max(1)),
        }
    }

    /// Continue after the highest id already in the store.
    pub async fn seeded_from(transactions: &dyn TransactionRepository) -> DomainResult<Self> {
        let max = transactions.max_id().await?;
        info!(next_transaction_id = max + 1, "Transaction sequence seeded");
        Ok(Self::starting_at(max + 1))
    }

    pub fn next_id(&self) -> i32 {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Take an id issued outside the sequence, e.g. by a charge point
    /// stopping a transaction this process never started.
    ///
    /// Returns `true` if the id had not been handed out yet; it never will
    /// be afterwards. Returns `false` if it may already belong to another
    /// transaction.
    pub fn claim(&self, id: i32) -> bool {
        if id < 1 {
            return false;
        }
        let previous = self.next.fetch_max(id.saturating_add(1), Ordering::SeqCst);
        previous <= id
    }

    /// The id the next call to `next_id` will return
    pub fn peek(&self) -> i32 {
        self.next.load(Ordering::SeqCst)
    }
}

impl Default for TransactionSequence {
    fn default() -> Self {
        Self::starting_at(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn starts_at_one() {
        let seq = TransactionSequence::default();
        assert_eq!(seq.next_id(), 1);
        assert_eq!(seq.next_id(), 2);
        assert_eq!(TransactionSequence::starting_at(-5).peek(), 1);
    }

    #[test]
    fn claim_moves_the_sequence_past_foreign_ids() {
        let seq = TransactionSequence::default();
        assert_eq!(seq.next_id(), 1);

        assert!(seq.claim(5));
        assert_eq!(seq.next_id(), 6);

        // Already issued or already claimed
        assert!(!seq.claim(1));
        assert!(!seq.claim(5));
        assert!(!seq.claim(0));
        assert!(!seq.claim(-3));
        assert_eq!(seq.peek(), 7);
    }

    #[tokio::test]
    async fn concurrent_allocation_is_unique() {
        let seq = Arc::new(TransactionSequence::default());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let seq = seq.clone();
            handles.push(tokio::spawn(async move {
                (0..50).map(|_| seq.next_id()).collect::<Vec<_>>()
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
        assert_eq!(seq.peek(), 801);
    }
}
