//! SeaORM implementation of TransactionRepository

use async_trait::async_trait;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::debug;

use super::db_err;
use crate::domain::{
    AuthorizationStatus, DomainError, DomainResult, StopReason, TransactionRepository,
    TransactionState,
};
use crate::infrastructure::database::entities::transaction;

pub struct SeaOrmTransactionRepository {
    db: DatabaseConnection,
}

impl SeaOrmTransactionRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn model_to_domain(t: transaction::Model) -> TransactionState {
    TransactionState {
        transaction_id: t.id,
        charge_point_id: t.charge_point_id,
        connector_id: t.connector_id.max(0) as u32,
        id_tag: t.id_tag,
        meter_start: t.meter_start,
        meter_stop: t.meter_stop,
        start_timestamp: t.started_at,
        stop_timestamp: t.stopped_at,
        stop_reason: t.stop_reason.as_deref().map(StopReason::parse),
        authorization_status: AuthorizationStatus::parse(&t.authorization_status),
    }
}

#[async_trait]
impl TransactionRepository for SeaOrmTransactionRepository {
    async fn create(&self, tx: TransactionState) -> DomainResult<()> {
        debug!(transaction_id = tx.transaction_id, "Saving transaction");

        let existing = transaction::Entity::find_by_id(tx.transaction_id)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        if existing.is_some() {
            return Err(DomainError::Conflict(format!(
                "transaction {}",
                tx.transaction_id
            )));
        }

        let energy = tx.energy_consumed();
        transaction::ActiveModel {
            id: Set(tx.transaction_id),
            charge_point_id: Set(tx.charge_point_id),
            connector_id: Set(tx.connector_id as i32),
            id_tag: Set(tx.id_tag),
            meter_start: Set(tx.meter_start),
            meter_stop: Set(tx.meter_stop),
            started_at: Set(tx.start_timestamp),
            stopped_at: Set(tx.stop_timestamp),
            stop_reason: Set(tx.stop_reason.map(|r| r.as_str().to_string())),
            energy_consumed: Set(energy),
            authorization_status: Set(tx.authorization_status.as_str().to_string()),
        }
        .insert(&self.db)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn find_by_id(&self, transaction_id: i32) -> DomainResult<Option<TransactionState>> {
        Ok(transaction::Entity::find_by_id(transaction_id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(model_to_domain))
    }

    async fn find_by_charge_point(
        &self,
        charge_point_id: &str,
    ) -> DomainResult<Vec<TransactionState>> {
        Ok(transaction::Entity::find()
            .filter(transaction::Column::ChargePointId.eq(charge_point_id))
            .order_by_asc(transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect())
    }

    async fn find_all(&self) -> DomainResult<Vec<TransactionState>> {
        Ok(transaction::Entity::find()
            .order_by_asc(transaction::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(model_to_domain)
            .collect())
    }

    async fn max_id(&self) -> DomainResult<i32> {
        Ok(transaction::Entity::find()
            .order_by_desc(transaction::Column::Id)
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map_or(0, |t| t.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::infrastructure::database::test_connection;

    #[tokio::test]
    async fn concluded_transaction_round_trips() {
        let repo = SeaOrmTransactionRepository::new(test_connection().await);
        assert_eq!(repo.max_id().await.unwrap(), 0);

        let mut tx = TransactionState::new(7, "CP-unregistered", 2, "TAG1", 100, Utc::now());
        tx.conclude(600, Utc::now(), StopReason::EVDisconnected);
        repo.create(tx.clone()).await.unwrap();

        let stored = repo.find_by_id(7).await.unwrap().unwrap();
        assert_eq!(stored.connector_id, 2);
        assert_eq!(stored.meter_stop, Some(600));
        assert_eq!(stored.stop_reason, Some(StopReason::EVDisconnected));
        assert_eq!(stored.authorization_status, AuthorizationStatus::Invalid);
        assert_eq!(stored.energy_consumed(), Some(500));

        assert!(repo.create(tx).await.unwrap_err().is_conflict());
        assert_eq!(repo.max_id().await.unwrap(), 7);
    }

    #[tokio::test]
    async fn lists_by_charge_point_in_id_order() {
        let repo = SeaOrmTransactionRepository::new(test_connection().await);
        for (id, cp) in [(3, "CP-1"), (1, "CP-1"), (2, "CP-2")] {
            let mut tx = TransactionState::new(id, cp, 1, "TAG1", 0, Utc::now());
            tx.conclude(10, Utc::now(), StopReason::Local);
            repo.create(tx).await.unwrap();
        }

        let ids: Vec<i32> = repo
            .find_by_charge_point("CP-1")
            .await
            .unwrap()
            .iter()
            .map(|t| t.transaction_id)
            .collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(repo.find_all().await.unwrap().len(), 3);
    }
}
