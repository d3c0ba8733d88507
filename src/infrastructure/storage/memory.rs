//! In-memory storage implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{
    ChargePointRecord, ChargePointRepository, ConnectorFilter, ConnectorStatus, ConnectorUpdate,
    DomainError, DomainResult, TransactionRepository, TransactionState,
};

/// In-memory storage for development and testing
pub struct InMemoryStorage {
    charge_points: DashMap<String, ChargePointRecord>,
    /// serial number → charge point id
    serials: DashMap<String, String>,
    transactions: DashMap<i32, TransactionState>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            charge_points: DashMap::new(),
            serials: DashMap::new(),
            transactions: DashMap::new(),
        }
    }

    fn with_record<F>(&self, id: &str, f: F) -> DomainResult<()>
    where
        F: FnOnce(&mut ChargePointRecord),
    {
        let mut record = self
            .charge_points
            .get_mut(id)
            .ok_or_else(|| DomainError::not_found("ChargePoint", "id", id))?;
        f(&mut record);
        Ok(())
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChargePointRepository for InMemoryStorage {
    async fn create(&self, charge_point: ChargePointRecord) -> DomainResult<()> {
        // Reserve the serial first so concurrent registrations cannot both win
        match self.serials.entry(charge_point.serial_number.clone()) {
            Entry::Occupied(_) => {
                return Err(DomainError::Conflict(format!(
                    "charge point with serial number {}",
                    charge_point.serial_number
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(charge_point.id.clone());
            }
        }

        match self.charge_points.entry(charge_point.id.clone()) {
            Entry::Occupied(_) => {
                self.serials.remove(&charge_point.serial_number);
                Err(DomainError::Conflict(format!(
                    "charge point with id {}",
                    charge_point.id
                )))
            }
            Entry::Vacant(slot) => {
                slot.insert(charge_point);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargePointRecord>> {
        Ok(self.charge_points.get(id).map(|cp| cp.clone()))
    }

    async fn find_by_serial_number(
        &self,
        serial_number: &str,
    ) -> DomainResult<Option<ChargePointRecord>> {
        let Some(id) = self.serials.get(serial_number).map(|id| id.clone()) else {
            return Ok(None);
        };
        Ok(self.charge_points.get(&id).map(|cp| cp.clone()))
    }

    async fn find_all(&self) -> DomainResult<Vec<ChargePointRecord>> {
        let mut all: Vec<_> = self.charge_points.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn find_by_connector(
        &self,
        filter: &ConnectorFilter,
    ) -> DomainResult<Vec<ChargePointRecord>> {
        let mut matching: Vec<_> = self
            .charge_points
            .iter()
            .filter(|e| e.value().has_connector_matching(filter))
            .map(|e| e.value().clone())
            .collect();
        matching.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(matching)
    }

    async fn update_connector(&self, id: &str, update: ConnectorUpdate) -> DomainResult<()> {
        self.with_record(id, |cp| cp.apply_connector_update(&update))
    }

    async fn update_status(&self, id: &str, status: ConnectorStatus) -> DomainResult<()> {
        self.with_record(id, |cp| cp.status = status)
    }

    async fn update_last_activity(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.with_record(id, |cp| cp.last_activity = Some(at))
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStorage {
    async fn create(&self, transaction: TransactionState) -> DomainResult<()> {
        match self.transactions.entry(transaction.transaction_id) {
            Entry::Occupied(_) => Err(DomainError::Conflict(format!(
                "transaction {}",
                transaction.transaction_id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(transaction);
                Ok(())
            }
        }
    }

    async fn find_by_id(&self, transaction_id: i32) -> DomainResult<Option<TransactionState>> {
        Ok(self.transactions.get(&transaction_id).map(|t| t.clone()))
    }

    async fn find_by_charge_point(
        &self,
        charge_point_id: &str,
    ) -> DomainResult<Vec<TransactionState>> {
        let mut found: Vec<_> = self
            .transactions
            .iter()
            .filter(|e| e.value().charge_point_id == charge_point_id)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|t| t.transaction_id);
        Ok(found)
    }

    async fn find_all(&self) -> DomainResult<Vec<TransactionState>> {
        let mut all: Vec<_> = self.transactions.iter().map(|e| e.value().clone()).collect();
        all.sort_by_key(|t| t.transaction_id);
        Ok(all)
    }

    async fn max_id(&self) -> DomainResult<i32> {
        Ok(self
            .transactions
            .iter()
            .map(|e| *e.key())
            .max()
            .unwrap_or(0))
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConnectorRecord, StopReason};

    fn record(id: &str, serial: &str) -> ChargePointRecord {
        let mut cp = ChargePointRecord::new(id, serial);
        cp.connectors.push(ConnectorRecord::new(1));
        cp.connectors.push(ConnectorRecord::new(2));
        cp
    }

    #[tokio::test]
    async fn serial_numbers_are_unique() {
        let store = InMemoryStorage::new();
        ChargePointRepository::create(&store, record("CP-1", "SN-1")).await.unwrap();

        let err = ChargePointRepository::create(&store, record("CP-2", "SN-1"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Id clash does not leak a serial reservation
        let err = ChargePointRepository::create(&store, record("CP-1", "SN-2"))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        ChargePointRepository::create(&store, record("CP-3", "SN-2")).await.unwrap();

        let found = store.find_by_serial_number("SN-2").await.unwrap().unwrap();
        assert_eq!(found.id, "CP-3");
    }

    #[tokio::test]
    async fn concurrent_connector_updates_do_not_clobber() {
        let store = std::sync::Arc::new(InMemoryStorage::new());
        ChargePointRepository::create(store.as_ref(), record("CP-1", "SN-1")).await.unwrap();

        let a = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_connector(
                        "CP-1",
                        ConnectorUpdate {
                            connector_id: 1,
                            status: ConnectorStatus::Charging,
                            meter_value: 10,
                            start_timestamp: Some(Utc::now()),
                            charge_point_status: None,
                        },
                    )
                    .await
            })
        };
        let b = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .update_connector(
                        "CP-1",
                        ConnectorUpdate {
                            connector_id: 2,
                            status: ConnectorStatus::Faulted,
                            meter_value: 0,
                            start_timestamp: None,
                            charge_point_status: None,
                        },
                    )
                    .await
            })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let cp = ChargePointRepository::find_by_id(store.as_ref(), "CP-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cp.connector(1).unwrap().status, ConnectorStatus::Charging);
        assert_eq!(cp.connector(2).unwrap().status, ConnectorStatus::Faulted);
    }

    #[tokio::test]
    async fn updates_on_missing_record_are_not_found() {
        let store = InMemoryStorage::new();
        let err = store
            .update_status("CP-404", ConnectorStatus::Available)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn transactions_are_write_once() {
        let store = InMemoryStorage::new();
        assert_eq!(store.max_id().await.unwrap(), 0);

        let mut tx = TransactionState::new(3, "CP-1", 1, "TAG1", 0, Utc::now());
        tx.conclude(100, Utc::now(), StopReason::Local);
        TransactionRepository::create(&store, tx.clone()).await.unwrap();

        let err = TransactionRepository::create(&store, tx).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.max_id().await.unwrap(), 3);
        assert_eq!(store.find_by_charge_point("CP-1").await.unwrap().len(), 1);
        assert!(store.find_by_charge_point("CP-2").await.unwrap().is_empty());
    }
}
