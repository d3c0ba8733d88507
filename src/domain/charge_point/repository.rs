//! Charge Point repository interface

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::{ChargePointRecord, ConnectorFilter, ConnectorStatus, ConnectorUpdate};
use crate::domain::DomainResult;

#[async_trait]
pub trait ChargePointRepository: Send + Sync {
    /// Insert a new record. Fails with `Conflict` when the id or serial number is taken.
    async fn create(&self, charge_point: ChargePointRecord) -> DomainResult<()>;
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargePointRecord>>;
    async fn find_by_serial_number(&self, serial_number: &str)
        -> DomainResult<Option<ChargePointRecord>>;
    async fn find_all(&self) -> DomainResult<Vec<ChargePointRecord>>;
    async fn find_by_connector(&self, filter: &ConnectorFilter)
        -> DomainResult<Vec<ChargePointRecord>>;
    /// Write a single connector slot (and optionally the record status).
    /// Sibling connectors must not be rewritten.
    async fn update_connector(&self, id: &str, update: ConnectorUpdate) -> DomainResult<()>;
    async fn update_status(&self, id: &str, status: ConnectorStatus) -> DomainResult<()>;
    async fn update_last_activity(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()>;
}
