//! Charge point registration and lookup

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::ports::CredentialHasher;
use crate::domain::{
    ChargePointRecord, ChargePointRegistration, ChargePointRepository, ConnectorFilter,
    ConnectorRecord, DomainError, DomainResult,
};

pub struct RegistrationService {
    charge_points: Arc<dyn ChargePointRepository>,
    hasher: Arc<dyn CredentialHasher>,
}

impl RegistrationService {
    pub fn new(
        charge_points: Arc<dyn ChargePointRepository>,
        hasher: Arc<dyn CredentialHasher>,
    ) -> Self {
        Self {
            charge_points,
            hasher,
        }
    }

    /// Create the durable record for a new charge point.
    ///
    /// The record starts `Unavailable` with connectors `1..=n` Available.
    /// A taken serial number (or id) fails with `Conflict`.
    pub async fn register(
        &self,
        registration: ChargePointRegistration,
    ) -> DomainResult<ChargePointRecord> {
        if registration.id.trim().is_empty() {
            return Err(DomainError::Validation("charge point id is required".into()));
        }
        if registration.serial_number.trim().is_empty() {
            return Err(DomainError::Validation("serial number is required".into()));
        }

        let password_hash = self
            .hasher
            .hash(&registration.password)
            .map_err(|e| DomainError::Validation(e.to_string()))?;

        let mut record = ChargePointRecord::new(&registration.id, &registration.serial_number);
        record.vendor = registration.vendor;
        record.model = registration.model;
        record.password_hash = Some(password_hash);
        record.connectors = registration
            .connector_types
            .into_iter()
            .zip(1u32..)
            .map(|(connector_type, connector_id)| ConnectorRecord {
                connector_type: Some(connector_type),
                ..ConnectorRecord::new(connector_id)
            })
            .collect();

        match self.charge_points.create(record.clone()).await {
            Ok(()) => {
                info!(
                    charge_point_id = record.id.as_str(),
                    serial_number = record.serial_number.as_str(),
                    connectors = record.connectors.len(),
                    "Charge point registered"
                );
                Ok(record)
            }
            Err(e) => {
                if e.is_conflict() {
                    warn!(
                        charge_point_id = record.id.as_str(),
                        serial_number = record.serial_number.as_str(),
                        "Duplicate charge point registration"
                    );
                }
                Err(e)
            }
        }
    }

    pub async fn find_by_id(&self, id: &str) -> DomainResult<Option<ChargePointRecord>> {
        self.charge_points.find_by_id(id).await
    }

    pub async fn find_by_serial_number(
        &self,
        serial_number: &str,
    ) -> DomainResult<Option<ChargePointRecord>> {
        self.charge_points.find_by_serial_number(serial_number).await
    }

    pub async fn list(&self) -> DomainResult<Vec<ChargePointRecord>> {
        self.charge_points.find_all().await
    }

    pub async fn find_by_connector(
        &self,
        filter: &ConnectorFilter,
    ) -> DomainResult<Vec<ChargePointRecord>> {
        self.charge_points.find_by_connector(filter).await
    }
}

// ── Tests ──────────────────────────────────────────────────────
