//! Transaction orchestrator
//!
//! Entry point for every charge point callback. Each operation takes the
//! per-charge-point lock, runs the session decision, queues the resulting
//! effects while still holding the lock and returns the protocol answer
//! without waiting for any write.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::sequence::TransactionSequence;
use crate::application::effects::EffectDispatcher;
use crate::application::ports::Authorizer;
use crate::application::session::SharedChargePointRegistry;
use crate::domain::session::{MeterOutcome, StatusApplied};
use crate::domain::{
    AuthorizationStatus, ChargePointRepository, ChargePointSession, ConnectorStatus, Effect,
    StopOutcome, StopTransactionRequest, TransactionState,
};

/// Default heartbeat interval handed out on boot (seconds)
pub const DEFAULT_HEARTBEAT_INTERVAL: u32 = 300;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTransactionRequest {
    pub connector_id: u32,
    pub id_tag: String,
    pub meter_start: i32,
    pub start_timestamp: DateTime<Utc>,
}

/// Answer to a start request. `transaction_id` is 0 when rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionResult {
    pub transaction_id: i32,
    pub authorization_status: AuthorizationStatus,
}

impl TransactionResult {
    fn rejected(status: AuthorizationStatus) -> Self {
        Self {
            transaction_id: 0,
            authorization_status: status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopResult {
    /// Always `Invalid`: the session is concluded
    pub authorization_status: AuthorizationStatus,
    pub outcome: StopOutcome,
}

/// Charge point metadata from a boot notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootInfo {
    pub vendor: String,
    pub model: String,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootResult {
    pub status: BootStatus,
    pub current_time: DateTime<Utc>,
    pub interval: u32,
}

pub struct Orchestrator {
    registry: SharedChargePointRegistry,
    authorizer: Arc<dyn Authorizer>,
    sequence: Arc<TransactionSequence>,
    effects: EffectDispatcher,
    charge_points: Arc<dyn ChargePointRepository>,
    require_registration: bool,
    heartbeat_interval: u32,
}

impl Orchestrator {
    pub fn new(
        registry: SharedChargePointRegistry,
        authorizer: Arc<dyn Authorizer>,
        sequence: Arc<TransactionSequence>,
        effects: EffectDispatcher,
        charge_points: Arc<dyn ChargePointRepository>,
    ) -> Self {
        Self {
            registry,
            authorizer,
            sequence,
            effects,
            charge_points,
            require_registration: false,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// Reject boots from charge points without a durable record
    pub fn with_require_registration(mut self, require: bool) -> Self {
        self.require_registration = require;
        self
    }

    pub fn with_heartbeat_interval(mut self, secs: u32) -> Self {
        self.heartbeat_interval = secs;
        self
    }

    pub fn registry(&self) -> &SharedChargePointRegistry {
        &self.registry
    }

    /// Snapshot of a live session
    pub async fn session(&self, charge_point_id: &str) -> Option<ChargePointSession> {
        let session = self.registry.lock(charge_point_id).await?;
        Some((*session).clone())
    }

    /// Wait for all queued persistence and publish effects
    pub async fn flush(&self) {
        self.effects.flush().await;
    }

    // ── Authorization ──────────────────────────────────────────

    pub async fn authorize(&self, charge_point_id: &str, id_tag: &str) -> AuthorizationStatus {
        let status = self.authorizer.authorize(id_tag).await;
        info!(charge_point_id, id_tag, %status, "Authorize");
        status
    }

    // ── Transactions ───────────────────────────────────────────

    pub async fn start_transaction(
        &self,
        charge_point_id: &str,
        request: StartTransactionRequest,
    ) -> TransactionResult {
        let mut session = self.registry.lock_or_create(charge_point_id).await;
        session.last_activity = Utc::now();

        if let Err(status) = session.begin_start(request.connector_id, &request.id_tag) {
            warn!(
                charge_point_id,
                connector_id = request.connector_id,
                %status,
                "Start rejected, connector not idle"
            );
            metrics::counter!("transactions_rejected_total", "status" => status.as_str()).increment(1);
            return TransactionResult::rejected(status);
        }

        // Lock held across authorization: a stop for this charge point
        // cannot interleave with the pending start.
        let status = self.authorizer.authorize(&request.id_tag).await;
        if !status.is_accepted() {
            session.abort_start(request.connector_id);
            info!(
                charge_point_id,
                connector_id = request.connector_id,
                id_tag = request.id_tag.as_str(),
                %status,
                "Start rejected by authorization"
            );
            metrics::counter!("transactions_rejected_total", "status" => status.as_str()).increment(1);
            return TransactionResult::rejected(status);
        }

        let transaction_id = self.sequence.next_id();
        let transaction = TransactionState::new(
            transaction_id,
            charge_point_id,
            request.connector_id,
            request.id_tag,
            request.meter_start,
            request.start_timestamp,
        );
        let effects = session.confirm_start(transaction);
        debug_assert!(session.invariant_holds());
        self.effects.enqueue(effects);
        drop(session);

        metrics::counter!("transactions_started_total").increment(1);
        info!(
            charge_point_id,
            connector_id = request.connector_id,
            transaction_id,
            meter_start = request.meter_start,
            "Transaction started"
        );

        TransactionResult {
            transaction_id,
            authorization_status: AuthorizationStatus::Accepted,
        }
    }

    pub async fn stop_transaction(
        &self,
        charge_point_id: &str,
        request: StopTransactionRequest,
    ) -> StopResult {
        let transaction_id = request.transaction_id;
        let Some(mut session) = self.registry.lock(charge_point_id).await else {
            warn!(charge_point_id, transaction_id, "Stop for unknown charge point ignored");
            return StopResult {
                authorization_status: AuthorizationStatus::Invalid,
                outcome: StopOutcome::NotFound,
            };
        };

        session.last_activity = Utc::now();
        let mut decision = session.stop(request);
        debug_assert!(session.invariant_holds());
        if let StopOutcome::Inconsistent {
            finalized,
            expected: None,
        } = &decision.outcome
        {
            // Synthesized record: its id came from the charge point
            if !self.sequence.claim(finalized.transaction_id) {
                warn!(
                    charge_point_id,
                    transaction_id,
                    "Stop reuses an allocated transaction id, record not persisted"
                );
                decision
                    .effects
                    .retain(|effect| !matches!(effect, Effect::PersistTransaction(_)));
            }
        }
        self.effects.enqueue(decision.effects);
        drop(session);

        match &decision.outcome {
            StopOutcome::Finalized(tx) => {
                metrics::counter!("transactions_stopped_total").increment(1);
                info!(
                    charge_point_id,
                    connector_id = tx.connector_id,
                    transaction_id,
                    meter_stop = ?tx.meter_stop,
                    energy_wh = ?tx.energy_consumed(),
                    "Transaction stopped"
                );
            }
            StopOutcome::Inconsistent { finalized, expected } => {
                metrics::counter!("transactions_stopped_total").increment(1);
                metrics::counter!("inconsistent_stops_total").increment(1);
                warn!(
                    charge_point_id,
                    connector_id = finalized.connector_id,
                    transaction_id,
                    expected_transaction_id = ?expected,
                    "Stop does not match active transaction, finalized best-effort"
                );
            }
            StopOutcome::NotFound => {
                warn!(charge_point_id, transaction_id, "Stop references no known connector or transaction");
            }
        }

        StopResult {
            authorization_status: AuthorizationStatus::Invalid,
            outcome: decision.outcome,
        }
    }

    // ── Status and metering ────────────────────────────────────

    pub async fn status_notification(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        status: ConnectorStatus,
    ) {
        let mut session = self.registry.lock_or_create(charge_point_id).await;
        session.last_activity = Utc::now();

        match session.apply_status_notification(connector_id, status) {
            StatusApplied::Applied(effect) => {
                self.effects.enqueue([effect]);
                info!(charge_point_id, connector_id, %status, "Status notification");
            }
            StatusApplied::Deferred => {
                debug!(
                    charge_point_id,
                    connector_id,
                    %status,
                    "Status held back, transaction lifecycle owns connector status"
                );
            }
        }
    }

    pub async fn meter_values(
        &self,
        charge_point_id: &str,
        connector_id: u32,
        transaction_id: Option<i32>,
        energy_wh: i32,
    ) -> MeterOutcome {
        let mut session = self.registry.lock_or_create(charge_point_id).await;
        session.last_activity = Utc::now();

        let outcome = session.record_meter_value(connector_id, transaction_id, energy_wh);
        match outcome {
            MeterOutcome::Updated => {
                debug!(charge_point_id, connector_id, energy_wh, "Meter value recorded")
            }
            MeterOutcome::Regressed { current } => warn!(
                charge_point_id,
                connector_id,
                energy_wh,
                current,
                "Meter value below current reading ignored"
            ),
            MeterOutcome::NoActiveTransaction => debug!(
                charge_point_id,
                connector_id,
                ?transaction_id,
                "Meter value without active transaction ignored"
            ),
        }
        outcome
    }

    // ── Liveness ───────────────────────────────────────────────

    /// Update last activity and queue the durable write
    pub async fn touch(&self, charge_point_id: &str) {
        let mut session = self.registry.lock_or_create(charge_point_id).await;
        let effect = session.touch(Utc::now());
        self.effects.enqueue([effect]);
    }

    pub async fn heartbeat(&self, charge_point_id: &str) -> DateTime<Utc> {
        self.touch(charge_point_id).await;
        debug!(charge_point_id, "Heartbeat");
        Utc::now()
    }

    pub async fn boot_notification(&self, charge_point_id: &str, info: BootInfo) -> BootResult {
        let current_time = Utc::now();
        let registered_serial = match self.charge_points.find_by_id(charge_point_id).await {
            Ok(Some(record)) => Some(record.serial_number),
            Ok(None) if self.require_registration => {
                warn!(charge_point_id, "Boot rejected, charge point not registered");
                return BootResult {
                    status: BootStatus::Rejected,
                    current_time,
                    interval: self.heartbeat_interval,
                };
            }
            Ok(None) => None,
            Err(e) => {
                warn!(charge_point_id, error = %e, "Charge point lookup failed during boot");
                None
            }
        };

        let mut session = self.registry.lock_or_create(charge_point_id).await;
        session.record_boot(
            info.vendor.as_str(),
            info.model.as_str(),
            registered_serial.or(info.serial_number),
        );
        let effect = session.touch(current_time);
        self.effects.enqueue([effect]);
        drop(session);

        info!(
            charge_point_id,
            vendor = info.vendor.as_str(),
            model = info.model.as_str(),
            firmware = ?info.firmware_version,
            "Boot notification accepted"
        );

        BootResult {
            status: BootStatus::Accepted,
            current_time,
            interval: self.heartbeat_interval,
        }
    }

    // ── Connection lifecycle ───────────────────────────────────

    pub fn on_connect(&self, charge_point_id: &str) {
        info!(charge_point_id, "Charge point connected");
    }

    pub fn on_disconnect(&self, charge_point_id: &str, code: Option<u16>, reason: &str) {
        info!(charge_point_id, ?code, reason, "Charge point disconnected");
    }

    pub fn on_error(&self, charge_point_id: &str, error: &str) {
        warn!(charge_point_id, error, "Charge point connection error");
    }
}

/// Shared orchestrator
pub type SharedOrchestrator = Arc<Orchestrator>;

// ── Tests ──────────────────────────────────────────────────────
