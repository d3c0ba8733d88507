//! Transaction lifecycle decisions
//!
//! `Idle → PendingStart → Active → Idle`, one slot per connector. Every
//! decision mutates the session in place and returns the effects it implies.

use chrono::{DateTime, Utc};

use super::effect::{Effect, TransactionStarted};
use super::model::{ChargePointSession, TransactionSlot};
use crate::domain::charge_point::ConnectorStatus;
use crate::domain::transaction::{AuthorizationStatus, StopReason, TransactionState};

/// Stop request as reported by the charge point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopTransactionRequest {
    /// OCPP 1.6 stops do not carry a connector; resolved from the transaction id when absent
    pub connector_id: Option<u32>,
    pub transaction_id: i32,
    pub meter_stop: i32,
    pub stop_timestamp: DateTime<Utc>,
    pub reason: StopReason,
    pub id_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    /// The active transaction matched the request
    Finalized(TransactionState),
    /// No matching active transaction; finalized best-effort anyway.
    /// `expected` is the id that was active on the connector, if any.
    Inconsistent {
        finalized: TransactionState,
        expected: Option<i32>,
    },
    /// Neither the connector nor the transaction is known
    NotFound,
}

impl StopOutcome {
    pub fn finalized(&self) -> Option<&TransactionState> {
        match self {
            Self::Finalized(tx) | Self::Inconsistent { finalized: tx, .. } => Some(tx),
            Self::NotFound => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopDecision {
    pub outcome: StopOutcome,
    pub effects: Vec<Effect>,
}

impl ChargePointSession {
    /// Reserve the connector slot for an authorization round trip.
    ///
    /// Fails with `ConcurrentTx` when the connector already holds a pending
    /// or active transaction, and with `Invalid` for connector 0.
    pub fn begin_start(
        &mut self,
        connector_id: u32,
        id_tag: &str,
    ) -> Result<(), AuthorizationStatus> {
        if connector_id == 0 {
            return Err(AuthorizationStatus::Invalid);
        }
        let connector = self.connector_mut(connector_id);
        if !connector.slot.is_idle() {
            return Err(AuthorizationStatus::ConcurrentTx);
        }
        connector.slot = TransactionSlot::PendingStart {
            id_tag: id_tag.to_string(),
        };
        Ok(())
    }

    /// Release a reservation after a rejected authorization.
    pub fn abort_start(&mut self, connector_id: u32) {
        if let Some(connector) = self.connectors.get_mut(&connector_id) {
            if matches!(connector.slot, TransactionSlot::PendingStart { .. }) {
                connector.slot = TransactionSlot::Idle;
            }
        }
    }

    /// Bind an accepted transaction and drive `Available → Charging`.
    pub fn confirm_start(&mut self, transaction: TransactionState) -> Vec<Effect> {
        let connector_id = transaction.connector_id;
        let started = TransactionStarted {
            charge_point_id: self.id.clone(),
            connector_id,
            serial_number: self.serial_number.clone(),
            start_timestamp: transaction.start_timestamp,
        };

        self.connector_mut(connector_id).begin_charging(transaction);

        let mut effects = Vec::with_capacity(2);
        effects.extend(self.connector_effect(connector_id, Some(ConnectorStatus::Charging)));
        effects.push(Effect::PublishTransactionStarted(started));
        effects
    }

    /// Finalize a transaction and drive `Charging → Available`.
    pub fn stop(&mut self, request: StopTransactionRequest) -> StopDecision {
        let by_transaction = self
            .connectors
            .iter()
            .find(|(_, c)| {
                c.slot
                    .active()
                    .map_or(false, |tx| tx.transaction_id == request.transaction_id)
            })
            .map(|(id, _)| *id);

        let (connector_id, consistent) = match by_transaction {
            Some(id) => (id, true),
            None => match self.fallback_connector(request.connector_id) {
                Some(id) => (id, false),
                None => {
                    return StopDecision {
                        outcome: StopOutcome::NotFound,
                        effects: Vec::new(),
                    }
                }
            },
        };

        let charge_point_id = self.id.clone();
        let connector = self.connector_mut(connector_id);
        let slot = std::mem::take(&mut connector.slot);
        let (mut transaction, expected) = match slot {
            TransactionSlot::Active(tx) => {
                let expected = tx.transaction_id;
                (tx, Some(expected))
            }
            TransactionSlot::Idle | TransactionSlot::PendingStart { .. } => {
                let tx = TransactionState::new(
                    request.transaction_id,
                    charge_point_id,
                    connector_id,
                    request.id_tag.clone().unwrap_or_default(),
                    connector.meter_value,
                    connector.start_timestamp.unwrap_or(request.stop_timestamp),
                );
                (tx, None)
            }
        };

        transaction.conclude(request.meter_stop, request.stop_timestamp, request.reason);
        connector.end_charging();

        let aggregate = self.aggregate_status();
        let mut effects = vec![Effect::PersistTransaction(transaction.clone())];
        effects.extend(self.connector_effect(connector_id, Some(aggregate)));

        let outcome = if consistent {
            StopOutcome::Finalized(transaction)
        } else {
            StopOutcome::Inconsistent {
                finalized: transaction,
                expected,
            }
        };
        StopDecision { outcome, effects }
    }

    /// Connector to finalize when no active transaction matches: the named
    /// connector if the session knows it, else the only active connector.
    fn fallback_connector(&self, requested: Option<u32>) -> Option<u32> {
        if let Some(id) = requested.filter(|id| self.connectors.contains_key(id)) {
            return Some(id);
        }
        let mut active = self
            .connectors
            .iter()
            .filter(|(_, c)| c.slot.is_active())
            .map(|(id, _)| *id);
        match (active.next(), active.next()) {
            (Some(id), None) => Some(id),
            _ => None,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────
