//! Side effects produced by session decisions
//!
//! Decisions mutate the in-memory session synchronously and describe the
//! durable writes and broker messages they imply as [`Effect`] values. The
//! application layer executes them outside the per-charge-point lock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::charge_point::{ConnectorStatus, ConnectorUpdate};
use crate::domain::transaction::TransactionState;

/// Payload published when a transaction starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStarted {
    pub charge_point_id: String,
    pub connector_id: u32,
    /// Resolved from the durable record when the session does not know it yet
    pub serial_number: Option<String>,
    pub start_timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Write one connector slot of the durable charge point record
    PersistConnector {
        charge_point_id: String,
        update: ConnectorUpdate,
    },
    /// Write the top-level status of the durable charge point record
    PersistChargePointStatus {
        charge_point_id: String,
        status: ConnectorStatus,
    },
    /// Create the write-once transaction record
    PersistTransaction(TransactionState),
    PersistLastActivity {
        charge_point_id: String,
        at: DateTime<Utc>,
    },
    PublishTransactionStarted(TransactionStarted),
}

impl Effect {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PersistConnector { .. } => "persist_connector",
            Self::PersistChargePointStatus { .. } => "persist_charge_point_status",
            Self::PersistTransaction(_) => "persist_transaction",
            Self::PersistLastActivity { .. } => "persist_last_activity",
            Self::PublishTransactionStarted(_) => "publish_transaction_started",
        }
    }

    pub fn is_publish(&self) -> bool {
        matches!(self, Self::PublishTransactionStarted(_))
    }
}
