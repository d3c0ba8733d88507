//! Transaction domain entity

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OCPP `idTagInfo.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthorizationStatus {
    Accepted,
    Blocked,
    Expired,
    /// Also marks a concluded transaction: once stopped, the session no
    /// longer authorizes energy transfer. See [`TransactionState::conclude`].
    Invalid,
    ConcurrentTx,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Blocked => "Blocked",
            Self::Expired => "Expired",
            Self::Invalid => "Invalid",
            Self::ConcurrentTx => "ConcurrentTx",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Accepted" => Self::Accepted,
            "Blocked" => Self::Blocked,
            "Expired" => Self::Expired,
            "ConcurrentTx" => Self::ConcurrentTx,
            _ => Self::Invalid,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a transaction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StopReason {
    EmergencyStop,
    EVDisconnected,
    HardReset,
    Local,
    #[default]
    Other,
    PowerLoss,
    Reboot,
    Remote,
    SoftReset,
    UnlockCommand,
    DeAuthorized,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmergencyStop => "EmergencyStop",
            Self::EVDisconnected => "EVDisconnected",
            Self::HardReset => "HardReset",
            Self::Local => "Local",
            Self::Other => "Other",
            Self::PowerLoss => "PowerLoss",
            Self::Reboot => "Reboot",
            Self::Remote => "Remote",
            Self::SoftReset => "SoftReset",
            Self::UnlockCommand => "UnlockCommand",
            Self::DeAuthorized => "DeAuthorized",
        }
    }

    /// Parse an OCPP 1.6 reason name. Unknown names become `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "EmergencyStop" => Self::EmergencyStop,
            "EVDisconnected" => Self::EVDisconnected,
            "HardReset" => Self::HardReset,
            "Local" => Self::Local,
            "PowerLoss" => Self::PowerLoss,
            "Reboot" => Self::Reboot,
            "Remote" => Self::Remote,
            "SoftReset" => Self::SoftReset,
            "UnlockCommand" => Self::UnlockCommand,
            "DeAuthorized" => Self::DeAuthorized,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Charging transaction bound to one connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionState {
    /// Allocated from the global transaction sequence
    pub transaction_id: i32,
    pub charge_point_id: String,
    pub connector_id: u32,
    pub id_tag: String,
    /// Meter value at start (Wh)
    pub meter_start: i32,
    /// Meter value at stop (Wh)
    pub meter_stop: Option<i32>,
    pub start_timestamp: DateTime<Utc>,
    pub stop_timestamp: Option<DateTime<Utc>>,
    pub stop_reason: Option<StopReason>,
    pub authorization_status: AuthorizationStatus,
}

impl TransactionState {
    pub fn new(
        transaction_id: i32,
        charge_point_id: impl Into<String>,
        connector_id: u32,
        id_tag: impl Into<String>,
        meter_start: i32,
        start_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            charge_point_id: charge_point_id.into(),
            connector_id,
            id_tag: id_tag.into(),
            meter_start,
            meter_stop: None,
            start_timestamp,
            stop_timestamp: None,
            stop_reason: None,
            authorization_status: AuthorizationStatus::Accepted,
        }
    }

    /// Finalize the transaction.
    ///
    /// `authorization_status` becomes `Invalid`, meaning "concluded, no
    /// further energy transfer authorized" rather than a rejection.
    pub fn conclude(
        &mut self,
        meter_stop: i32,
        stop_timestamp: DateTime<Utc>,
        reason: StopReason,
    ) {
        self.meter_stop = Some(meter_stop);
        self.stop_timestamp = Some(stop_timestamp);
        self.stop_reason = Some(reason);
        self.authorization_status = AuthorizationStatus::Invalid;
    }

    pub fn is_open(&self) -> bool {
        self.stop_timestamp.is_none()
    }

    /// Energy consumed in Wh, once stopped
    pub fn energy_consumed(&self) -> Option<i32> {
        self.meter_stop.map(|stop| stop - self.meter_start)
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tx() -> TransactionState {
        TransactionState::new(1, "CP-1", 1, "TAG1", 1000, Utc::now())
    }

    #[test]
    fn new_transaction_is_open_and_accepted() {
        let tx = sample_tx();
        assert!(tx.is_open());
        assert_eq!(tx.authorization_status, AuthorizationStatus::Accepted);
        assert!(tx.meter_stop.is_none());
        assert_eq!(tx.energy_consumed(), None);
    }

    #[test]
    fn conclude_marks_invalid_and_records_stop() {
        let mut tx = sample_tx();
        let stopped = Utc::now();
        tx.conclude(6000, stopped, StopReason::EVDisconnected);

        assert!(!tx.is_open());
        assert_eq!(tx.authorization_status, AuthorizationStatus::Invalid);
        assert_eq!(tx.meter_stop, Some(6000));
        assert_eq!(tx.stop_timestamp, Some(stopped));
        assert_eq!(tx.stop_reason, Some(StopReason::EVDisconnected));
        assert_eq!(tx.energy_consumed(), Some(5000));
    }

    #[test]
    fn unknown_reason_falls_back_to_other() {
        assert_eq!(StopReason::parse("PowerLoss"), StopReason::PowerLoss);
        assert_eq!(StopReason::parse("Meteor"), StopReason::Other);
        assert_eq!(AuthorizationStatus::parse("Nope"), AuthorizationStatus::Invalid);
    }
}
