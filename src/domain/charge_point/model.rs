//! Charge Point domain entity

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Connector status on a charge point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ConnectorStatus {
    #[default]
    Available,
    Preparing,
    Charging,
    SuspendedEV,
    SuspendedEVSE,
    Finishing,
    Reserved,
    Unavailable,
    Faulted,
}

impl ConnectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "Available",
            Self::Preparing => "Preparing",
            Self::Charging => "Charging",
            Self::SuspendedEV => "SuspendedEV",
            Self::SuspendedEVSE => "SuspendedEVSE",
            Self::Finishing => "Finishing",
            Self::Reserved => "Reserved",
            Self::Unavailable => "Unavailable",
            Self::Faulted => "Faulted",
        }
    }

    /// Parse the OCPP status name. Unknown names map to `Unavailable`.
    pub fn parse(s: &str) -> Self {
        match s {
            "Available" => Self::Available,
            "Preparing" => Self::Preparing,
            "Charging" => Self::Charging,
            "SuspendedEV" => Self::SuspendedEV,
            "SuspendedEVSE" => Self::SuspendedEVSE,
            "Finishing" => Self::Finishing,
            "Reserved" => Self::Reserved,
            "Faulted" => Self::Faulted,
            _ => Self::Unavailable,
        }
    }

    /// Statuses only the transaction lifecycle may set
    pub fn is_lifecycle_driven(&self) -> bool {
        matches!(self, Self::Available | Self::Charging)
    }

    /// Faulted or Unavailable: survives the end of a transaction
    pub fn is_out_of_service(&self) -> bool {
        matches!(self, Self::Faulted | Self::Unavailable)
    }
}

impl fmt::Display for ConnectorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable mirror of one connector slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectorRecord {
    /// Connector index on the charge point (1, 2, ...)
    pub connector_id: u32,
    /// Plug type as registered (Type2, CCS, ...)
    pub connector_type: Option<String>,
    pub status: ConnectorStatus,
    /// Last reported energy counter (Wh)
    pub meter_value: i32,
    pub start_timestamp: Option<DateTime<Utc>>,
}

impl ConnectorRecord {
    pub fn new(connector_id: u32) -> Self {
        Self {
            connector_id,
            connector_type: None,
            status: ConnectorStatus::Available,
            meter_value: 0,
            start_timestamp: None,
        }
    }
}

/// Partial update addressed at a single connector slot.
///
/// `charge_point_status` optionally updates the top-level record status
/// in the same write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectorUpdate {
    pub connector_id: u32,
    pub status: ConnectorStatus,
    pub meter_value: i32,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub charge_point_status: Option<ConnectorStatus>,
}

/// Predicate for `find_by_connector` queries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectorFilter {
    pub connector_id: Option<u32>,
    pub status: Option<ConnectorStatus>,
}

impl ConnectorFilter {
    pub fn matches(&self, connector: &ConnectorRecord) -> bool {
        self.connector_id.map_or(true, |id| id == connector.connector_id)
            && self.status.map_or(true, |s| s == connector.status)
    }
}

/// Durable charge point record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargePointRecord {
    /// OCPP identity, also the registry key
    pub id: String,
    /// Unique across all records
    pub serial_number: String,
    pub vendor: Option<String>,
    pub model: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub status: ConnectorStatus,
    pub connectors: Vec<ConnectorRecord>,
    pub last_activity: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl ChargePointRecord {
    pub fn new(id: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            serial_number: serial_number.into(),
            vendor: None,
            model: None,
            password_hash: None,
            status: ConnectorStatus::Unavailable,
            connectors: Vec::new(),
            last_activity: None,
            registered_at: Utc::now(),
        }
    }

    pub fn connector(&self, connector_id: u32) -> Option<&ConnectorRecord> {
        self.connectors.iter().find(|c| c.connector_id == connector_id)
    }

    /// Apply an update to exactly one connector slot, leaving siblings untouched.
    pub fn apply_connector_update(&mut self, update: &ConnectorUpdate) {
        let slot = match self
            .connectors
            .iter_mut()
            .position(|c| c.connector_id == update.connector_id)
        {
            Some(idx) => &mut self.connectors[idx],
            None => {
                self.connectors.push(ConnectorRecord::new(update.connector_id));
                self.connectors.sort_by_key(|c| c.connector_id);
                let idx = self
                    .connectors
                    .iter()
                    .position(|c| c.connector_id == update.connector_id)
                    .unwrap_or_default();
                &mut self.connectors[idx]
            }
        };

        slot.status = update.status;
        slot.meter_value = update.meter_value;
        slot.start_timestamp = update.start_timestamp;

        if let Some(status) = update.charge_point_status {
            self.status = status;
        }
    }

    pub fn has_connector_matching(&self, filter: &ConnectorFilter) -> bool {
        self.connectors.iter().any(|c| filter.matches(c))
    }
}

/// Input for registering a new charge point
#[derive(Debug, Clone, Deserialize)]
pub struct ChargePointRegistration {
    pub id: String,
    pub serial_number: String,
    pub vendor: Option<String>,
    pub model: Option<String>,
    /// One entry per connector, in index order starting at 1
    #[serde(default)]
    pub connector_types: Vec<String>,
    pub password: String,
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_two_connectors() -> ChargePointRecord {
        let mut cp = ChargePointRecord::new("CP-1", "SN-001");
        cp.connectors.push(ConnectorRecord::new(1));
        cp.connectors.push(ConnectorRecord::new(2));
        cp
    }

    #[test]
    fn status_parse_and_display_agree() {
        for status in [
            ConnectorStatus::Available,
            ConnectorStatus::SuspendedEVSE,
            ConnectorStatus::Faulted,
        ] {
            assert_eq!(ConnectorStatus::parse(status.as_str()), status);
        }
        assert_eq!(ConnectorStatus::parse("bogus"), ConnectorStatus::Unavailable);
    }

    #[test]
    fn connector_update_leaves_siblings_untouched() {
        let mut cp = record_with_two_connectors();
        cp.connectors[1].meter_value = 777;

        let started = Utc::now();
        cp.apply_connector_update(&ConnectorUpdate {
            connector_id: 1,
            status: ConnectorStatus::Charging,
            meter_value: 100,
            start_timestamp: Some(started),
            charge_point_status: Some(ConnectorStatus::Charging),
        });

        assert_eq!(cp.status, ConnectorStatus::Charging);
        assert_eq!(cp.connector(1).unwrap().status, ConnectorStatus::Charging);
        assert_eq!(cp.connector(1).unwrap().start_timestamp, Some(started));
        assert_eq!(cp.connector(2).unwrap().status, ConnectorStatus::Available);
        assert_eq!(cp.connector(2).unwrap().meter_value, 777);
    }

    #[test]
    fn connector_update_creates_missing_slot_in_order() {
        let mut cp = record_with_two_connectors();
        cp.apply_connector_update(&ConnectorUpdate {
            connector_id: 3,
            status: ConnectorStatus::Faulted,
            meter_value: 0,
            start_timestamp: None,
            charge_point_status: None,
        });

        let ids: Vec<u32> = cp.connectors.iter().map(|c| c.connector_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(cp.status, ConnectorStatus::Unavailable);
    }

    #[test]
    fn filter_matches_on_any_given_field() {
        let cp = record_with_two_connectors();
        assert!(cp.has_connector_matching(&ConnectorFilter::default()));
        assert!(cp.has_connector_matching(&ConnectorFilter {
            connector_id: Some(2),
            status: None,
        }));
        assert!(!cp.has_connector_matching(&ConnectorFilter {
            connector_id: Some(2),
            status: Some(ConnectorStatus::Charging),
        }));
    }
}
