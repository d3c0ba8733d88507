//! Live charge point session and connector state machine

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::effect::Effect;
use crate::domain::charge_point::{ConnectorStatus, ConnectorUpdate};
use crate::domain::transaction::TransactionState;

/// Transaction slot of a single connector
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransactionSlot {
    #[default]
    Idle,
    /// Authorization requested, not yet confirmed
    PendingStart { id_tag: String },
    Active(TransactionState),
}

impl TransactionSlot {
    pub fn active(&self) -> Option<&TransactionState> {
        match self {
            Self::Active(tx) => Some(tx),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// In-memory state of one connector.
///
/// `status == Charging` holds exactly when `slot` is `Active`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConnectorState {
    pub status: ConnectorStatus,
    /// Last reported energy counter (Wh)
    pub meter_value: i32,
    pub start_timestamp: Option<DateTime<Utc>>,
    pub slot: TransactionSlot,
    /// Last status the charge point reported while the lifecycle owned `status`
    pub reported_status: Option<ConnectorStatus>,
}

impl ConnectorState {
    /// `Available → Charging`, driven by a confirmed start
    pub(super) fn begin_charging(&mut self, transaction: TransactionState) {
        self.status = ConnectorStatus::Charging;
        self.meter_value = transaction.meter_start;
        self.start_timestamp = Some(transaction.start_timestamp);
        self.reported_status = None;
        self.slot = TransactionSlot::Active(transaction);
    }

    /// `Charging → Available`, driven by stop finalization.
    ///
    /// A Faulted or Unavailable report held back during the transaction
    /// (or already current on an idle connector) is kept instead.
    pub(super) fn end_charging(&mut self) {
        let held = self
            .reported_status
            .take()
            .into_iter()
            .chain(std::iter::once(self.status))
            .find(ConnectorStatus::is_out_of_service);
        self.status = held.unwrap_or(ConnectorStatus::Available);
        self.meter_value = 0;
        self.start_timestamp = None;
        self.slot = TransactionSlot::Idle;
    }

    pub fn invariant_holds(&self) -> bool {
        (self.status == ConnectorStatus::Charging) == self.slot.is_active()
    }

    fn to_update(&self, connector_id: u32, charge_point_status: Option<ConnectorStatus>) -> ConnectorUpdate {
        ConnectorUpdate {
            connector_id,
            status: self.status,
            meter_value: self.meter_value,
            start_timestamp: self.start_timestamp,
            charge_point_status,
        }
    }
}

/// Outcome of a status notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusApplied {
    /// Written verbatim; carries the persistence effect
    Applied(Effect),
    /// Held back because the transaction lifecycle owns the connector status
    Deferred,
}

/// Outcome of a meter reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterOutcome {
    Updated,
    /// Reading below the current counter; ignored
    Regressed { current: i32 },
    /// No open transaction on the connector (or a different one)
    NoActiveTransaction,
}

/// Live state of a connected charge point
#[derive(Debug, Clone)]
pub struct ChargePointSession {
    pub id: String,
    pub connectors: BTreeMap<u32, ConnectorState>,
    pub serial_number: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    pub last_activity: DateTime<Utc>,
    /// Removed from the registry; holders of a stale handle must look it up again
    evicted: bool,
}

impl ChargePointSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            connectors: BTreeMap::new(),
            serial_number: None,
            vendor: None,
            model: None,
            last_activity: Utc::now(),
            evicted: false,
        }
    }

    pub fn is_evicted(&self) -> bool {
        self.evicted
    }

    pub(crate) fn mark_evicted(&mut self) {
        self.evicted = true;
    }

    pub fn connector(&self, connector_id: u32) -> Option<&ConnectorState> {
        self.connectors.get(&connector_id)
    }

    pub(super) fn connector_mut(&mut self, connector_id: u32) -> &mut ConnectorState {
        self.connectors.entry(connector_id).or_default()
    }

    pub fn active_transaction(&self, connector_id: u32) -> Option<&TransactionState> {
        self.connector(connector_id).and_then(|c| c.slot.active())
    }

    pub fn active_transactions(&self) -> impl Iterator<Item = &TransactionState> {
        self.connectors.values().filter_map(|c| c.slot.active())
    }

    pub fn has_open_transaction(&self) -> bool {
        self.connectors.values().any(|c| !c.slot.is_idle())
    }

    /// Charging if any connector is charging, otherwise Available
    pub fn aggregate_status(&self) -> ConnectorStatus {
        if self.connectors.values().any(|c| c.slot.is_active()) {
            ConnectorStatus::Charging
        } else {
            ConnectorStatus::Available
        }
    }

    pub fn invariant_holds(&self) -> bool {
        self.connectors.values().all(ConnectorState::invariant_holds)
    }

    pub fn touch(&mut self, now: DateTime<Utc>) -> Effect {
        self.last_activity = now;
        Effect::PersistLastActivity {
            charge_point_id: self.id.clone(),
            at: now,
        }
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.last_activity)
    }

    pub fn record_boot(
        &mut self,
        vendor: impl Into<String>,
        model: impl Into<String>,
        serial_number: Option<String>,
    ) {
        self.vendor = Some(vendor.into());
        self.model = Some(model.into());
        if serial_number.is_some() {
            self.serial_number = serial_number;
        }
    }

    /// Apply a status reported by the charge point.
    ///
    /// Connector 0 addresses the charge point as a whole. `Charging` is never
    /// taken from a notification, and nothing overrides `Charging` while a
    /// transaction is open; such reports are kept in `reported_status`.
    pub fn apply_status_notification(
        &mut self,
        connector_id: u32,
        status: ConnectorStatus,
    ) -> StatusApplied {
        if connector_id == 0 {
            return StatusApplied::Applied(Effect::PersistChargePointStatus {
                charge_point_id: self.id.clone(),
                status,
            });
        }

        let connector = self.connector_mut(connector_id);
        if !connector.slot.is_idle() || status == ConnectorStatus::Charging {
            connector.reported_status = Some(status);
            return StatusApplied::Deferred;
        }

        connector.status = status;
        connector.reported_status = None;
        let update = connector.to_update(connector_id, None);
        StatusApplied::Applied(Effect::PersistConnector {
            charge_point_id: self.id.clone(),
            update,
        })
    }

    /// Record an energy register reading for an open transaction.
    pub fn record_meter_value(
        &mut self,
        connector_id: u32,
        transaction_id: Option<i32>,
        energy_wh: i32,
    ) -> MeterOutcome {
        let Some(connector) = self.connectors.get_mut(&connector_id) else {
            return MeterOutcome::NoActiveTransaction;
        };
        let Some(tx) = connector.slot.active() else {
            return MeterOutcome::NoActiveTransaction;
        };
        if transaction_id.map_or(false, |id| id != tx.transaction_id) {
            return MeterOutcome::NoActiveTransaction;
        }
        if energy_wh < connector.meter_value {
            return MeterOutcome::Regressed {
                current: connector.meter_value,
            };
        }
        connector.meter_value = energy_wh;
        MeterOutcome::Updated
    }

    pub(super) fn connector_effect(
        &self,
        connector_id: u32,
        charge_point_status: Option<ConnectorStatus>,
    ) -> Option<Effect> {
        self.connector(connector_id).map(|c| Effect::PersistConnector {
            charge_point_id: self.id.clone(),
            update: c.to_update(connector_id, charge_point_status),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn charging_session() -> ChargePointSession {
        let mut session = ChargePointSession::new("CP-1");
        let tx = TransactionState::new(7, "CP-1", 1, "TAG1", 100, Utc::now());
        session.connector_mut(1).begin_charging(tx);
        session
    }

    #[test]
    fn new_session_is_empty() {
        let session = ChargePointSession::new("CP-1");
        assert!(session.connectors.is_empty());
        assert!(!session.has_open_transaction());
        assert_eq!(session.aggregate_status(), ConnectorStatus::Available);
        assert!(session.invariant_holds());
    }

    #[test]
    fn faulted_notification_passes_through_when_idle() {
        let mut session = ChargePointSession::new("CP-1");
        let applied = session.apply_status_notification(2, ConnectorStatus::Faulted);

        assert!(matches!(applied, StatusApplied::Applied(Effect::PersistConnector { .. })));
        assert_eq!(session.connector(2).unwrap().status, ConnectorStatus::Faulted);
        assert!(session.invariant_holds());
    }

    #[test]
    fn charging_notification_without_transaction_is_deferred() {
        let mut session = ChargePointSession::new("CP-1");
        let applied = session.apply_status_notification(1, ConnectorStatus::Charging);

        assert_eq!(applied, StatusApplied::Deferred);
        let connector = session.connector(1).unwrap();
        assert_eq!(connector.status, ConnectorStatus::Available);
        assert_eq!(connector.reported_status, Some(ConnectorStatus::Charging));
        assert!(session.invariant_holds());
    }

    #[test]
    fn notifications_during_transaction_keep_charging() {
        let mut session = charging_session();
        let applied = session.apply_status_notification(1, ConnectorStatus::SuspendedEV);

        assert_eq!(applied, StatusApplied::Deferred);
        assert_eq!(session.connector(1).unwrap().status, ConnectorStatus::Charging);
        assert!(session.invariant_holds());
    }

    #[test]
    fn fault_reported_mid_transaction_survives_the_stop() {
        let mut session = charging_session();
        session.apply_status_notification(1, ConnectorStatus::Faulted);
        assert_eq!(session.connector(1).unwrap().status, ConnectorStatus::Charging);

        session.connector_mut(1).end_charging();

        let connector = session.connector(1).unwrap();
        assert_eq!(connector.status, ConnectorStatus::Faulted);
        assert_eq!(connector.reported_status, None);
        assert_eq!(connector.meter_value, 0);
        assert!(session.invariant_holds());
    }

    #[test]
    fn transient_reports_do_not_survive_the_stop() {
        let mut session = charging_session();
        session.apply_status_notification(1, ConnectorStatus::SuspendedEV);

        session.connector_mut(1).end_charging();

        assert_eq!(session.connector(1).unwrap().status, ConnectorStatus::Available);
    }

    #[test]
    fn connector_zero_targets_charge_point() {
        let mut session = ChargePointSession::new("CP-1");
        let applied = session.apply_status_notification(0, ConnectorStatus::Unavailable);

        assert!(matches!(
            applied,
            StatusApplied::Applied(Effect::PersistChargePointStatus {
                status: ConnectorStatus::Unavailable,
                ..
            })
        ));
        assert!(session.connectors.is_empty());
    }

    #[test]
    fn meter_values_are_monotonic_while_active() {
        let mut session = charging_session();
        assert_eq!(session.record_meter_value(1, Some(7), 250), MeterOutcome::Updated);
        assert_eq!(
            session.record_meter_value(1, None, 200),
            MeterOutcome::Regressed { current: 250 }
        );
        assert_eq!(
            session.record_meter_value(1, Some(8), 300),
            MeterOutcome::NoActiveTransaction
        );
        assert_eq!(
            session.record_meter_value(2, None, 300),
            MeterOutcome::NoActiveTransaction
        );
        assert_eq!(session.connector(1).unwrap().meter_value, 250);
    }

    #[test]
    fn touch_updates_last_activity() {
        let mut session = ChargePointSession::new("CP-1");
        let later = session.last_activity + chrono::Duration::seconds(30);
        let effect = session.touch(later);

        assert_eq!(session.last_activity, later);
        assert!(matches!(effect, Effect::PersistLastActivity { at, .. } if at == later));
    }
}
