//! OCPP 1.6 action handlers
//!
//! Actions are dispatched by name (parsed from `OcppFrame::Call`). Payloads
//! are deserialized into `rust_ocpp::v1_6` types within each handler.

use rust_ocpp::v1_6::types::{AuthorizationStatus as OcppAuthorizationStatus, ChargePointStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;
use crate::domain::{AuthorizationStatus, ConnectorStatus};

mod handle_authorize;
mod handle_boot_notification;
mod handle_heartbeat;
mod handle_meter_values;
mod handle_start_transaction;
mod handle_status_notification;
mod handle_stop_transaction;

pub use handle_authorize::handle_authorize;
pub use handle_boot_notification::handle_boot_notification;
pub use handle_heartbeat::handle_heartbeat;
pub use handle_meter_values::handle_meter_values;
pub use handle_start_transaction::handle_start_transaction;
pub use handle_status_notification::handle_status_notification;
pub use handle_stop_transaction::handle_stop_transaction;

/// Routes OCPP 1.6 actions to their handlers.
pub async fn action_matcher(
    handler: &OcppHandlerV16,
    action: &str,
    payload: &Value,
) -> Result<Value, ProtocolError> {
    match action {
        "Authorize" => handle_authorize(handler, payload).await,
        "BootNotification" => handle_boot_notification(handler, payload).await,
        "Heartbeat" => handle_heartbeat(handler, payload).await,
        "MeterValues" => handle_meter_values(handler, payload).await,
        "StartTransaction" => handle_start_transaction(handler, payload).await,
        "StatusNotification" => handle_status_notification(handler, payload).await,
        "StopTransaction" => handle_stop_transaction(handler, payload).await,
        unknown => {
            warn!(
                charge_point_id = handler.charge_point_id.as_str(),
                action = unknown,
                "Unsupported OCPP 1.6 action"
            );
            Err(ProtocolError::UnknownAction(unknown.to_string()))
        }
    }
}

// ── Payload helpers ────────────────────────────────────────────

pub(crate) fn parse_request<T: DeserializeOwned>(payload: &Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload.clone())
        .map_err(|e| ProtocolError::DeserializationError(e.to_string()))
}

pub(crate) fn to_payload<T: Serialize>(response: &T) -> Result<Value, ProtocolError> {
    serde_json::to_value(response).map_err(|e| ProtocolError::SerializationError(e.to_string()))
}

// ── Type mapping ───────────────────────────────────────────────

pub(crate) fn to_ocpp_status(status: AuthorizationStatus) -> OcppAuthorizationStatus {
    match status {
        AuthorizationStatus::Accepted => OcppAuthorizationStatus::Accepted,
        AuthorizationStatus::Blocked => OcppAuthorizationStatus::Blocked,
        AuthorizationStatus::Expired => OcppAuthorizationStatus::Expired,
        AuthorizationStatus::Invalid => OcppAuthorizationStatus::Invalid,
        AuthorizationStatus::ConcurrentTx => OcppAuthorizationStatus::ConcurrentTx,
    }
}

pub(crate) fn to_connector_status(status: &ChargePointStatus) -> ConnectorStatus {
    match status {
        ChargePointStatus::Available => ConnectorStatus::Available,
        ChargePointStatus::Preparing => ConnectorStatus::Preparing,
        ChargePointStatus::Charging => ConnectorStatus::Charging,
        ChargePointStatus::SuspendedEV => ConnectorStatus::SuspendedEV,
        ChargePointStatus::SuspendedEVSE => ConnectorStatus::SuspendedEVSE,
        ChargePointStatus::Finishing => ConnectorStatus::Finishing,
        ChargePointStatus::Reserved => ConnectorStatus::Reserved,
        ChargePointStatus::Unavailable => ConnectorStatus::Unavailable,
        ChargePointStatus::Faulted => ConnectorStatus::Faulted,
    }
}
