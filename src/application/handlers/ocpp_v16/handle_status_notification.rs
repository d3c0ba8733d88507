//! StatusNotification handler

use rust_ocpp::v1_6::messages::status_notification::{
    StatusNotificationRequest, StatusNotificationResponse,
};
use serde_json::Value;
use tracing::debug;

use super::{parse_request, to_connector_status, to_payload};
use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;

pub async fn handle_status_notification(
    handler: &OcppHandlerV16,
    payload: &Value,
) -> Result<Value, ProtocolError> {
    let req: StatusNotificationRequest = parse_request(payload)?;

    debug!(
        charge_point_id = handler.charge_point_id.as_str(),
        connector_id = req.connector_id,
        status = ?req.status,
        error_code = ?req.error_code,
        "StatusNotification"
    );

    handler
        .orchestrator
        .status_notification(
            &handler.charge_point_id,
            req.connector_id,
            to_connector_status(&req.status),
        )
        .await;

    to_payload(&StatusNotificationResponse {})
}
