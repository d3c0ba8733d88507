//! BootNotification handler

use rust_ocpp::v1_6::messages::boot_notification::{
    BootNotificationRequest, BootNotificationResponse,
};
use rust_ocpp::v1_6::types::RegistrationStatus;
use serde_json::Value;
use tracing::info;

use super::{parse_request, to_payload};
use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;
use crate::application::services::{BootInfo, BootStatus, DEFAULT_HEARTBEAT_INTERVAL};

pub async fn handle_boot_notification(
    handler: &OcppHandlerV16,
    payload: &Value,
) -> Result<Value, ProtocolError> {
    let req: BootNotificationRequest = parse_request(payload)?;

    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        vendor = req.charge_point_vendor.as_str(),
        model = req.charge_point_model.as_str(),
        "BootNotification"
    );

    let result = handler
        .orchestrator
        .boot_notification(
            &handler.charge_point_id,
            BootInfo {
                vendor: req.charge_point_vendor,
                model: req.charge_point_model,
                serial_number: req.charge_point_serial_number,
                firmware_version: req.firmware_version,
            },
        )
        .await;

    let status = match result.status {
        BootStatus::Accepted => RegistrationStatus::Accepted,
        BootStatus::Rejected => RegistrationStatus::Rejected,
    };

    to_payload(&BootNotificationResponse {
        current_time: result.current_time,
        interval: result
            .interval
            .try_into()
            .unwrap_or(DEFAULT_HEARTBEAT_INTERVAL as _),
        status,
    })
}
