//! StopTransaction handler

use rust_ocpp::v1_6::messages::stop_transaction::{
    StopTransactionRequest as OcppStopTransactionRequest, StopTransactionResponse,
};
use rust_ocpp::v1_6::types::IdTagInfo;
use serde_json::Value;
use tracing::info;

use super::{parse_request, to_ocpp_status, to_payload};
use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;
use crate::domain::{StopReason, StopTransactionRequest};

pub async fn handle_stop_transaction(
    handler: &OcppHandlerV16,
    payload: &Value,
) -> Result<Value, ProtocolError> {
    let req: OcppStopTransactionRequest = parse_request(payload)?;

    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        transaction_id = req.transaction_id,
        meter_stop = req.meter_stop,
        reason = ?req.reason,
        "StopTransaction"
    );

    // Absent reason means Local in OCPP 1.6
    let reason = req
        .reason
        .as_ref()
        .map(|r| StopReason::parse(&format!("{:?}", r)))
        .unwrap_or(StopReason::Local);

    let result = handler
        .orchestrator
        .stop_transaction(
            &handler.charge_point_id,
            StopTransactionRequest {
                connector_id: None,
                transaction_id: req.transaction_id,
                meter_stop: req.meter_stop,
                stop_timestamp: req.timestamp,
                reason,
                id_tag: req.id_tag,
            },
        )
        .await;

    to_payload(&StopTransactionResponse {
        id_tag_info: Some(IdTagInfo {
            status: to_ocpp_status(result.authorization_status),
            expiry_date: None,
            parent_id_tag: None,
        }),
    })
}
