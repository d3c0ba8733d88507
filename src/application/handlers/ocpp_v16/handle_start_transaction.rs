//! StartTransaction handler

use rust_ocpp::v1_6::messages::start_transaction::{
    StartTransactionRequest as OcppStartTransactionRequest, StartTransactionResponse,
};
use rust_ocpp::v1_6::types::IdTagInfo;
use serde_json::Value;
use tracing::info;

use super::{parse_request, to_ocpp_status, to_payload};
use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;
use crate::application::services::StartTransactionRequest;

pub async fn handle_start_transaction(
    handler: &OcppHandlerV16,
    payload: &Value,
) -> Result<Value, ProtocolError> {
    let req: OcppStartTransactionRequest = parse_request(payload)?;

    info!(
        charge_point_id = handler.charge_point_id.as_str(),
        connector_id = req.connector_id,
        id_tag = req.id_tag.as_str(),
        meter_start = req.meter_start,
        "StartTransaction"
    );

    let result = handler
        .orchestrator
        .start_transaction(
            &handler.charge_point_id,
            StartTransactionRequest {
                connector_id: req.connector_id,
                id_tag: req.id_tag,
                meter_start: req.meter_start,
                start_timestamp: req.timestamp,
            },
        )
        .await;

    to_payload(&StartTransactionResponse {
        transaction_id: result.transaction_id,
        id_tag_info: IdTagInfo {
            status: to_ocpp_status(result.authorization_status),
            expiry_date: None,
            parent_id_tag: None,
        },
    })
}
