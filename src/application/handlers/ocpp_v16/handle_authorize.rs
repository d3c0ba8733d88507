//! Authorize handler

use rust_ocpp::v1_6::messages::authorize::{AuthorizeRequest, AuthorizeResponse};
use rust_ocpp::v1_6::types::IdTagInfo;
use serde_json::Value;

use super::{parse_request, to_ocpp_status, to_payload};
use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;

pub async fn handle_authorize(
    handler: &OcppHandlerV16,
    payload: &Value,
) -> Result<Value, ProtocolError> {
    let req: AuthorizeRequest = parse_request(payload)?;

    let status = handler
        .orchestrator
        .authorize(&handler.charge_point_id, &req.id_tag)
        .await;

    to_payload(&AuthorizeResponse {
        id_tag_info: IdTagInfo {
            status: to_ocpp_status(status),
            expiry_date: None,
            parent_id_tag: None,
        },
    })
}
