//! Heartbeat handler

use rust_ocpp::v1_6::messages::heart_beat::HeartbeatResponse;
use serde_json::Value;

use super::to_payload;
use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;

pub async fn handle_heartbeat(
    handler: &OcppHandlerV16,
    _payload: &Value,
) -> Result<Value, ProtocolError> {
    let current_time = handler.orchestrator.heartbeat(&handler.charge_point_id).await;
    to_payload(&HeartbeatResponse { current_time })
}
