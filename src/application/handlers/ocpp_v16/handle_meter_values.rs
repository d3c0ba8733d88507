//! MeterValues handler

use rust_ocpp::v1_6::messages::meter_values::{MeterValuesRequest, MeterValuesResponse};
use rust_ocpp::v1_6::types::{Measurand, UnitOfMeasure};
use serde_json::Value;
use tracing::debug;

use super::{parse_request, to_payload};
use crate::application::handlers::OcppHandlerV16;
use crate::application::ports::ProtocolError;

pub async fn handle_meter_values(
    handler: &OcppHandlerV16,
    payload: &Value,
) -> Result<Value, ProtocolError> {
    let req: MeterValuesRequest = parse_request(payload)?;

    // Last energy register sample wins
    let mut energy_wh: Option<f64> = None;
    for meter_value in &req.meter_value {
        for sampled in &meter_value.sampled_value {
            let measurand = sampled
                .measurand
                .clone()
                .unwrap_or(Measurand::EnergyActiveImportRegister);
            if !matches!(measurand, Measurand::EnergyActiveImportRegister) {
                continue;
            }
            let Ok(value) = sampled.value.parse::<f64>() else {
                continue;
            };
            energy_wh = Some(match sampled.unit.as_ref() {
                Some(UnitOfMeasure::KWh) => value * 1000.0,
                _ => value,
            });
        }
    }

    debug!(
        charge_point_id = handler.charge_point_id.as_str(),
        connector_id = req.connector_id,
        transaction_id = ?req.transaction_id,
        ?energy_wh,
        "MeterValues"
    );

    if let Some(wh) = energy_wh {
        handler
            .orchestrator
            .meter_values(
                &handler.charge_point_id,
                req.connector_id,
                req.transaction_id,
                wh.round() as i32,
            )
            .await;
    }

    to_payload(&MeterValuesResponse {})
}
