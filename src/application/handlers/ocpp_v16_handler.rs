//! OCPP 1.6 message handler
//!
//! Parses raw OCPP-J frames, dispatches calls to action handlers and
//! serializes responses using `rust_ocpp::v1_6` types.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::application::handlers::ocpp_v16::action_matcher;
use crate::application::ports::{OcppAdapterFactory, OcppInboundPort};
use crate::application::services::SharedOrchestrator;
use crate::support::ocpp_frame::OcppFrame;

/// Handler for OCPP 1.6 messages of one charge point connection
pub struct OcppHandlerV16 {
    pub charge_point_id: String,
    pub orchestrator: SharedOrchestrator,
}

impl OcppHandlerV16 {
    pub fn new(charge_point_id: impl Into<String>, orchestrator: SharedOrchestrator) -> Self {
        Self {
            charge_point_id: charge_point_id.into(),
            orchestrator,
        }
    }

    pub async fn handle(&self, text: &str) -> Option<String> {
        debug!(
            charge_point_id = self.charge_point_id.as_str(),
            raw = text,
            "Received raw message"
        );

        let frame = match OcppFrame::parse(text) {
            Ok(f) => f,
            Err(e) => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    error = %e,
                    "Failed to parse OCPP message"
                );
                return None;
            }
        };

        match frame {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => Some(self.handle_call(&unique_id, &action, payload).await),

            OcppFrame::CallResult { unique_id, .. } => {
                debug!(
                    charge_point_id = self.charge_point_id.as_str(),
                    message_id = unique_id.as_str(),
                    "Ignoring CallResult, no outstanding requests"
                );
                None
            }

            OcppFrame::CallError {
                unique_id,
                error_code,
                error_description,
                ..
            } => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    message_id = unique_id.as_str(),
                    error_code = error_code.as_str(),
                    error_description = error_description.as_str(),
                    "Received CallError"
                );
                None
            }
        }
    }

    async fn handle_call(&self, unique_id: &str, action: &str, payload: Value) -> String {
        info!(
            charge_point_id = self.charge_point_id.as_str(),
            action,
            "Received Call"
        );

        // Heartbeat and BootNotification record activity themselves
        if !matches!(action, "Heartbeat" | "BootNotification") {
            self.orchestrator.touch(&self.charge_point_id).await;
        }

        let frame = match action_matcher(self, action, &payload).await {
            Ok(response) => OcppFrame::result(unique_id, response),
            Err(e) => {
                warn!(
                    charge_point_id = self.charge_point_id.as_str(),
                    action,
                    error = %e,
                    "Replying with CallError"
                );
                OcppFrame::error_response(unique_id, e.error_code(), e.to_string())
            }
        };
        frame.serialize()
    }
}

#[async_trait]
impl OcppInboundPort for OcppHandlerV16 {
    async fn handle_message(&self, text: &str) -> Option<String> {
        self.handle(text).await
    }

    fn charge_point_id(&self) -> &str {
        &self.charge_point_id
    }
}

// ── V16AdapterFactory ──────────────────────────────────────────

/// Creates one OCPP 1.6 handler per charge point connection
pub struct V16AdapterFactory {
    orchestrator: SharedOrchestrator,
}

impl V16AdapterFactory {
    pub fn new(orchestrator: SharedOrchestrator) -> Self {
        Self { orchestrator }
    }
}

impl OcppAdapterFactory for V16AdapterFactory {
    fn create_inbound_adapter(&self, charge_point_id: String) -> Box<dyn OcppInboundPort> {
        Box::new(OcppHandlerV16::new(charge_point_id, self.orchestrator.clone()))
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::application::effects::{EffectDispatcher, PublishTarget};
    use crate::application::services::{AcceptAllAuthorizer, Orchestrator, TransactionSequence};
    use crate::application::session::ChargePointRegistry;
    use crate::domain::{ConnectorStatus, TransactionRepository};
    use crate::infrastructure::storage::InMemoryStorage;
    use crate::notifications::BrokerPublisher;

    fn handler() -> (OcppHandlerV16, Arc<InMemoryStorage>) {
        let store = Arc::new(InMemoryStorage::new());
        let effects = EffectDispatcher::spawn(
            store.clone(),
            store.clone(),
            Arc::new(BrokerPublisher::new()),
            PublishTarget::default(),
        );
        let orchestrator = Orchestrator::new(
            ChargePointRegistry::shared(),
            Arc::new(AcceptAllAuthorizer),
            Arc::new(TransactionSequence::default()),
            effects,
            store.clone(),
        );
        (OcppHandlerV16::new("CP-1", Arc::new(orchestrator)), store)
    }

    async fn call(handler: &OcppHandlerV16, text: &str) -> Value {
        let response = handler.handle(text).await.expect("response frame");
        serde_json::from_str(&response).unwrap()
    }

    #[tokio::test]
    async fn start_and_stop_over_the_wire() {
        let (handler, store) = handler();

        let started = call(
            &handler,
            r#"[2,"1","StartTransaction",{"connectorId":1,"idTag":"TAG1","meterStart":0,"timestamp":"2024-01-01T10:00:00Z"}]"#,
        )
        .await;
        assert_eq!(started[0], 3);
        assert_eq!(started[1], "1");
        assert_eq!(started[2]["transactionId"], 1);
        assert_eq!(started[2]["idTagInfo"]["status"], "Accepted");

        let session = handler.orchestrator.session("CP-1").await.unwrap();
        assert_eq!(session.connector(1).unwrap().status, ConnectorStatus::Charging);

        let stopped = call(
            &handler,
            r#"[2,"2","StopTransaction",{"transactionId":1,"meterStop":500,"timestamp":"2024-01-01T11:00:00Z","reason":"EVDisconnected"}]"#,
        )
        .await;
        assert_eq!(stopped[2]["idTagInfo"]["status"], "Invalid");

        handler.orchestrator.flush().await;
        let record = TransactionRepository::find_by_id(store.as_ref(), 1)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.meter_stop, Some(500));
        assert_eq!(record.stop_reason.map(|r| r.as_str()), Some("EVDisconnected"));
    }

    #[tokio::test]
    async fn unknown_action_is_not_implemented() {
        let (handler, _) = handler();
        let response = call(&handler, r#"[2,"9","FrobnicateWidget",{}]"#).await;

        assert_eq!(response[0], 4);
        assert_eq!(response[1], "9");
        assert_eq!(response[2], "NotImplemented");
    }

    #[tokio::test]
    async fn malformed_payload_is_formation_violation() {
        let (handler, _) = handler();
        let response = call(&handler, r#"[2,"3","StartTransaction",{"connectorId":"one"}]"#).await;

        assert_eq!(response[0], 4);
        assert_eq!(response[2], "FormationViolation");
    }

    #[tokio::test]
    async fn boot_heartbeat_and_status() {
        let (handler, _) = handler();

        let boot = call(
            &handler,
            r#"[2,"1","BootNotification",{"chargePointVendor":"Acme","chargePointModel":"X1"}]"#,
        )
        .await;
        assert_eq!(boot[2]["status"], "Accepted");
        assert_eq!(boot[2]["interval"], 300);

        let heartbeat = call(&handler, r#"[2,"2","Heartbeat",{}]"#).await;
        assert!(heartbeat[2]["currentTime"].is_string());

        let status = call(
            &handler,
            r#"[2,"3","StatusNotification",{"connectorId":2,"errorCode":"GroundFailure","status":"Faulted"}]"#,
        )
        .await;
        assert_eq!(status[0], 3);

        let session = handler.orchestrator.session("CP-1").await.unwrap();
        assert_eq!(session.vendor.as_deref(), Some("Acme"));
        assert_eq!(session.connector(2).unwrap().status, ConnectorStatus::Faulted);
    }

    #[tokio::test]
    async fn meter_values_in_kwh_are_converted() {
        let (handler, _) = handler();
        call(
            &handler,
            r#"[2,"1","StartTransaction",{"connectorId":1,"idTag":"TAG1","meterStart":1000,"timestamp":"2024-01-01T10:00:00Z"}]"#,
        )
        .await;

        call(
            &handler,
            r#"[2,"2","MeterValues",{"connectorId":1,"transactionId":1,"meterValue":[{"timestamp":"2024-01-01T10:05:00Z","sampledValue":[{"value":"1.5","measurand":"Energy.Active.Import.Register","unit":"kWh"}]}]}]"#,
        )
        .await;

        let session = handler.orchestrator.session("CP-1").await.unwrap();
        assert_eq!(session.connector(1).unwrap().meter_value, 1500);
    }

    #[tokio::test]
    async fn call_results_get_no_reply() {
        let (handler, _) = handler();
        assert!(handler.handle(r#"[3,"x",{}]"#).await.is_none());
        assert!(handler.handle("garbage").await.is_none());
    }
}
