//! Inbound ports: interfaces for handling incoming OCPP messages

use async_trait::async_trait;
use thiserror::Error;

// ── OcppInboundPort ────────────────────────────────────────────

/// Port for handling inbound OCPP messages from a charge point.
///
/// An adapter is created per connection and handles all messages for a
/// single charge point during the lifetime of that connection.
#[async_trait]
pub trait OcppInboundPort: Send + Sync {
    /// Handle a raw OCPP-J text message and return an optional response frame.
    async fn handle_message(&self, text: &str) -> Option<String>;

    fn charge_point_id(&self) -> &str;
}

/// Factory for creating per-connection inbound adapters.
pub trait OcppAdapterFactory: Send + Sync {
    fn create_inbound_adapter(&self, charge_point_id: String) -> Box<dyn OcppInboundPort>;
}

// ── ProtocolError ──────────────────────────────────────────────

/// Errors that can occur during protocol-level processing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Unknown action: {0}")]
    UnknownAction(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ProtocolError {
    /// OCPP-J CallError code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "NotImplemented",
            Self::DeserializationError(_) => "FormationViolation",
            Self::SerializationError(_) => "InternalError",
        }
    }
}
