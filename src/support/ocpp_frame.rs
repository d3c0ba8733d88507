//! OCPP-J message framing
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`

use serde_json::Value;
use thiserror::Error;

// ── Message-type constants ─────────────────────────────────────

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

// ── OcppFrame ──────────────────────────────────────────────────

/// A parsed OCPP-J frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OcppFrame {
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    CallResult {
        unique_id: String,
        payload: Value,
    },
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl OcppFrame {
    /// Parse raw JSON text into a frame.
    pub fn parse(text: &str) -> Result<Self, OcppFrameError> {
        let arr: Vec<Value> =
            serde_json::from_str(text).map_err(|e| OcppFrameError::InvalidJson(e.to_string()))?;

        let msg_type = arr
            .first()
            .ok_or(OcppFrameError::EmptyArray)?
            .as_u64()
            .ok_or(OcppFrameError::InvalidMessageType)?;

        let (expected, constructor): (usize, fn(&[Value]) -> Result<Self, OcppFrameError>) =
            match msg_type {
                MSG_TYPE_CALL => (4, Self::parse_call),
                MSG_TYPE_CALL_RESULT => (3, Self::parse_call_result),
                MSG_TYPE_CALL_ERROR => (4, Self::parse_call_error),
                other => return Err(OcppFrameError::UnknownMessageType(other)),
            };
        if arr.len() < expected {
            return Err(OcppFrameError::MissingFields {
                expected,
                got: arr.len(),
            });
        }
        constructor(&arr)
    }

    fn unique_id_of(arr: &[Value]) -> Result<String, OcppFrameError> {
        arr[1]
            .as_str()
            .map(str::to_string)
            .ok_or(OcppFrameError::FieldTypeMismatch("uniqueId must be a string"))
    }

    fn parse_call(arr: &[Value]) -> Result<Self, OcppFrameError> {
        let action = arr[2]
            .as_str()
            .ok_or(OcppFrameError::FieldTypeMismatch("action must be a string"))?
            .to_string();
        Ok(Self::Call {
            unique_id: Self::unique_id_of(arr)?,
            action,
            payload: arr[3].clone(),
        })
    }

    fn parse_call_result(arr: &[Value]) -> Result<Self, OcppFrameError> {
        Ok(Self::CallResult {
            unique_id: Self::unique_id_of(arr)?,
            payload: arr[2].clone(),
        })
    }

    fn parse_call_error(arr: &[Value]) -> Result<Self, OcppFrameError> {
        Ok(Self::CallError {
            unique_id: Self::unique_id_of(arr)?,
            error_code: arr[2].as_str().unwrap_or("InternalError").to_string(),
            error_description: arr[3].as_str().unwrap_or_default().to_string(),
            error_details: arr
                .get(4)
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default())),
        })
    }

    // ── Serialization ──────────────────────────────────────

    pub fn serialize(&self) -> String {
        let arr = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => vec![
                MSG_TYPE_CALL.into(),
                unique_id.as_str().into(),
                action.as_str().into(),
                payload.clone(),
            ],
            Self::CallResult { unique_id, payload } => vec![
                MSG_TYPE_CALL_RESULT.into(),
                unique_id.as_str().into(),
                payload.clone(),
            ],
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => vec![
                MSG_TYPE_CALL_ERROR.into(),
                unique_id.as_str().into(),
                error_code.as_str().into(),
                error_description.as_str().into(),
                error_details.clone(),
            ],
        };
        Value::Array(arr).to_string()
    }

    // ── Helpers ────────────────────────────────────────────

    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. }
            | Self::CallResult { unique_id, .. }
            | Self::CallError { unique_id, .. } => unique_id,
        }
    }

    pub fn result(unique_id: impl Into<String>, payload: Value) -> Self {
        Self::CallResult {
            unique_id: unique_id.into(),
            payload,
        }
    }

    pub fn error_response(
        unique_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: Value::Object(Default::default()),
        }
    }
}

// ── Errors ─────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OcppFrameError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),
    #[error("Empty OCPP message array")]
    EmptyArray,
    #[error("Message type is not a number")]
    InvalidMessageType,
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),
    #[error("Expected at least {expected} fields, got {got}")]
    MissingFields { expected: usize, got: usize },
    #[error("Field type mismatch: {0}")]
    FieldTypeMismatch(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_start_transaction_call() {
        let text = r#"[2,"19223201","StartTransaction",{"connectorId":1,"idTag":"TAG1","meterStart":0,"timestamp":"2024-01-01T00:00:00Z"}]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::Call {
                unique_id,
                action,
                payload,
            } => {
                assert_eq!(unique_id, "19223201");
                assert_eq!(action, "StartTransaction");
                assert_eq!(payload["idTag"], "TAG1");
            }
            other => panic!("Expected Call frame, got {other:?}"),
        }
    }

    #[test]
    fn parse_call_error_defaults_details() {
        let text = r#"[4,"abc","NotImplemented","Action not supported"]"#;
        match OcppFrame::parse(text).unwrap() {
            OcppFrame::CallError {
                error_code,
                error_details,
                ..
            } => {
                assert_eq!(error_code, "NotImplemented");
                assert!(error_details.as_object().unwrap().is_empty());
            }
            other => panic!("Expected CallError frame, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(
            OcppFrame::parse("not json"),
            Err(OcppFrameError::InvalidJson(_))
        ));
        assert_eq!(OcppFrame::parse("[]"), Err(OcppFrameError::EmptyArray));
        assert_eq!(
            OcppFrame::parse(r#"[9,"a"]"#),
            Err(OcppFrameError::UnknownMessageType(9))
        );
        assert_eq!(
            OcppFrame::parse(r#"[2,"a","Heartbeat"]"#),
            Err(OcppFrameError::MissingFields { expected: 4, got: 3 })
        );
        assert_eq!(
            OcppFrame::parse(r#"[2,7,"Heartbeat",{}]"#),
            Err(OcppFrameError::FieldTypeMismatch("uniqueId must be a string"))
        );
    }

    #[test]
    fn serializes_call_result_and_error() {
        let ok = OcppFrame::result("id1", serde_json::json!({"transactionId": 1}));
        assert_eq!(ok.serialize(), r#"[3,"id1",{"transactionId":1}]"#);

        let err = OcppFrame::error_response("id2", "NotImplemented", "Unknown action: Foo");
        assert_eq!(
            err.serialize(),
            r#"[4,"id2","NotImplemented","Unknown action: Foo",{}]"#
        );
        assert_eq!(OcppFrame::parse(&err.serialize()).unwrap(), err);
    }
}
