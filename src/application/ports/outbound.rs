//! Outbound ports: collaborators the orchestrator calls out to
//!
//! Authorization policy, the message broker and credential hashing sit
//! behind these traits so the transaction path can be exercised without
//! a real backend.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::AuthorizationStatus;

// ── Authorizer ─────────────────────────────────────────────────

/// Access-control policy for id tags.
///
/// Never fails: a policy that cannot decide answers with a status.
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn authorize(&self, id_tag: &str) -> AuthorizationStatus;
}

// ── EventPublisher ─────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("Failed to encode payload: {0}")]
    Encode(String),
    #[error("Broker channel closed")]
    Closed,
    #[error("Broker error: {0}")]
    Broker(String),
}

/// Publish-only broker port. At-most-once; callers never await delivery
/// acknowledgment beyond the returned result.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> Result<(), PublishError>;
}

// ── CredentialHasher ───────────────────────────────────────────

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Password must not be empty")]
    Empty,
    #[error("Hashing failed: {0}")]
    Hash(String),
}

pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String, CredentialError>;
    fn verify(&self, password: &str, hash: &str) -> Result<bool, CredentialError>;
}
