//! Id tag authorization policies

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::debug;

use crate::application::ports::Authorizer;
use crate::config::{AuthorizationConfig, AuthorizationMode};
use crate::domain::AuthorizationStatus;

/// Accepts every id tag. Used when no access-control backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct AcceptAllAuthorizer;

#[async_trait]
impl Authorizer for AcceptAllAuthorizer {
    async fn authorize(&self, _id_tag: &str) -> AuthorizationStatus {
        AuthorizationStatus::Accepted
    }
}

/// Static allow/block lists.
///
/// Blocked tags answer `Blocked`; with a non-empty allow list, unknown tags
/// answer `Invalid`.
#[derive(Debug, Default, Clone)]
pub struct StaticListAuthorizer {
    allowed: HashSet<String>,
    blocked: HashSet<String>,
}

impl StaticListAuthorizer {
    pub fn new(
        allowed: impl IntoIterator<Item = String>,
        blocked: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            blocked: blocked.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Authorizer for StaticListAuthorizer {
    async fn authorize(&self, id_tag: &str) -> AuthorizationStatus {
        let status = if self.blocked.contains(id_tag) {
            AuthorizationStatus::Blocked
        } else if self.allowed.is_empty() || self.allowed.contains(id_tag) {
            AuthorizationStatus::Accepted
        } else {
            AuthorizationStatus::Invalid
        };
        debug!(id_tag, %status, "Id tag authorization");
        status
    }
}

/// Build the configured policy
pub fn authorizer_from_config(config: &AuthorizationConfig) -> Box<dyn Authorizer> {
    match config.mode {
        AuthorizationMode::AcceptAll => Box::new(AcceptAllAuthorizer),
        AuthorizationMode::List => Box::new(StaticListAuthorizer::new(
            config.allowed_id_tags.iter().cloned(),
            config.blocked_id_tags.iter().cloned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn accept_all_accepts() {
        assert_eq!(
            AcceptAllAuthorizer.authorize("anything").await,
            AuthorizationStatus::Accepted
        );
    }

    #[tokio::test]
    async fn list_policy() {
        let auth = StaticListAuthorizer::new(
            vec!["TAG1".to_string(), "TAG2".to_string()],
            vec!["TAG2".to_string()],
        );
        assert_eq!(auth.authorize("TAG1").await, AuthorizationStatus::Accepted);
        assert_eq!(auth.authorize("TAG2").await, AuthorizationStatus::Blocked);
        assert_eq!(auth.authorize("TAG3").await, AuthorizationStatus::Invalid);
    }

    #[tokio::test]
    async fn empty_allow_list_accepts_unblocked() {
        let auth = StaticListAuthorizer::new(Vec::new(), vec!["BAD".to_string()]);
        assert_eq!(auth.authorize("TAG1").await, AuthorizationStatus::Accepted);
        assert_eq!(auth.authorize("BAD").await, AuthorizationStatus::Blocked);
    }
}
