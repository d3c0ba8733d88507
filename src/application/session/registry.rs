//! Charge point registry: live sessions keyed by charge point id

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::domain::ChargePointSession;

/// Session handle; the mutex orders every operation on one charge point
pub type SessionHandle = Arc<Mutex<ChargePointSession>>;

/// Exclusive access to one live session
pub type SessionGuard = OwnedMutexGuard<ChargePointSession>;

/// Thread-safe registry of charge point sessions.
///
/// Each entry carries its own lock, so work on different charge points
/// never contends.
pub struct ChargePointRegistry {
    sessions: DashMap<String, SessionHandle>,
}

/// Shared, reference-counted charge point registry
pub type SharedChargePointRegistry = Arc<ChargePointRegistry>;

impl ChargePointRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Wrap in `Arc` for shared ownership
    pub fn shared() -> SharedChargePointRegistry {
        Arc::new(Self::new())
    }

    /// Existing session, or a new empty one. Never fails.
    pub fn get_or_create(&self, charge_point_id: &str) -> SessionHandle {
        if let Some(existing) = self.sessions.get(charge_point_id) {
            return existing.value().clone();
        }
        self.sessions
            .entry(charge_point_id.to_string())
            .or_insert_with(|| {
                info!(charge_point_id, "Creating charge point session");
                Arc::new(Mutex::new(ChargePointSession::new(charge_point_id)))
            })
            .value()
            .clone()
    }

    pub fn get(&self, charge_point_id: &str) -> Option<SessionHandle> {
        self.sessions.get(charge_point_id).map(|s| s.value().clone())
    }

    /// Lock the live session, creating it if needed.
    ///
    /// A handle resolved just before an eviction points at a session that is
    /// no longer registered; the lookup is retried until the locked session
    /// is the registered one.
    pub async fn lock_or_create(&self, charge_point_id: &str) -> SessionGuard {
        loop {
            let session = self.get_or_create(charge_point_id).lock_owned().await;
            if !session.is_evicted() {
                return session;
            }
        }
    }

    /// Lock the live session, if there is one
    pub async fn lock(&self, charge_point_id: &str) -> Option<SessionGuard> {
        loop {
            let session = self.get(charge_point_id)?.lock_owned().await;
            if !session.is_evicted() {
                return Some(session);
            }
        }
    }

    pub fn contains(&self, charge_point_id: &str) -> bool {
        self.sessions.contains_key(charge_point_id)
    }

    /// Drop a session only if it is still idle at `cutoff` and holds no
    /// open transaction. Returns whether it was removed.
    pub async fn evict_if_idle(&self, charge_point_id: &str, cutoff: DateTime<Utc>) -> bool {
        let Some(handle) = self.get(charge_point_id) else {
            return false;
        };
        let mut session = handle.lock().await;
        if session.is_evicted() || session.has_open_transaction() || session.last_activity > cutoff {
            return false;
        }

        // Removed and marked under the session lock, so a waiter that already
        // holds this handle sees the mark and looks the session up again.
        let removed = self
            .sessions
            .remove_if(charge_point_id, |_, h| Arc::ptr_eq(h, &handle))
            .is_some();
        if removed {
            session.mark_evicted();
            debug!(charge_point_id, "Evicted idle charge point session");
        }
        removed
    }

    /// Get all registered charge point ids
    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|r| r.key().clone()).collect()
    }

    /// Number of live sessions
    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for ChargePointRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────
