//! Idle session reaper
//!
//! Evicts live sessions that have been silent longer than the idle timeout.
//! Sessions holding an open transaction are never evicted; they are logged
//! as abandoned-transaction candidates instead.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::session::SharedChargePointRegistry;
use crate::infrastructure::server::ShutdownSignal;

#[derive(Debug, Clone)]
pub struct ReaperConfig {
    /// Sessions idle longer than this are evicted
    pub idle_timeout: Duration,
    /// How often to sweep the registry
    pub sweep_interval: Duration,
}

/// Result of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub evicted: Vec<String>,
    pub abandoned: Vec<String>,
}

pub struct SessionReaper {
    registry: SharedChargePointRegistry,
    config: ReaperConfig,
}

impl SessionReaper {
    pub fn new(registry: SharedChargePointRegistry, config: ReaperConfig) -> Self {
        Self { registry, config }
    }

    /// Start the background sweep loop; the task ends on shutdown
    pub fn start(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                idle_timeout_secs = self.config.idle_timeout.as_secs(),
                sweep_interval_secs = self.config.sweep_interval.as_secs(),
                "🧹 Session reaper started"
            );

            let mut interval = tokio::time::interval(self.config.sweep_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let report = self.sweep(Utc::now()).await;
                        if !report.evicted.is_empty() {
                            info!(evicted = report.evicted.len(), "Idle sessions evicted");
                        }
                    }
                    _ = shutdown.notified().wait() => {
                        info!("🧹 Session reaper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Evict every session idle at `now`
    pub async fn sweep(&self, now: DateTime<Utc>) -> SweepReport {
        let timeout = chrono::Duration::from_std(self.config.idle_timeout)
            .unwrap_or_else(|_| chrono::Duration::days(36_500));
        let cutoff = now.checked_sub_signed(timeout).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut report = SweepReport::default();

        for charge_point_id in self.registry.ids() {
            let Some(handle) = self.registry.get(&charge_point_id) else {
                continue;
            };
            let (idle, open) = {
                let session = handle.lock().await;
                (session.last_activity <= cutoff, session.has_open_transaction())
            };
            if !idle {
                continue;
            }
            if open {
                warn!(
                    charge_point_id = charge_point_id.as_str(),
                    "Idle session holds an open transaction, kept"
                );
                report.abandoned.push(charge_point_id);
                continue;
            }
            if self.registry.evict_if_idle(&charge_point_id, cutoff).await {
                debug!(charge_point_id = charge_point_id.as_str(), "Session reaped");
                report.evicted.push(charge_point_id);
            }
        }

        report
    }
}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::session::ChargePointRegistry;
    use crate::domain::TransactionState;

    fn reaper(registry: SharedChargePointRegistry) -> SessionReaper {
        SessionReaper::new(
            registry,
            ReaperConfig {
                idle_timeout: Duration::from_secs(60),
                sweep_interval: Duration::from_secs(10),
            },
        )
    }

    #[tokio::test]
    async fn sweep_evicts_only_idle_sessions_without_transactions() {
        let registry = ChargePointRegistry::shared();
        let now = Utc::now();
        let stale = now - chrono::Duration::seconds(120);

        registry.get_or_create("CP-idle").lock().await.last_activity = stale;
        registry.get_or_create("CP-fresh").lock().await.last_activity = now;
        {
            let handle = registry.get_or_create("CP-busy");
            let mut session = handle.lock().await;
            session.begin_start(1, "TAG1").unwrap();
            session.confirm_start(TransactionState::new(1, "CP-busy", 1, "TAG1", 0, stale));
            session.last_activity = stale;
        }

        let report = reaper(registry.clone()).sweep(now).await;

        assert_eq!(report.evicted, vec!["CP-idle".to_string()]);
        assert_eq!(report.abandoned, vec!["CP-busy".to_string()]);
        assert!(registry.contains("CP-fresh"));
        assert!(registry.contains("CP-busy"));
        assert!(!registry.contains("CP-idle"));
    }

    #[tokio::test]
    async fn reaper_stops_on_shutdown() {
        let registry = ChargePointRegistry::shared();
        let shutdown = ShutdownSignal::new();
        let task = reaper(registry).start(shutdown.clone());

        // Let the loop run its first sweep and park on the next tick
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("reaper did not stop after shutdown")
            .unwrap();
    }

    #[tokio::test]
    async fn running_reaper_evicts_idle_sessions() {
        let registry = ChargePointRegistry::shared();
        registry.get_or_create("CP-idle").lock().await.last_activity =
            Utc::now() - chrono::Duration::seconds(120);
        let shutdown = ShutdownSignal::new();

        let task = reaper(registry.clone()).start(shutdown.clone());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!registry.contains("CP-idle"));

        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
    }
}
