//! Orchestrator runtime.
//!
//! [`ServerHandle`] wires storage, the effect dispatcher, the orchestrator,
//! the idle session reaper and the OCPP WebSocket endpoint together, and
//! owns their graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::application::effects::EffectDispatcher;
use crate::application::ports::{CredentialHasher, EventPublisher};
use crate::application::services::{
    authorizer_from_config, Orchestrator, RegistrationService, SessionReaper, SharedOrchestrator,
    TransactionSequence,
};
use crate::application::session::{ChargePointRegistry, SharedChargePointRegistry};
use crate::application::V16AdapterFactory;
use crate::config::{AppConfig, StorageBackend};
use crate::domain::{ChargePointRepository, TransactionRepository};
use crate::infrastructure::{
    init_database, BcryptHasher, DatabaseConfig, InMemoryStorage, OcppServer,
    SeaOrmChargePointRepository, SeaOrmTransactionRepository, ShutdownCoordinator,
    ShutdownSignal,
};
use crate::notifications::{BrokerPublisher, SharedBrokerPublisher};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ── Storage ────────────────────────────────────────────────────────

/// Durable store selected by `storage.backend`
#[derive(Clone)]
pub struct Stores {
    pub charge_points: Arc<dyn ChargePointRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    db: Option<DatabaseConnection>,
}

impl Stores {
    pub async fn open(config: &AppConfig) -> Result<Self, BoxError> {
        match config.storage.backend {
            StorageBackend::Memory => {
                info!("💾 Using in-memory storage");
                let store = Arc::new(InMemoryStorage::new());
                Ok(Self {
                    charge_points: store.clone(),
                    transactions: store,
                    db: None,
                })
            }
            StorageBackend::Sqlite => {
                let db = init_database(&DatabaseConfig::new(&config.storage.database_url)).await?;
                info!("💾 Using SQLite storage");
                Ok(Self {
                    charge_points: Arc::new(SeaOrmChargePointRepository::new(db.clone())),
                    transactions: Arc::new(SeaOrmTransactionRepository::new(db.clone())),
                    db: Some(db),
                })
            }
        }
    }

    pub async fn close(self) {
        let Some(db) = self.db else { return };
        match db.close().await {
            Ok(()) => info!("✅ Database connection closed"),
            Err(e) => warn!(error = %e, "Error closing database connection"),
        }
    }
}

/// Registration service over the configured store, bcrypt hashing
pub fn registration_service(stores: &Stores) -> RegistrationService {
    let hasher: Arc<dyn CredentialHasher> = Arc::new(BcryptHasher::new());
    RegistrationService::new(stores.charge_points.clone(), hasher)
}

// ── ServerHandle ───────────────────────────────────────────────────

/// Handle to a running orchestrator
pub struct ServerHandle {
    pub orchestrator: SharedOrchestrator,
    pub registry: SharedChargePointRegistry,
    /// Subscribe here to observe transaction-started events
    pub broker: SharedBrokerPublisher,
    /// Address the OCPP endpoint is bound to
    pub ws_addr: SocketAddr,
    pub config: AppConfig,

    stores: Stores,
    shutdown: ShutdownCoordinator,
    ws_task: tokio::task::JoinHandle<()>,
}

impl ServerHandle {
    pub async fn start(config: AppConfig) -> Result<Self, BoxError> {
        info!("Starting charge point orchestrator...");

        let stores = Stores::open(&config).await?;

        let sequence = TransactionSequence::seeded_from(stores.transactions.as_ref()).await?;
        info!(next_transaction_id = sequence.peek(), "🔢 Transaction sequence seeded");

        let broker = Arc::new(BrokerPublisher::with_capacity(config.messaging.channel_capacity));
        let publisher: Arc<dyn EventPublisher> = broker.clone();
        let effects = EffectDispatcher::spawn_with_capacity(
            stores.charge_points.clone(),
            stores.transactions.clone(),
            publisher,
            config.messaging.target(),
            config.storage.write_queue_capacity,
        );

        let registry = ChargePointRegistry::shared();
        let orchestrator = Arc::new(
            Orchestrator::new(
                registry.clone(),
                Arc::from(authorizer_from_config(&config.authorization)),
                Arc::new(sequence),
                effects,
                stores.charge_points.clone(),
            )
            .with_require_registration(config.sessions.require_registration)
            .with_heartbeat_interval(config.server.heartbeat_interval),
        );

        let shutdown = ShutdownCoordinator::new(config.server.shutdown_timeout);
        let signal = shutdown.signal();

        if let Some(reaper) = config.sessions.reaper() {
            SessionReaper::new(registry.clone(), reaper).start(signal.clone());
        }

        let listener = TcpListener::bind(config.server.address()).await?;
        let ws_addr = listener.local_addr()?;
        info!("🔌 OCPP 1.6 endpoint listening on ws://{}/ocpp/{{charge_point_id}}", ws_addr);

        let server = OcppServer::new(
            config.server.address(),
            Arc::new(V16AdapterFactory::new(orchestrator.clone())),
            orchestrator.clone(),
        )
        .with_shutdown(signal);
        let ws_task = tokio::spawn(async move {
            if let Err(e) = server.serve(listener).await {
                error!(error = %e, "WebSocket server error");
            }
        });

        info!("🚀 Orchestrator started");

        Ok(Self {
            orchestrator,
            registry,
            broker,
            ws_addr,
            config,
            stores,
            shutdown,
            ws_task,
        })
    }

    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.signal()
    }

    /// Install SIGTERM / SIGINT listeners that trigger shutdown
    pub fn install_signal_handler(&self) {
        self.shutdown.start_signal_listener();
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.signal().trigger();
    }

    /// Wait for shutdown, then stop the endpoint and drain queued effects
    /// within the configured timeout.
    pub async fn wait(self) {
        let Self {
            orchestrator,
            stores,
            shutdown,
            ws_task,
            ..
        } = self;

        let completed = shutdown
            .shutdown_with_cleanup(move || async move {
                match ws_task.await {
                    Ok(()) => info!("WebSocket server stopped"),
                    Err(e) => error!(error = %e, "WebSocket server task panicked"),
                }
                orchestrator.flush().await;
                info!("✅ Pending writes flushed");
            })
            .await;
        if !completed {
            warn!("Some pending writes may not have been persisted");
        }

        stores.close().await;
        info!("👋 Orchestrator shutdown complete");
    }

    pub async fn shutdown(self) {
        self.trigger_shutdown();
        self.wait().await;
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Initialize tracing from the application config.
///
/// `RUST_LOG` wins over `logging.level`.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    match config.logging.format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }
}

/// Install the Prometheus recorder with its scrape listener, if configured
pub fn install_metrics(config: &AppConfig) {
    let Some(listen) = config.metrics.listen.as_deref() else {
        return;
    };
    let addr: SocketAddr = match listen.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(listen, error = %e, "Invalid metrics.listen address, metrics disabled");
            return;
        }
    };
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => info!("📊 Prometheus metrics on http://{}/metrics", addr),
        Err(e) => error!(error = %e, "Failed to install Prometheus recorder"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.ws_host = "127.0.0.1".into();
        config.server.ws_port = 0;
        config.server.shutdown_timeout = 5;
        config
    }

    async fn call(
        client: &mut tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
        frame: &str,
    ) -> serde_json::Value {
        client.send(Message::Text(frame.to_string())).await.unwrap();
        let reply = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        serde_json::from_str(reply.to_text().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn start_publishes_and_stop_persists() {
        let handle = ServerHandle::start(test_config()).await.unwrap();
        let mut events = handle.broker.bind("management.system", "transaction.routing.key");

        let (mut client, _) =
            tokio_tungstenite::connect_async(format!("ws://{}/ocpp/CP-1", handle.ws_addr))
                .await
                .unwrap();

        let started = call(
            &mut client,
            r#"[2,"1","StartTransaction",{"connectorId":1,"idTag":"TAG1","meterStart":0,"timestamp":"2024-01-01T10:00:00Z"}]"#,
        )
        .await;
        assert_eq!(started[2]["transactionId"], 1);
        assert_eq!(started[2]["idTagInfo"]["status"], "Accepted");

        let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.payload["chargePointId"], "CP-1");

        let stopped = call(
            &mut client,
            r#"[2,"2","StopTransaction",{"transactionId":1,"meterStop":500,"timestamp":"2024-01-01T11:00:00Z"}]"#,
        )
        .await;
        assert_eq!(stopped[0], 3);

        let stores = handle.stores.clone();
        handle.shutdown().await;

        let tx = stores.transactions.find_by_id(1).await.unwrap().unwrap();
        assert_eq!(tx.meter_stop, Some(500));
    }
}
