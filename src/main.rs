//! Charge point orchestrator
//!
//! Serves the OCPP 1.6 endpoint, or registers a charge point in the
//! configured store. Reads configuration from a TOML file
//! (~/.config/cp-orchestrator/config.toml by default).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use cp_orchestrator::config::{AppConfig, StorageBackend};
use cp_orchestrator::domain::ChargePointRegistration;
use cp_orchestrator::server::{install_metrics, registration_service, Stores};
use cp_orchestrator::{default_config_path, init_tracing, ServerHandle};

#[derive(Parser)]
#[command(name = "cp-orchestrator", version, about = "Charge point session and transaction orchestrator")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, env = "CP_ORCHESTRATOR_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the OCPP endpoint (default)
    Serve,
    /// Register a charge point in the configured store
    Register {
        #[arg(long)]
        id: String,
        #[arg(long)]
        serial_number: String,
        #[arg(long)]
        vendor: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Connector type, once per connector in index order
        #[arg(long = "connector")]
        connectors: Vec<String>,
        #[arg(long, env = "CP_PASSWORD")]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // ── Load configuration ─────────────────────────────────────
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let (config, load_error) = match AppConfig::load(&config_path) {
        Ok(cfg) => (cfg, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };
    init_tracing(&config);
    match load_error {
        None => info!("Configuration loaded from {}", config_path.display()),
        Some(e) => error!("Failed to load config: {}. Using defaults.", e),
    }

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Register {
            id,
            serial_number,
            vendor,
            model,
            connectors,
            password,
        } => {
            if config.storage.backend == StorageBackend::Memory {
                warn!("In-memory storage selected, the registration will not outlive this process");
            }
            let stores = Stores::open(&config).await?;
            let record = registration_service(&stores)
                .register(ChargePointRegistration {
                    id,
                    serial_number,
                    vendor,
                    model,
                    connector_types: connectors,
                    password,
                })
                .await;
            stores.close().await;

            let record = record?;
            info!(
                charge_point_id = record.id.as_str(),
                connectors = record.connectors.len(),
                "✅ Charge point registered"
            );
            Ok(())
        }
    }
}

async fn serve(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    install_metrics(&config);

    let handle = ServerHandle::start(config).await?;
    handle.install_signal_handler();
    handle.wait().await;
    Ok(())
}
