//! # Charge Point Orchestrator
//!
//! Session and transaction core of an OCPP 1.6 central system: tracks
//! connected charge points and their connectors, allocates transaction
//! ids, keeps the durable record in sync and announces started
//! transactions to downstream systems.
//!
//! ## Architecture
//!
//! - **domain**: records, repository traits and the pure per-charge-point
//!   session state machine
//! - **application**: registry, orchestrator, authorization, effect
//!   dispatcher, registration, session reaper and the OCPP 1.6 adapter
//! - **infrastructure**: in-memory and SQLite stores, bcrypt, the
//!   WebSocket endpoint and shutdown handling
//! - **notifications**: broker-style event publisher
//! - **support**: OCPP-J framing

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod notifications;
pub mod server;
pub mod support;

pub use config::{default_config_path, AppConfig};
pub use infrastructure::{init_database, DatabaseConfig, InMemoryStorage};
pub use notifications::{BrokerMessage, BrokerPublisher};
pub use server::{init_tracing, ServerHandle};
