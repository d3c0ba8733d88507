//! Infrastructure layer - external concerns

pub mod crypto;
pub mod database;
pub mod server;
pub mod storage;

pub use crypto::BcryptHasher;
pub use database::{
    init_database, DatabaseConfig, SeaOrmChargePointRepository, SeaOrmTransactionRepository,
};
pub use server::{OcppServer, ShutdownCoordinator, ShutdownSignal};
pub use storage::InMemoryStorage;
