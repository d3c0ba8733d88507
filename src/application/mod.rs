pub mod effects;
pub mod handlers;
pub mod ports;
pub mod services;
pub mod session;

// Re-export key types for convenience
pub use effects::{EffectDispatcher, PublishTarget};
pub use handlers::{OcppHandlerV16, V16AdapterFactory};
pub use ports::{Authorizer, CredentialHasher, EventPublisher, OcppAdapterFactory, OcppInboundPort};
pub use services::{Orchestrator, RegistrationService, SessionReaper, SharedOrchestrator, TransactionSequence};
pub use session::{ChargePointRegistry, SharedChargePointRegistry};
