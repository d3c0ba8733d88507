pub mod charge_point;
pub mod error;
pub mod session;
pub mod transaction;

// Re-export commonly used types
pub use charge_point::{
    ChargePointRecord, ChargePointRegistration, ChargePointRepository, ConnectorFilter,
    ConnectorRecord, ConnectorStatus, ConnectorUpdate,
};
pub use error::{DomainError, DomainResult};
pub use session::{ChargePointSession, Effect, StopOutcome, StopTransactionRequest};
pub use transaction::{AuthorizationStatus, StopReason, TransactionRepository, TransactionState};
