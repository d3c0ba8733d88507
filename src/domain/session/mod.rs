//! Live session state machine
//!
//! Pure: no I/O, no locks. The application layer owns synchronization and
//! executes the returned effects.

pub mod effect;
pub mod lifecycle;
pub mod model;

pub use effect::{Effect, TransactionStarted};
pub use lifecycle::{StopDecision, StopOutcome, StopTransactionRequest};
pub use model::{
    ChargePointSession, ConnectorState, MeterOutcome, StatusApplied, TransactionSlot,
};
