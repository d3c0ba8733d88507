//! Application services

pub mod authorization;
mod orchestrator;
mod registration;
mod sequence;
mod session_reaper;

pub use authorization::{authorizer_from_config, AcceptAllAuthorizer, StaticListAuthorizer};
pub use orchestrator::{
    BootInfo, BootResult, BootStatus, Orchestrator, SharedOrchestrator, StartTransactionRequest,
    StopResult, TransactionResult, DEFAULT_HEARTBEAT_INTERVAL,
};
pub use registration::RegistrationService;
pub use sequence::TransactionSequence;
pub use session_reaper::{ReaperConfig, SessionReaper, SweepReport};
