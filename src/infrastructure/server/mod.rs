//! WebSocket server module

mod shutdown;
mod websocket;

pub use shutdown::{listen_for_shutdown_signals, ShutdownCoordinator, ShutdownSignal};
pub use websocket::OcppServer;
