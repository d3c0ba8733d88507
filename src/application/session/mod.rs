pub mod registry;

pub use registry::{ChargePointRegistry, SessionGuard, SessionHandle, SharedChargePointRegistry};
