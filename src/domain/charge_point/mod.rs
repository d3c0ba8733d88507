//! Charge Point aggregate
//!
//! Contains the durable charge point record, connector value objects, and
//! the repository interface.

pub mod model;
pub mod repository;

pub use model::{
    ChargePointRecord, ChargePointRegistration, ConnectorFilter, ConnectorRecord, ConnectorStatus,
    ConnectorUpdate,
};
pub use repository::ChargePointRepository;
