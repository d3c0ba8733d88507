//! Database entities module

pub mod charge_point;
pub mod connector;
pub mod transaction;

pub use charge_point::Entity as ChargePoint;
pub use connector::Entity as Connector;
pub use transaction::Entity as Transaction;
