//! Notifications module
//!
//! Outbound event delivery for downstream billing and monitoring systems.
//! Messages are published under an exchange name and routing key; the
//! in-process broker fans them out to bound subscribers.

pub mod broker;

pub use broker::{
    BrokerMessage, BrokerPublisher, BrokerSubscriber, SharedBrokerPublisher, DEFAULT_CAPACITY,
};
