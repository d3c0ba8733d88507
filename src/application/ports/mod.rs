//! Application ports (hexagonal architecture boundaries)

pub mod inbound;
pub mod outbound;

pub use inbound::{OcppAdapterFactory, OcppInboundPort, ProtocolError};
pub use outbound::{
    Authorizer, CredentialError, CredentialHasher, EventPublisher, PublishError,
};
