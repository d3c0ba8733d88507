//! Shared protocol support

pub mod ocpp_frame;
