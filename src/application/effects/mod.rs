//! Effect execution (persistence sync and event publication)

mod dispatcher;

pub use dispatcher::{EffectDispatcher, PublishTarget, DEFAULT_QUEUE_CAPACITY};
