//! In-process message bus
//!
//! The Broker owns the subscriber registry and fans published envelopes out to
//! every client holding a matching topic filter:
//! - **Publish:** Fire-and-forget, at-most-once per subscriber
//! - **Subscribe:** MQTT-style filters (`+` one level, trailing `#` the rest)
//! - **Metrics:** Delivery and drop counters for observability

mod config;
mod core;
mod handle;
mod messages;
pub mod topic;

pub use config::BusConfig;
pub use core::Broker;
pub use handle::BusHandle;
pub use messages::{BusMetrics, BusRequest, Envelope};
