//! Message contract
//!
//! Every message kind is bound to one topic under the application namespace
//! and to a fixed set of fields. Outbound messages are validated against that
//! set and stamped with a `time` field before they reach the bus; inbound
//! envelopes are decoded back into the typed [`Message`] enum.

mod agent;
mod error;
mod kind;
mod message;
mod publisher;

pub use agent::{Agent, spawn_agent};
pub use error::ContractError;
pub use kind::{Direction, MessageKind, TIME_FIELD};
pub use message::{Fields, Message, Received, decode};
pub use publisher::{Publisher, timestamp, validate};
