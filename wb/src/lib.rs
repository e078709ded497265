//! wattbus - coached indoor-cycling sessions over publish/subscribe
//!
//! Three agents cooperate through topic-based messages on a shared bus:
//!
//! - **Coach** owns the training plan and replays it on a timer, broadcasting
//!   percent-of-FTP power targets (and cadence targets when enabled)
//! - **Bridge** fronts the trainers: it keeps pairings and FTP values, turns
//!   targets into watts and republishes telemetry on a fixed period
//! - **Rider** requests pairing, FTP and the plan, and caches what it hears
//!
//! # Modules
//!
//! - [`bus`] - In-process topic broker and client handles
//! - [`contract`] - Message catalog, validation, timestamps and agent runtime
//! - [`domain`] - Plans, segments and FTP arithmetic
//! - [`registry`] - Pairing and FTP registries behind a single-writer actor
//! - [`coach`], [`bridge`], [`rider`] - The three agents
//! - [`session`] - All three agents wired onto one bus
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod bridge;
pub mod bus;
pub mod cli;
pub mod coach;
pub mod config;
pub mod contract;
pub mod domain;
pub mod registry;
pub mod rider;
pub mod session;

// Re-export commonly used types
pub use bridge::{Bridge, PollTiming, Reading, SimulatedTrainers, TelemetryError, TrainerSource};
pub use bus::{Broker, BusConfig, BusHandle, BusMetrics, Envelope};
pub use coach::{Coach, PlanPlayer, PlaybackTiming, SessionSnapshot};
pub use config::Config;
pub use contract::{Agent, ContractError, Message, MessageKind, Publisher, Received, decode, spawn_agent};
pub use domain::{DEFAULT_FTP_WATTS, PlanError, Segment, TrainingPlan};
pub use registry::{RegistryError, RegistryManager};
pub use rider::Rider;
pub use session::Session;
