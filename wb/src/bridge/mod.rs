//! Bridge agent: trainer control and telemetry

mod agent;
mod poller;
mod telemetry;

pub use agent::Bridge;
pub use poller::{PollTiming, TelemetryPoller};
pub use telemetry::{Reading, SimulatedTrainers, TelemetryError, TrainerSource, default_trainers};
