//! Coach agent and plan playback

mod agent;
mod player;

pub use agent::{Coach, Measurement};
pub use player::{PlanPlayer, PlaybackTiming, SessionSnapshot};
