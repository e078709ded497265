//! Bus configuration

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Namespace every topic lives under unless configured otherwise
pub const DEFAULT_NAMESPACE: &str = "UniqueAppID_for_training_sessions";

/// Bus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// Application prefix for all topics
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Channel buffer size for broker requests
    #[serde(rename = "channel-buffer", default = "default_channel_buffer")]
    pub channel_buffer: usize,

    /// Channel buffer size for each client's inbox
    #[serde(rename = "inbox-buffer", default = "default_inbox_buffer")]
    pub inbox_buffer: usize,
}

fn default_namespace() -> String {
    debug!("default_namespace: called");
    DEFAULT_NAMESPACE.to_string()
}

fn default_channel_buffer() -> usize {
    debug!("default_channel_buffer: called");
    1000
}

fn default_inbox_buffer() -> usize {
    debug!("default_inbox_buffer: called");
    100
}

impl Default for BusConfig {
    fn default() -> Self {
        debug!("BusConfig::default: called");
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            channel_buffer: 1000,
            inbox_buffer: 100,
        }
    }
}
