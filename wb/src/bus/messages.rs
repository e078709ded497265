//! Message types for the Broker

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// A serialized message as it travels over the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub topic: String,
    pub payload: String,
}

impl Envelope {
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Internal requests to the Broker task
#[derive(Debug)]
pub enum BusRequest {
    /// Register a client inbox
    Register {
        client_id: String,
        tx: mpsc::Sender<Envelope>,
    },

    /// Unregister a client and drop its subscriptions
    Unregister { client_id: String },

    /// Add a topic filter for a client
    Subscribe { client_id: String, filter: String },

    /// Fan an envelope out to matching subscribers
    Publish { from_client_id: String, envelope: Envelope },

    /// Get current metrics
    GetMetrics { reply_tx: oneshot::Sender<BusMetrics> },

    /// Shutdown the broker
    Shutdown,
}

/// Broker metrics for observability
#[derive(Debug, Clone, Default)]
pub struct BusMetrics {
    pub registered_clients: usize,
    pub total_subscriptions: usize,
    pub messages_received: u64,
    pub messages_published: u64,
    pub messages_delivered: u64,
    pub messages_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization() {
        let env = Envelope::new("app/start_plan", r#"{"time":"2025-01-01T00:00:00Z"}"#);
        let json = serde_json::to_string(&env).unwrap();
        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(back, env);
    }
}
