//! Agent runtime - one inbox loop per agent
//!
//! Each agent declares the kinds it handles. The loop subscribes to exactly
//! those topics, decodes every envelope into a [`Message`] and hands it to the
//! agent. Malformed envelopes are logged and dropped; nothing a peer sends can
//! stop the loop.

use std::sync::Arc;

use async_trait::async_trait;
use eyre::Result;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::kind::MessageKind;
use super::message::{Message, decode};
use crate::bus::BusHandle;

/// A bus participant reacting to typed messages
#[async_trait]
pub trait Agent: Send + Sync + 'static {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Kinds this agent subscribes to
    fn handles(&self) -> Vec<MessageKind>;

    /// Handle one decoded message
    ///
    /// Only kinds listed in [`Agent::handles`] are delivered. Failures are
    /// logged by the implementation, never returned.
    async fn handle(&self, message: Message);
}

/// Subscribe the agent's topics, then spawn its inbox loop
///
/// Subscriptions are in place when this returns, so anything published
/// afterwards reaches the agent.
pub async fn spawn_agent<A: Agent>(agent: Arc<A>, bus: BusHandle, namespace: &str) -> Result<JoinHandle<()>> {
    let kinds = agent.handles();
    for kind in &kinds {
        bus.subscribe(&kind.topic(namespace)).await?;
    }
    info!(agent = agent.name(), subscriptions = kinds.len(), "Agent subscribed");

    let namespace = namespace.to_string();
    Ok(tokio::spawn(async move {
        run_inbox(agent, bus, namespace).await;
    }))
}

/// Drain the inbox until it closes
async fn run_inbox<A: Agent>(agent: Arc<A>, bus: BusHandle, namespace: String) {
    let kinds = agent.handles();

    while let Some(envelope) = bus.recv().await {
        let received = match decode(&namespace, &envelope) {
            Ok(received) => received,
            Err(e) => {
                warn!(agent = agent.name(), topic = %envelope.topic, error = %e, "Dropping malformed message");
                continue;
            }
        };

        let kind = received.message.kind();
        if !kinds.contains(&kind) {
            debug!(agent = agent.name(), %kind, "Ignoring unhandled kind");
            continue;
        }

        debug!(agent = agent.name(), %kind, time = ?received.time, "Dispatching");
        agent.handle(received.message).await;
    }

    info!(agent = agent.name(), "Agent inbox closed");
}
