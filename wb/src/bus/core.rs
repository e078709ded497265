//! Main Broker task implementation

use std::collections::{HashMap, HashSet};

use eyre::Result;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::config::BusConfig;
use super::handle::BusHandle;
use super::messages::{BusMetrics, BusRequest, Envelope};
use super::topic;

/// The Broker routes every published envelope to its subscribers
pub struct Broker {
    config: BusConfig,
    tx: mpsc::Sender<BusRequest>,
    rx: mpsc::Receiver<BusRequest>,
}

impl Broker {
    /// Create a new Broker with the given configuration
    pub fn new(config: BusConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_buffer);
        Self { config, tx, rx }
    }

    /// Connect a new client
    ///
    /// The returned handle owns a fresh inbox registered with the Broker.
    pub async fn connect(&self) -> Result<BusHandle> {
        BusHandle::connect(&self.tx, self.config.inbox_buffer).await
    }

    /// Run the Broker task
    ///
    /// This consumes the Broker and runs until shutdown is requested.
    pub async fn run(mut self) {
        // Internal state
        let mut registry: HashMap<String, mpsc::Sender<Envelope>> = HashMap::new();
        let mut subscriptions: HashMap<String, HashSet<String>> = HashMap::new();

        let mut metrics = BusMetrics::default();

        info!(namespace = %self.config.namespace, "Broker started");

        while let Some(req) = self.rx.recv().await {
            metrics.messages_received += 1;

            match req {
                BusRequest::Register { client_id, tx } => {
                    debug!(client_id = %client_id, "Registering client");
                    registry.insert(client_id, tx);
                    metrics.registered_clients = registry.len();
                }

                BusRequest::Unregister { client_id } => {
                    debug!(client_id = %client_id, "Unregistering client");
                    registry.remove(&client_id);

                    for subscribers in subscriptions.values_mut() {
                        subscribers.remove(&client_id);
                    }
                    subscriptions.retain(|_, subscribers| !subscribers.is_empty());

                    metrics.registered_clients = registry.len();
                    metrics.total_subscriptions = subscriptions.values().map(|s| s.len()).sum();
                }

                BusRequest::Subscribe { client_id, filter } => {
                    debug!(client_id = %client_id, filter = %filter, "Subscribing");

                    subscriptions.entry(filter).or_default().insert(client_id);

                    metrics.total_subscriptions = subscriptions.values().map(|s| s.len()).sum();
                }

                BusRequest::Publish {
                    from_client_id,
                    envelope,
                } => {
                    metrics.messages_published += 1;
                    debug!(
                        from_client_id = %from_client_id,
                        topic = %envelope.topic,
                        "Publishing"
                    );

                    // A client with several matching filters still gets one copy
                    let targets: HashSet<&String> = subscriptions
                        .iter()
                        .filter(|(filter, _)| topic::matches(filter, &envelope.topic))
                        .flat_map(|(_, subscribers)| subscribers.iter())
                        .collect();

                    for client_id in targets {
                        let Some(tx) = registry.get(client_id) else {
                            continue;
                        };
                        match tx.try_send(envelope.clone()) {
                            Ok(()) => metrics.messages_delivered += 1,
                            Err(TrySendError::Full(_)) => {
                                warn!(client_id = %client_id, topic = %envelope.topic, "Inbox full, dropping message");
                                metrics.messages_dropped += 1;
                            }
                            Err(TrySendError::Closed(_)) => {
                                debug!(client_id = %client_id, "Inbox closed, dropping message");
                                metrics.messages_dropped += 1;
                            }
                        }
                    }
                }

                BusRequest::GetMetrics { reply_tx } => {
                    let _ = reply_tx.send(metrics.clone());
                }

                BusRequest::Shutdown => {
                    info!("Broker shutting down");
                    break;
                }
            }
        }

        info!("Broker stopped");
    }
}
