//! BusHandle - Client interface for the message bus

use std::sync::Arc;

use eyre::{Result, eyre};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::debug;
use uuid::Uuid;

use super::messages::{BusMetrics, BusRequest, Envelope};

/// Handle for agents to publish and receive on the bus
///
/// Clones share the same inbox; each connection has its own client id.
#[derive(Clone)]
pub struct BusHandle {
    /// Sender to the Broker task
    tx: mpsc::Sender<BusRequest>,

    /// Inbox for envelopes routed to this client
    rx: Arc<Mutex<mpsc::Receiver<Envelope>>>,

    /// This handle's client ID
    client_id: String,
}

impl BusHandle {
    /// Register a new client with the Broker behind `tx`
    pub async fn connect(tx: &mpsc::Sender<BusRequest>, inbox_buffer: usize) -> Result<Self> {
        let client_id = Uuid::now_v7().to_string();
        debug!(%client_id, inbox_buffer, "BusHandle::connect: called");
        let (inbox_tx, inbox_rx) = mpsc::channel(inbox_buffer);

        tx.send(BusRequest::Register {
            client_id: client_id.clone(),
            tx: inbox_tx,
        })
        .await
        .map_err(|_| eyre!("Bus channel closed"))?;

        Ok(Self {
            tx: tx.clone(),
            rx: Arc::new(Mutex::new(inbox_rx)),
            client_id,
        })
    }

    /// Get this handle's client ID
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Publish a serialized payload on a topic
    pub async fn publish(&self, topic: &str, payload: String) -> Result<()> {
        debug!(client_id = %self.client_id, %topic, "BusHandle::publish: called");
        self.tx
            .send(BusRequest::Publish {
                from_client_id: self.client_id.clone(),
                envelope: Envelope::new(topic, payload),
            })
            .await
            .map_err(|_| eyre!("Bus channel closed"))?;

        debug!("BusHandle::publish: sent");
        Ok(())
    }

    /// Subscribe to a topic filter
    pub async fn subscribe(&self, filter: &str) -> Result<()> {
        debug!(client_id = %self.client_id, %filter, "BusHandle::subscribe: called");
        self.tx
            .send(BusRequest::Subscribe {
                client_id: self.client_id.clone(),
                filter: filter.to_string(),
            })
            .await
            .map_err(|_| eyre!("Bus channel closed"))?;

        debug!("BusHandle::subscribe: sent");
        Ok(())
    }

    /// Drop this client's registration and subscriptions
    ///
    /// The Broker releases the inbox sender, so `recv` returns None once the
    /// queued envelopes are drained.
    pub async fn disconnect(&self) -> Result<()> {
        debug!(client_id = %self.client_id, "BusHandle::disconnect: called");
        self.tx
            .send(BusRequest::Unregister {
                client_id: self.client_id.clone(),
            })
            .await
            .map_err(|_| eyre!("Bus channel closed"))?;

        Ok(())
    }

    /// Ask the Broker to stop; every client inbox closes once it exits
    pub async fn shutdown(&self) -> Result<()> {
        debug!(client_id = %self.client_id, "BusHandle::shutdown: called");
        self.tx
            .send(BusRequest::Shutdown)
            .await
            .map_err(|_| eyre!("Bus channel closed"))
    }

    /// Receive the next envelope
    ///
    /// Returns None once the inbox is closed.
    pub async fn recv(&self) -> Option<Envelope> {
        let mut rx_guard = self.rx.lock().await;
        let result = rx_guard.recv().await;
        if result.is_none() {
            debug!(client_id = %self.client_id, "BusHandle::recv: inbox closed");
        }
        result
    }

    /// Try to receive an envelope without blocking
    ///
    /// Returns None if nothing is queued.
    pub fn try_recv(&self) -> Option<Envelope> {
        let mut rx_guard = self.rx.try_lock().ok()?;
        rx_guard.try_recv().ok()
    }

    /// Get current broker metrics
    pub async fn metrics(&self) -> Result<BusMetrics> {
        debug!(client_id = %self.client_id, "BusHandle::metrics: called");
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(BusRequest::GetMetrics { reply_tx })
            .await
            .map_err(|_| eyre!("Bus channel closed"))?;

        reply_rx.await.map_err(|_| eyre!("Broker shutdown before reply"))
    }
}
