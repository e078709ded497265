//! RegistryManager - actor that owns the pairing and FTP registries
//!
//! Single writer: the Bridge's command handlers and its polling loop share
//! the maps through cloned handles, never through a lock.

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use super::ftp::FtpRegistry;
use super::messages::{RegistryCommand, RegistryError, RegistryResponse};
use super::pairing::PairingRegistry;
use crate::domain::effective_ftp;

/// Handle to send commands to the RegistryManager
#[derive(Clone)]
pub struct RegistryManager {
    tx: mpsc::Sender<RegistryCommand>,
}

impl RegistryManager {
    /// Spawn a new RegistryManager actor with empty registries
    pub fn spawn() -> Self {
        debug!("RegistryManager::spawn: called");
        let (tx, rx) = mpsc::channel(256);

        tokio::spawn(actor_loop(PairingRegistry::new(), FtpRegistry::new(), rx));

        info!("RegistryManager spawned");
        Self { tx }
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> RegistryCommand) -> RegistryResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(build(reply_tx))
            .await
            .map_err(|_| RegistryError::ChannelError)?;
        reply_rx.await.map_err(|_| RegistryError::ChannelError)
    }

    // === Pairing operations ===

    /// Pair a trainer with a rider, returning the previous rider
    pub async fn pair(&self, trainer: &str, rider: &str) -> RegistryResponse<Option<String>> {
        debug!(%trainer, %rider, "pair: called");
        self.request(|reply| RegistryCommand::Pair {
            trainer: trainer.to_string(),
            rider: rider.to_string(),
            reply,
        })
        .await
    }

    /// Remove a pairing, returning the rider it had
    pub async fn unpair(&self, trainer: &str) -> RegistryResponse<Option<String>> {
        debug!(%trainer, "unpair: called");
        self.request(|reply| RegistryCommand::Unpair {
            trainer: trainer.to_string(),
            reply,
        })
        .await
    }

    pub async fn rider_for(&self, trainer: &str) -> RegistryResponse<Option<String>> {
        debug!(%trainer, "rider_for: called");
        self.request(|reply| RegistryCommand::RiderFor {
            trainer: trainer.to_string(),
            reply,
        })
        .await
    }

    /// All pairings ordered by trainer id
    pub async fn pairings(&self) -> RegistryResponse<Vec<(String, String)>> {
        debug!("pairings: called");
        self.request(|reply| RegistryCommand::ListPairings { reply }).await
    }

    // === FTP operations ===

    /// Store a trainer's FTP, returning the previous value
    pub async fn set_ftp(&self, trainer: &str, ftp: u32) -> RegistryResponse<Option<u32>> {
        debug!(%trainer, ftp, "set_ftp: called");
        self.request(|reply| RegistryCommand::SetFtp {
            trainer: trainer.to_string(),
            ftp,
            reply,
        })
        .await
    }

    pub async fn ftp(&self, trainer: &str) -> RegistryResponse<Option<u32>> {
        debug!(%trainer, "ftp: called");
        self.request(|reply| RegistryCommand::GetFtp {
            trainer: trainer.to_string(),
            reply,
        })
        .await
    }

    /// Stored FTP or the 100 W default
    pub async fn ftp_or_default(&self, trainer: &str) -> RegistryResponse<u32> {
        Ok(effective_ftp(self.ftp(trainer).await?))
    }

    pub async fn ftp_values(&self) -> RegistryResponse<Vec<(String, u32)>> {
        debug!("ftp_values: called");
        self.request(|reply| RegistryCommand::ListFtp { reply }).await
    }

    /// Shutdown the actor
    pub async fn shutdown(&self) -> RegistryResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(RegistryCommand::Shutdown)
            .await
            .map_err(|_| RegistryError::ChannelError)
    }
}

/// The actor loop that owns both registries
async fn actor_loop(mut pairings: PairingRegistry, mut ftp: FtpRegistry, mut rx: mpsc::Receiver<RegistryCommand>) {
    debug!("RegistryManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RegistryCommand::Pair { trainer, rider, reply } => {
                debug!(%trainer, %rider, "actor_loop: Pair command");
                let _ = reply.send(pairings.set(trainer, rider));
            }

            RegistryCommand::Unpair { trainer, reply } => {
                debug!(%trainer, "actor_loop: Unpair command");
                let _ = reply.send(pairings.remove(&trainer));
            }

            RegistryCommand::RiderFor { trainer, reply } => {
                let _ = reply.send(pairings.get(&trainer).map(str::to_string));
            }

            RegistryCommand::ListPairings { reply } => {
                let _ = reply.send(pairings.list());
            }

            RegistryCommand::SetFtp {
                trainer,
                ftp: value,
                reply,
            } => {
                debug!(%trainer, ftp = value, "actor_loop: SetFtp command");
                let _ = reply.send(ftp.set(trainer, value));
            }

            RegistryCommand::GetFtp { trainer, reply } => {
                let _ = reply.send(ftp.get(&trainer));
            }

            RegistryCommand::ListFtp { reply } => {
                let _ = reply.send(ftp.list());
            }

            RegistryCommand::Shutdown => {
                info!("RegistryManager shutting down");
                break;
            }
        }
    }

    debug!("RegistryManager actor stopped");
}
