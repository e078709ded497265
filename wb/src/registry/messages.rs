//! Registry actor messages

use thiserror::Error;
use tokio::sync::oneshot;

/// Errors from registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Channel error")]
    ChannelError,
}

/// Response from registry operations
pub type RegistryResponse<T> = Result<T, RegistryError>;

/// Commands sent to the RegistryManager actor
#[derive(Debug)]
pub enum RegistryCommand {
    // Pairing operations
    Pair {
        trainer: String,
        rider: String,
        reply: oneshot::Sender<Option<String>>,
    },
    Unpair {
        trainer: String,
        reply: oneshot::Sender<Option<String>>,
    },
    RiderFor {
        trainer: String,
        reply: oneshot::Sender<Option<String>>,
    },
    ListPairings {
        reply: oneshot::Sender<Vec<(String, String)>>,
    },

    // FTP operations
    SetFtp {
        trainer: String,
        ftp: u32,
        reply: oneshot::Sender<Option<u32>>,
    },
    GetFtp {
        trainer: String,
        reply: oneshot::Sender<Option<u32>>,
    },
    ListFtp {
        reply: oneshot::Sender<Vec<(String, u32)>>,
    },

    // Shutdown
    Shutdown,
}
