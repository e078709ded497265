//! Pairing and FTP registries
//!
//! Both maps are owned by a single actor task; every read and write goes
//! through a cloneable [`RegistryManager`] handle.

mod ftp;
mod manager;
mod messages;
mod pairing;

pub use ftp::FtpRegistry;
pub use manager::RegistryManager;
pub use messages::{RegistryCommand, RegistryError, RegistryResponse};
pub use pairing::PairingRegistry;
