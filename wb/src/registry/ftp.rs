//! Functional threshold power per trainer

use std::collections::BTreeMap;

use crate::domain::effective_ftp;

/// Mapping trainer id -> FTP watts, last write wins
#[derive(Debug, Default, Clone)]
pub struct FtpRegistry {
    values: BTreeMap<String, u32>,
}

impl FtpRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, trainer: impl Into<String>, ftp: u32) -> Option<u32> {
        self.values.insert(trainer.into(), ftp)
    }

    pub fn get(&self, trainer: &str) -> Option<u32> {
        self.values.get(trainer).copied()
    }

    /// Stored FTP, or the default when the trainer has none
    pub fn get_or_default(&self, trainer: &str) -> u32 {
        effective_ftp(self.get(trainer))
    }

    pub fn list(&self) -> Vec<(String, u32)> {
        self.values.iter().map(|(t, f)| (t.clone(), *f)).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
