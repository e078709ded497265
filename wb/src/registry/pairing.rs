//! Trainer to rider pairings

use std::collections::BTreeMap;

/// Mapping trainer id -> rider id, last write wins
#[derive(Debug, Default, Clone)]
pub struct PairingRegistry {
    pairs: BTreeMap<String, String>,
}

impl PairingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair a trainer, replacing any previous rider
    ///
    /// Returns the rider it was paired with before.
    pub fn set(&mut self, trainer: impl Into<String>, rider: impl Into<String>) -> Option<String> {
        self.pairs.insert(trainer.into(), rider.into())
    }

    pub fn get(&self, trainer: &str) -> Option<&str> {
        self.pairs.get(trainer).map(String::as_str)
    }

    pub fn remove(&mut self, trainer: &str) -> Option<String> {
        self.pairs.remove(trainer)
    }

    /// All pairings ordered by trainer id
    pub fn list(&self) -> Vec<(String, String)> {
        self.pairs.iter().map(|(t, r)| (t.clone(), r.clone())).collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
