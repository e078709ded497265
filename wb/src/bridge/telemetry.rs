//! Trainer telemetry sources
//!
//! The Bridge never talks to hardware directly. It asks a [`TrainerSource`]
//! which trainers exist, what each one is reading and where to set the
//! resistance. [`SimulatedTrainers`] is the source shipped with the binary.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

/// Errors from a telemetry source
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Unknown trainer: {0}")]
    UnknownTrainer(String),

    #[error("Trainer unavailable: {0}")]
    Unavailable(String),
}

/// One sample from a trainer
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Reading {
    pub power_watts: f64,
    pub cadence_rpm: f64,
}

/// Hardware seam for the Bridge
#[async_trait]
pub trait TrainerSource: Send + Sync {
    /// Ids of every trainer this source can reach
    async fn discover(&self) -> Vec<String>;

    /// Current reading, or None when the trainer has nothing to report yet
    async fn poll(&self, trainer: &str) -> Result<Option<Reading>, TelemetryError>;

    /// Drive the trainer's resistance to an absolute power
    async fn apply_target_watts(&self, trainer: &str, watts: f64) -> Result<(), TelemetryError>;
}

/// Trainer ids used when nothing else is configured
pub fn default_trainers() -> Vec<String> {
    vec![
        "trainer_123".to_string(),
        "trainer_456".to_string(),
        "trainer_789".to_string(),
    ]
}

/// Simulated trainers that track their last target with some noise
pub struct SimulatedTrainers {
    trainers: Vec<String>,
    idle_power_watts: f64,
    power_jitter_pct: f64,
    cadence_range: (u32, u32),
    targets: Mutex<HashMap<String, f64>>,
}

impl SimulatedTrainers {
    pub fn new(trainers: Vec<String>, idle_power_watts: f64, power_jitter_pct: f64, cadence_range: (u32, u32)) -> Self {
        debug!(?trainers, idle_power_watts, power_jitter_pct, ?cadence_range, "SimulatedTrainers::new: called");
        let (low, high) = cadence_range;
        Self {
            trainers,
            idle_power_watts,
            power_jitter_pct: power_jitter_pct.max(0.0),
            cadence_range: (low.min(high), low.max(high)),
            targets: Mutex::new(HashMap::new()),
        }
    }

    /// Last target applied to `trainer`
    pub async fn target(&self, trainer: &str) -> Option<f64> {
        self.targets.lock().await.get(trainer).copied()
    }

    fn check(&self, trainer: &str) -> Result<(), TelemetryError> {
        if self.trainers.iter().any(|t| t == trainer) {
            Ok(())
        } else {
            Err(TelemetryError::UnknownTrainer(trainer.to_string()))
        }
    }

    fn sample(&self, base_watts: f64) -> Reading {
        let mut rng = rand::rng();
        let spread = base_watts * self.power_jitter_pct / 100.0;
        let power_watts = if spread.is_finite() && spread > 0.0 {
            rng.random_range(base_watts - spread..=base_watts + spread)
        } else {
            base_watts
        };
        let (low, high) = self.cadence_range;
        Reading {
            power_watts: power_watts.max(0.0).round(),
            cadence_rpm: f64::from(rng.random_range(low..=high)),
        }
    }
}

impl Default for SimulatedTrainers {
    fn default() -> Self {
        Self::new(default_trainers(), 100.0, 10.0, (80, 95))
    }
}

#[async_trait]
impl TrainerSource for SimulatedTrainers {
    async fn discover(&self) -> Vec<String> {
        self.trainers.clone()
    }

    async fn poll(&self, trainer: &str) -> Result<Option<Reading>, TelemetryError> {
        self.check(trainer)?;
        let base = self.target(trainer).await.unwrap_or(self.idle_power_watts);
        Ok(Some(self.sample(base)))
    }

    async fn apply_target_watts(&self, trainer: &str, watts: f64) -> Result<(), TelemetryError> {
        self.check(trainer)?;
        debug!(%trainer, watts, "SimulatedTrainers::apply_target_watts: called");
        self.targets.lock().await.insert(trainer.to_string(), watts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_discover_defaults() {
        let source = SimulatedTrainers::default();
        assert_eq!(source.discover().await, default_trainers());
    }

    #[tokio::test]
    async fn test_poll_tracks_target_within_jitter() {
        let source = SimulatedTrainers::new(vec!["t1".to_string()], 100.0, 10.0, (85, 90));
        source.apply_target_watts("t1", 200.0).await.unwrap();

        for _ in 0..50 {
            let reading = source.poll("t1").await.unwrap().unwrap();
            assert!((180.0..=220.0).contains(&reading.power_watts), "{reading:?}");
            assert!((85.0..=90.0).contains(&reading.cadence_rpm), "{reading:?}");
        }
    }

    #[tokio::test]
    async fn test_poll_idle_without_jitter() {
        let source = SimulatedTrainers::new(vec!["t1".to_string()], 120.0, 0.0, (90, 90));
        let reading = source.poll("t1").await.unwrap().unwrap();
        assert_eq!(reading, Reading { power_watts: 120.0, cadence_rpm: 90.0 });
    }

    #[tokio::test]
    async fn test_infinite_jitter_reads_base_power() {
        let source = SimulatedTrainers::new(vec!["t1".to_string()], 120.0, f64::INFINITY, (90, 90));
        let reading = source.poll("t1").await.unwrap().unwrap();
        assert_eq!(reading.power_watts, 120.0);
    }

    #[tokio::test]
    async fn test_unknown_trainer() {
        let source = SimulatedTrainers::default();
        assert!(matches!(
            source.poll("trainer_999").await,
            Err(TelemetryError::UnknownTrainer(_))
        ));
        assert!(source.apply_target_watts("trainer_999", 100.0).await.is_err());
    }
}
