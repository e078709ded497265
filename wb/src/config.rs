//! wattbus configuration types and loading

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};

use crate::bridge::{PollTiming, SimulatedTrainers, default_trainers};
use crate::bus::BusConfig;
use crate::coach::PlaybackTiming;
use crate::domain::TrainingPlan;

/// Main wattbus configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Message bus settings
    pub bus: BusConfig,

    /// Coach and plan playback
    pub coach: CoachConfig,

    /// Bridge and trainer telemetry
    pub bridge: BridgeConfig,

    pub rider: RiderConfig,

    /// Demo session wiring
    pub session: SessionConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.coach.tick_ms == 0 {
            return Err(eyre!("coach.tick-ms must be greater than 0"));
        }
        if self.bridge.poll_interval_ms == 0 {
            return Err(eyre!("bridge.poll-interval-ms must be greater than 0"));
        }
        for (name, value) in [
            ("bridge.idle-power-watts", self.bridge.idle_power_watts),
            ("bridge.power-jitter-pct", self.bridge.power_jitter_pct),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(eyre!("{} must be a finite, non-negative number, got {}", name, value));
            }
        }
        let (low, high) = self.bridge.cadence_range;
        if low > high {
            return Err(eyre!("bridge.cadence-range must be [low, high], got [{}, {}]", low, high));
        }
        if self.session.ftp == 0 {
            return Err(eyre!("session.ftp must be greater than 0"));
        }
        if self.bus.namespace.is_empty() || self.bus.namespace.contains(['+', '#']) {
            return Err(eyre!("bus.namespace must be non-empty and free of wildcards"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .wattbus.yml
        let local_config = PathBuf::from(".wattbus.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/wattbus/wattbus.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("wattbus").join("wattbus.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Coach configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoachConfig {
    /// Publish cadence targets alongside power
    pub cadence: bool,

    /// YAML or JSON plan; the built-in session when unset
    #[serde(rename = "plan-file")]
    pub plan_file: Option<PathBuf>,

    /// Milliseconds per plan offset second
    #[serde(rename = "tick-ms")]
    pub tick_ms: u64,

    #[serde(rename = "stop-timeout-ms")]
    pub stop_timeout_ms: u64,
}

impl Default for CoachConfig {
    fn default() -> Self {
        Self {
            cadence: true,
            plan_file: None,
            tick_ms: 1000,
            stop_timeout_ms: 1000,
        }
    }
}

impl CoachConfig {
    pub fn timing(&self) -> PlaybackTiming {
        PlaybackTiming {
            tick: Duration::from_millis(self.tick_ms),
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
        }
    }

    /// The configured plan file, or the built-in session
    pub fn load_plan(&self) -> Result<TrainingPlan> {
        match &self.plan_file {
            Some(path) => TrainingPlan::load(path).context(format!("Failed to load plan from {}", path.display())),
            None => Ok(TrainingPlan::default_session()),
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Trainer ids to serve; empty discovers them from the source
    pub trainers: Vec<String>,

    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    #[serde(rename = "stop-timeout-ms")]
    pub stop_timeout_ms: u64,

    /// Simulated power before any target is applied
    #[serde(rename = "idle-power-watts")]
    pub idle_power_watts: f64,

    /// Simulated power noise, percent of the current target
    #[serde(rename = "power-jitter-pct")]
    pub power_jitter_pct: f64,

    /// Simulated cadence bounds, inclusive
    #[serde(rename = "cadence-range")]
    pub cadence_range: (u32, u32),
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            trainers: Vec::new(),
            poll_interval_ms: 1000,
            stop_timeout_ms: 1000,
            idle_power_watts: 100.0,
            power_jitter_pct: 10.0,
            cadence_range: (80, 95),
        }
    }
}

impl BridgeConfig {
    pub fn timing(&self) -> PollTiming {
        PollTiming {
            interval: Duration::from_millis(self.poll_interval_ms),
            stop_timeout: Duration::from_millis(self.stop_timeout_ms),
        }
    }

    /// Simulated trainers for the configured ids (or the defaults)
    pub fn simulation(&self) -> SimulatedTrainers {
        let trainers = if self.trainers.is_empty() {
            default_trainers()
        } else {
            self.trainers.clone()
        };
        SimulatedTrainers::new(
            trainers,
            self.idle_power_watts,
            self.power_jitter_pct,
            self.cadence_range,
        )
    }
}

/// Rider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiderConfig {
    #[serde(rename = "rider-id")]
    pub rider_id: String,

    pub cadence: bool,
}

impl Default for RiderConfig {
    fn default() -> Self {
        Self {
            rider_id: "rider_001".to_string(),
            cadence: true,
        }
    }
}

/// Demo session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Trainer the rider pairs with
    pub trainer: String,

    /// FTP the rider sets for that trainer
    pub ftp: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            trainer: "trainer_123".to_string(),
            ftp: 200,
        }
    }
}
