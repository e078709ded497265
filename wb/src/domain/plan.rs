//! Training plans
//!
//! A plan is an ordered list of segments, each starting at an offset from the
//! beginning of the session. By convention the last segment has a 0% target
//! and marks the end of the session.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Errors from loading or validating a plan
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Segment {index} ({label}) starts at {offset}s, before the previous segment at {previous}s")]
    OffsetOutOfOrder {
        index: usize,
        label: String,
        offset: u64,
        previous: u64,
    },

    #[error("Failed to read plan file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse plan: {0}")]
    Parse(String),
}

/// One timed step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Seconds from session start
    pub offset_seconds: u64,
    /// Target as a percentage of FTP (uncapped)
    pub target_power_percent: u32,
    pub target_cadence_rpm: u32,
    pub label: String,
}

impl Segment {
    pub fn new(offset_seconds: u64, target_power_percent: u32, target_cadence_rpm: u32, label: &str) -> Self {
        Self {
            offset_seconds,
            target_power_percent,
            target_cadence_rpm,
            label: label.to_string(),
        }
    }
}

/// Ordered sequence of segments
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrainingPlan {
    segments: Vec<Segment>,
}

impl TrainingPlan {
    /// Build a plan, rejecting offsets that go backwards
    pub fn new(segments: Vec<Segment>) -> Result<Self, PlanError> {
        let plan = Self { segments };
        plan.validate()?;
        Ok(plan)
    }

    /// The session shipped when no plan file is configured
    pub fn default_session() -> Self {
        Self {
            segments: vec![
                Segment::new(0, 50, 90, "Warmup"),
                Segment::new(60 * 2, 100, 80, "Interval"),
                Segment::new(60 * 3, 50, 80, "Rest"),
                Segment::new(60 * 4, 100, 80, "Interval"),
                Segment::new(60 * 5, 50, 80, "Rest"),
                Segment::new(60 * 6, 100, 80, "Interval"),
                Segment::new(60 * 7, 50, 80, "Rest"),
                Segment::new(60 * 10, 50, 85, "Cooldown"),
                Segment::new(60 * 12, 0, 85, "stop"),
            ],
        }
    }

    /// Load a plan from a YAML or JSON file (by extension, YAML otherwise)
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlanError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "TrainingPlan::load: called");
        let content = fs::read_to_string(path)?;

        let is_json = path.extension().and_then(|e| e.to_str()) == Some("json");
        let segments: Vec<Segment> = if is_json {
            serde_json::from_str(&content).map_err(|e| PlanError::Parse(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| PlanError::Parse(e.to_string()))?
        };

        let plan = Self::new(segments)?;
        info!(path = %path.display(), segments = plan.len(), "Loaded training plan");
        Ok(plan)
    }

    /// Check that offsets never decrease
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut previous = 0;
        for (index, segment) in self.segments.iter().enumerate() {
            if segment.offset_seconds < previous {
                return Err(PlanError::OffsetOutOfOrder {
                    index,
                    label: segment.label.clone(),
                    offset: segment.offset_seconds,
                    previous,
                });
            }
            previous = segment.offset_seconds;
        }
        Ok(())
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Offset of the last segment, i.e. the session length in seconds
    pub fn duration_seconds(&self) -> u64 {
        self.segments.last().map(|s| s.offset_seconds).unwrap_or(0)
    }

    /// Delay before each segment, relative to the one before it
    pub fn delays(&self) -> impl Iterator<Item = (u64, &Segment)> {
        let mut previous = 0;
        self.segments.iter().map(move |segment| {
            let delay = segment.offset_seconds.saturating_sub(previous);
            previous = segment.offset_seconds;
            (delay, segment)
        })
    }
}
