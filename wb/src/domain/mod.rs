//! Domain types for training sessions
//!
//! - [`plan`] - Segments and training plans
//! - [`power`] - FTP-relative power arithmetic

pub mod plan;
pub mod power;

pub use plan::{PlanError, Segment, TrainingPlan};
pub use power::{DEFAULT_FTP_WATTS, effective_ftp, percent_of_ftp, target_watts};
