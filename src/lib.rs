//! PedalDrill - guided pedaling technique drills
//!
//! Runs timed drills made of phases with optional targets on live pedaling
//! dynamics (power balance, torque effectiveness, pedal smoothness), scoring
//! how long the rider holds each target.

pub mod drills;
pub mod sensors;
pub mod storage;

// Re-export commonly used types
pub use drills::engine::DrillEngine;
pub use drills::types::{DrillDefinition, DrillResult, ExecutionState};
pub use sensors::dynamics::{MetricsSource, SharedMetricsSource};
pub use storage::config::AppConfig;
