//! Guided pedaling drills: definitions, targets, scoring and execution.

pub mod engine;
pub mod events;
pub mod recorder;
pub mod scoring;
pub mod target;
pub mod types;

pub use engine::{DrillEngine, DrillRun, TickOutcome, EVENT_BACKLOG};
pub use events::DrillEvent;
pub use recorder::{JsonLinesRecorder, MemoryResultRecorder, RecorderError, ResultRecorder};
pub use scoring::{ScoreTracker, NO_REQUIREMENT_SCORE};
pub use target::{Target, TargetBand, TargetMetric};
pub use types::{
    DrillDefinition, DrillDifficulty, DrillError, DrillResult, DrillStatus, ExecutionState, Phase,
    PhaseScore,
};
