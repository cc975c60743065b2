//! Drill definitions, live execution state and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::drills::scoring::NO_REQUIREMENT_SCORE;
use crate::drills::target::{Target, TargetMetric};

/// Drill difficulty rating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillDifficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl std::fmt::Display for DrillDifficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DrillDifficulty::Beginner => write!(f, "Beginner"),
            DrillDifficulty::Intermediate => write!(f, "Intermediate"),
            DrillDifficulty::Advanced => write!(f, "Advanced"),
        }
    }
}

/// One timed segment of a drill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    /// Short phase name
    pub name: String,
    /// Longer description
    pub description: String,
    /// Cue shown to the rider
    pub instruction: String,
    /// Duration in milliseconds
    pub duration_ms: u64,
    /// Target to hold; `None` for recovery or warm-up phases
    pub target: Option<Target>,
    /// Minimum continuous in-target time the rider should aim for
    pub hold_time_ms: Option<u64>,
}

impl Phase {
    /// Create a target-less phase.
    pub fn new(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instruction: String::new(),
            duration_ms,
            target: None,
            hold_time_ms: None,
        }
    }

    /// Attach a target.
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Attach a hold-time goal.
    pub fn with_hold_time(mut self, hold_time_ms: u64) -> Self {
        self.hold_time_ms = Some(hold_time_ms);
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the rider instruction.
    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    /// Whether this phase is scored.
    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }
}

/// An ordered, immutable sequence of phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillDefinition {
    /// Stable identifier (catalog key)
    pub id: String,
    /// Display name
    pub name: String,
    /// Display description
    pub description: String,
    /// Difficulty rating
    pub difficulty: DrillDifficulty,
    /// Metric the drill focuses on overall
    pub focus: TargetMetric,
    /// Ordered phases
    pub phases: Vec<Phase>,
}

impl DrillDefinition {
    /// Create a drill with the given id, name, focus and phases.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        focus: TargetMetric,
        phases: Vec<Phase>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            difficulty: DrillDifficulty::default(),
            focus,
            phases,
        }
    }

    /// Total duration of all phases in milliseconds.
    pub fn total_duration_ms(&self) -> u64 {
        self.phases.iter().map(|p| p.duration_ms).sum()
    }

    /// Reject drills the engine cannot run.
    pub fn validate(&self) -> Result<(), DrillError> {
        if self.phases.is_empty() {
            return Err(DrillError::InvalidDrill(format!(
                "Drill '{}' has no phases",
                self.id
            )));
        }

        for (index, phase) in self.phases.iter().enumerate() {
            if phase.duration_ms == 0 {
                return Err(DrillError::InvalidDrill(format!(
                    "Phase {} ('{}') has zero duration",
                    index, phase.name
                )));
            }
            if let Some(target) = &phase.target {
                target.validate()?;
            }
        }

        Ok(())
    }
}

/// Status of a drill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillStatus {
    /// Counting down before the first phase
    Countdown,
    /// Phases are advancing
    Running,
    /// Clock is frozen
    Paused,
    /// Last phase finished
    Completed,
    /// Stopped early or failed
    Cancelled,
}

impl DrillStatus {
    /// Whether the run has ended.
    pub fn is_finished(&self) -> bool {
        matches!(self, DrillStatus::Completed | DrillStatus::Cancelled)
    }
}

/// Snapshot of a run, published after every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    /// Current status
    pub status: DrillStatus,
    /// Seconds left in the start countdown
    pub countdown_seconds_remaining: u32,
    /// Index of the current phase
    pub current_phase_index: usize,
    /// Total drill time in milliseconds
    pub elapsed_ms: u64,
    /// Time spent in the current phase
    pub phase_elapsed_ms: u64,
    /// Cumulative in-target time for the current phase
    pub target_hold_ms: u64,
    /// Current uninterrupted in-target streak
    pub continuous_in_target_ms: u64,
    /// Whether the phase's hold-time goal has been reached
    pub hold_time_met: bool,
    /// Whether the live metric satisfies the current target
    pub is_in_target: bool,
    /// Running score (0-100)
    pub score: f32,
    /// Live proximity to the target (0 = inside)
    pub proximity: f32,
    /// 3/2/1 during the final seconds of a phase
    pub phase_ending_countdown: Option<u32>,
}

impl ExecutionState {
    /// Initial state for a run entering its countdown.
    pub fn countdown(seconds: u32) -> Self {
        Self {
            status: DrillStatus::Countdown,
            countdown_seconds_remaining: seconds,
            current_phase_index: 0,
            elapsed_ms: 0,
            phase_elapsed_ms: 0,
            target_hold_ms: 0,
            continuous_in_target_ms: 0,
            hold_time_met: false,
            is_in_target: false,
            score: NO_REQUIREMENT_SCORE,
            proximity: 0.0,
            phase_ending_countdown: None,
        }
    }
}

/// Score recorded for one finished phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "percent")]
pub enum PhaseScore {
    /// Percentage of target-bearing time spent in target
    Scored(f32),
    /// Phase had no target
    NotApplicable,
}

impl PhaseScore {
    /// Numeric score, if the phase was scored.
    pub fn percent(&self) -> Option<f32> {
        match self {
            PhaseScore::Scored(p) => Some(*p),
            PhaseScore::NotApplicable => None,
        }
    }
}

/// Outcome of one drill run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillResult {
    /// Unique identifier
    pub id: Uuid,
    /// Drill that was run
    pub drill_id: String,
    /// Drill display name
    pub drill_name: String,
    /// When the first phase began
    pub started_at: DateTime<Utc>,
    /// Run duration in milliseconds
    pub duration_ms: u64,
    /// Overall score (0-100)
    pub score: f32,
    /// Cumulative in-target time
    pub time_in_target_ms: u64,
    /// In-target time as a share of the whole run (0-100)
    pub time_in_target_percent: f32,
    /// True only when the last phase ran to its end
    pub completed: bool,
    /// One entry per phase scored before the run ended
    pub phase_scores: Vec<PhaseScore>,
}

/// Errors related to drill execution.
#[derive(Debug, Error)]
pub enum DrillError {
    /// Drill definition cannot be run
    #[error("Invalid drill: {0}")]
    InvalidDrill(String),

    /// Target band is malformed
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// Phase index escaped the drill
    #[error("Phase {index} out of range for drill with {count} phases")]
    PhaseOutOfRange { index: usize, count: usize },
}
