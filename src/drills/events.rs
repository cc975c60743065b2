//! Discrete notifications emitted while a drill runs.

use crate::drills::types::{DrillResult, Phase};

/// Events pushed to the presentation layer.
///
/// Each condition fires at most once: countdown ticks once per second,
/// target edges only on a change of membership, phase-ending warnings once
/// per remaining second per phase, and `Completed` once per run.
#[derive(Debug, Clone, PartialEq)]
pub enum DrillEvent {
    /// Start countdown advanced
    CountdownTick { seconds_remaining: u32 },
    /// A new phase began
    PhaseChanged { index: usize, phase: Phase },
    /// Live metric moved into the target
    TargetEntered,
    /// Live metric left the target
    TargetExited,
    /// Current phase ends in 3, 2 or 1 seconds
    PhaseEndingWarning { seconds_remaining: u32 },
    /// Run finished or was stopped; carries the result
    Completed(DrillResult),
    /// Run was aborted by an internal failure
    Failed(String),
}

impl DrillEvent {
    /// Whether this is the last event a run emits.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DrillEvent::Completed(_) | DrillEvent::Failed(_))
    }
}
