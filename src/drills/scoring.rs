//! Time-in-target accumulation and scoring.
//!
//! Scores are ratios of time spent inside the target to time spent in
//! phases that carry a target. Target-less phases contribute nothing to
//! either side and are recorded as [`PhaseScore::NotApplicable`].

use crate::drills::types::PhaseScore;

/// Score reported when no target-bearing time has occurred yet.
///
/// Applies to both the live score and the final result: a drill that never
/// imposed a requirement cannot have been failed.
pub const NO_REQUIREMENT_SCORE: f32 = 100.0;

/// `100 * part / whole`, clamped to 0-100.
pub fn percent_of(part_ms: u64, whole_ms: u64) -> f32 {
    if whole_ms == 0 {
        return 0.0;
    }
    (100.0 * part_ms as f64 / whole_ms as f64).clamp(0.0, 100.0) as f32
}

/// Accumulates phase and run level target time.
#[derive(Debug, Clone, Default)]
pub struct ScoreTracker {
    phase_with_target_ms: u64,
    phase_in_target_ms: u64,
    streak_ms: u64,
    best_streak_ms: u64,
    total_with_target_ms: u64,
    total_in_target_ms: u64,
    phase_scores: Vec<PhaseScore>,
}

impl ScoreTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `delta_ms` of target-bearing time, in or out of target.
    pub fn record(&mut self, delta_ms: u64, in_target: bool) {
        self.phase_with_target_ms += delta_ms;
        self.total_with_target_ms += delta_ms;

        if in_target {
            self.phase_in_target_ms += delta_ms;
            self.total_in_target_ms += delta_ms;
            self.streak_ms += delta_ms;
            self.best_streak_ms = self.best_streak_ms.max(self.streak_ms);
        } else {
            self.streak_ms = 0;
        }
    }

    /// In-target time for the current phase.
    pub fn phase_in_target_ms(&self) -> u64 {
        self.phase_in_target_ms
    }

    /// Current uninterrupted in-target streak.
    pub fn streak_ms(&self) -> u64 {
        self.streak_ms
    }

    /// Longest streak seen in the current phase.
    pub fn best_streak_ms(&self) -> u64 {
        self.best_streak_ms
    }

    /// In-target time across the run.
    pub fn total_in_target_ms(&self) -> u64 {
        self.total_in_target_ms
    }

    /// Target-bearing time across the run.
    pub fn total_with_target_ms(&self) -> u64 {
        self.total_with_target_ms
    }

    /// Score of the phase accumulated so far.
    pub fn phase_score(&self, has_target: bool) -> PhaseScore {
        if !has_target {
            PhaseScore::NotApplicable
        } else if self.phase_with_target_ms == 0 {
            PhaseScore::Scored(0.0)
        } else {
            PhaseScore::Scored(percent_of(
                self.phase_in_target_ms,
                self.phase_with_target_ms,
            ))
        }
    }

    /// Record the current phase's score and clear the per-phase counters.
    pub fn finish_phase(&mut self, has_target: bool) -> PhaseScore {
        let score = self.phase_score(has_target);
        self.phase_scores.push(score);
        self.phase_with_target_ms = 0;
        self.phase_in_target_ms = 0;
        self.streak_ms = 0;
        self.best_streak_ms = 0;
        score
    }

    /// Run score over all target-bearing time so far.
    pub fn score(&self) -> f32 {
        if self.total_with_target_ms == 0 {
            NO_REQUIREMENT_SCORE
        } else {
            percent_of(self.total_in_target_ms, self.total_with_target_ms)
        }
    }

    /// Scores of the phases finished so far.
    pub fn phase_scores(&self) -> &[PhaseScore] {
        &self.phase_scores
    }
}
