//! Phase targets over live pedaling metrics.

use serde::{Deserialize, Serialize};

use crate::drills::types::DrillError;
use crate::sensors::PedalingMetrics;

/// Proximity reported for targets that have no single-value distance.
pub const DEFAULT_PROXIMITY: f32 = 0.5;

/// Pedaling metric a target applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMetric {
    /// Left pedal power share
    Balance,
    /// Average torque effectiveness
    TorqueEffectiveness,
    /// Average pedal smoothness
    PedalSmoothness,
    /// Mean of torque effectiveness and pedal smoothness
    Combined,
}

impl TargetMetric {
    /// Pick this metric's value out of a snapshot.
    pub fn read(&self, metrics: &PedalingMetrics) -> f32 {
        match self {
            TargetMetric::Balance => metrics.balance,
            TargetMetric::TorqueEffectiveness => metrics.torque_effectiveness,
            TargetMetric::PedalSmoothness => metrics.pedal_smoothness,
            TargetMetric::Combined => (metrics.torque_effectiveness + metrics.pedal_smoothness) / 2.0,
        }
    }

    /// Distance (in metric units) at which proximity saturates at 1.0.
    fn falloff_span(&self) -> Option<f32> {
        match self {
            TargetMetric::Balance => Some(10.0),
            TargetMetric::TorqueEffectiveness => Some(20.0),
            TargetMetric::PedalSmoothness => Some(10.0),
            TargetMetric::Combined => None,
        }
    }
}

impl std::fmt::Display for TargetMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetMetric::Balance => write!(f, "Balance"),
            TargetMetric::TorqueEffectiveness => write!(f, "Torque Effectiveness"),
            TargetMetric::PedalSmoothness => write!(f, "Pedal Smoothness"),
            TargetMetric::Combined => write!(f, "Combined"),
        }
    }
}

/// Admissible band of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "shape")]
pub enum TargetBand {
    /// Value must be at least `min`
    AtLeast { min: f32 },
    /// Value must be at most `max`
    AtMost { max: f32 },
    /// Value must lie within `[min, max]`
    Between { min: f32, max: f32 },
    /// Value must be within `tolerance` of `value`
    Around { value: f32, tolerance: f32 },
}

impl TargetBand {
    /// How far `value` lies outside the band (0 when inside).
    fn distance(&self, value: f32) -> f32 {
        match *self {
            TargetBand::AtLeast { min } => (min - value).max(0.0),
            TargetBand::AtMost { max } => (value - max).max(0.0),
            TargetBand::Between { min, max } => {
                if value < min {
                    min - value
                } else if value > max {
                    value - max
                } else {
                    0.0
                }
            }
            TargetBand::Around { value: center, tolerance } => {
                ((value - center).abs() - tolerance).max(0.0)
            }
        }
    }
}

/// A numeric target on one metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    /// Metric the band is evaluated against
    pub metric: TargetMetric,
    /// Admissible band
    pub band: TargetBand,
}

impl Target {
    /// Target requiring at least `min`.
    pub fn at_least(metric: TargetMetric, min: f32) -> Self {
        Self {
            metric,
            band: TargetBand::AtLeast { min },
        }
    }

    /// Target requiring at most `max`.
    pub fn at_most(metric: TargetMetric, max: f32) -> Self {
        Self {
            metric,
            band: TargetBand::AtMost { max },
        }
    }

    /// Target requiring a value in `[min, max]`.
    pub fn between(metric: TargetMetric, min: f32, max: f32) -> Self {
        Self {
            metric,
            band: TargetBand::Between { min, max },
        }
    }

    /// Target requiring `value ± tolerance`.
    pub fn around(metric: TargetMetric, value: f32, tolerance: f32) -> Self {
        Self {
            metric,
            band: TargetBand::Around { value, tolerance },
        }
    }

    /// Check that the band is well formed.
    pub fn validate(&self) -> Result<(), DrillError> {
        let finite = |v: f32| v.is_finite();
        let ok = match self.band {
            TargetBand::AtLeast { min } => finite(min),
            TargetBand::AtMost { max } => finite(max),
            TargetBand::Between { min, max } => finite(min) && finite(max) && min <= max,
            TargetBand::Around { value, tolerance } => {
                finite(value) && finite(tolerance) && tolerance >= 0.0
            }
        };

        if ok {
            Ok(())
        } else {
            Err(DrillError::InvalidTarget(format!("{:?}", self.band)))
        }
    }

    /// Whether `value` satisfies the target.
    pub fn is_met(&self, value: f32) -> bool {
        value.is_finite() && self.band.distance(value) == 0.0
    }

    /// Normalized distance from the target: 0 inside, rising to 1 outward.
    pub fn proximity(&self, value: f32) -> f32 {
        match self.metric.falloff_span() {
            Some(_) if !value.is_finite() => 1.0,
            Some(span) => (self.band.distance(value) / span).clamp(0.0, 1.0),
            None => DEFAULT_PROXIMITY,
        }
    }

    /// Evaluate against a snapshot. Missing data never counts as met.
    pub fn is_met_by(&self, metrics: &PedalingMetrics) -> bool {
        metrics.has_data && self.is_met(self.metric.read(metrics))
    }

    /// Proximity for a snapshot; fully away when there is no data, except
    /// for metrics without a single-value distance.
    pub fn proximity_for(&self, metrics: &PedalingMetrics) -> f32 {
        match self.metric.falloff_span() {
            None => DEFAULT_PROXIMITY,
            Some(_) if !metrics.has_data => 1.0,
            Some(_) => self.proximity(self.metric.read(metrics)),
        }
    }
}
