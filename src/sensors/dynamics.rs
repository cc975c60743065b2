//! Cycling dynamics data types and the live metrics snapshot read by drills.
//!
//! Dual-sided power meters report left/right power balance, pedal smoothness
//! and torque effectiveness. Drills only ever look at the most recent sample,
//! so this module reduces the per-side readings to a flat [`PedalingMetrics`]
//! snapshot and exposes it through the [`MetricsSource`] trait.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Left/Right power balance data.
///
/// Values are percentages that should sum to 100%.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeftRightBalance {
    /// Left pedal power percentage (0-100)
    pub left_percent: f32,
    /// Right pedal power percentage (0-100)
    pub right_percent: f32,
}

impl Default for LeftRightBalance {
    fn default() -> Self {
        Self {
            left_percent: 50.0,
            right_percent: 50.0,
        }
    }
}

impl LeftRightBalance {
    /// Create a balance from the left pedal's share of total power.
    pub fn from_left(left_percent: f32) -> Self {
        let left = left_percent.clamp(0.0, 100.0);
        Self {
            left_percent: left,
            right_percent: 100.0 - left,
        }
    }

    /// Get the imbalance percentage (positive = left dominant, negative = right dominant).
    pub fn imbalance(&self) -> f32 {
        self.left_percent - self.right_percent
    }
}

/// Pedal smoothness data.
///
/// Higher values indicate smoother power delivery through the stroke.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PedalSmoothness {
    /// Left pedal smoothness percentage (0-100)
    pub left_percent: f32,
    /// Right pedal smoothness percentage (0-100)
    pub right_percent: f32,
    /// Combined/average smoothness (0-100)
    pub combined_percent: f32,
}

impl PedalSmoothness {
    /// Create from left and right values.
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left_percent: left.clamp(0.0, 100.0),
            right_percent: right.clamp(0.0, 100.0),
            combined_percent: ((left + right) / 2.0).clamp(0.0, 100.0),
        }
    }
}

/// Torque effectiveness data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TorqueEffectiveness {
    /// Left pedal torque effectiveness percentage
    pub left_percent: f32,
    /// Right pedal torque effectiveness percentage
    pub right_percent: f32,
    /// Combined/average torque effectiveness
    pub combined_percent: f32,
}

impl TorqueEffectiveness {
    /// Create from left and right values.
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left_percent: left.max(0.0),
            right_percent: right.max(0.0),
            combined_percent: ((left + right) / 2.0).max(0.0),
        }
    }
}

/// One cycling dynamics reading from a dual-sided power meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CyclingDynamicsData {
    /// Left/right power balance
    pub balance: LeftRightBalance,
    /// Pedal smoothness
    pub smoothness: PedalSmoothness,
    /// Torque effectiveness
    pub torque_effectiveness: TorqueEffectiveness,
}

impl CyclingDynamicsData {
    /// Create a new dynamics reading.
    pub fn new(
        balance: LeftRightBalance,
        smoothness: PedalSmoothness,
        torque_effectiveness: TorqueEffectiveness,
    ) -> Self {
        Self {
            balance,
            smoothness,
            torque_effectiveness,
        }
    }
}

/// Most recently sampled pedaling metrics.
///
/// `balance` is the left pedal's share of power; the two averages are the
/// combined left/right percentages.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PedalingMetrics {
    /// Left pedal power share (0-100, 50 = even)
    pub balance: f32,
    /// Average torque effectiveness (%)
    pub torque_effectiveness: f32,
    /// Average pedal smoothness (%)
    pub pedal_smoothness: f32,
    /// Whether a sensor has delivered data
    pub has_data: bool,
}

impl Default for PedalingMetrics {
    fn default() -> Self {
        Self::no_data()
    }
}

impl PedalingMetrics {
    /// Snapshot carrying live values.
    pub fn new(balance: f32, torque_effectiveness: f32, pedal_smoothness: f32) -> Self {
        Self {
            balance,
            torque_effectiveness,
            pedal_smoothness,
            has_data: true,
        }
    }

    /// Snapshot for when no sensor data is available.
    pub fn no_data() -> Self {
        Self {
            balance: 50.0,
            torque_effectiveness: 0.0,
            pedal_smoothness: 0.0,
            has_data: false,
        }
    }
}

impl From<&CyclingDynamicsData> for PedalingMetrics {
    fn from(data: &CyclingDynamicsData) -> Self {
        Self::new(
            data.balance.left_percent,
            data.torque_effectiveness.combined_percent,
            data.smoothness.combined_percent,
        )
    }
}

/// Read-only view of the latest pedaling metrics.
///
/// Implementations must return immediately; the drill engine calls this on
/// every scheduler tick.
pub trait MetricsSource: Send + Sync {
    /// Get the most recent metrics snapshot.
    fn latest(&self) -> PedalingMetrics;
}

impl<F> MetricsSource for F
where
    F: Fn() -> PedalingMetrics + Send + Sync,
{
    fn latest(&self) -> PedalingMetrics {
        self()
    }
}

/// Last-value metrics holder fed by the sensor layer.
pub struct SharedMetricsSource {
    current: RwLock<PedalingMetrics>,
}

impl SharedMetricsSource {
    /// Create an empty source (no data yet).
    pub fn new() -> Self {
        Self {
            current: RwLock::new(PedalingMetrics::no_data()),
        }
    }

    /// Replace the current snapshot.
    pub fn update(&self, metrics: PedalingMetrics) {
        if let Ok(mut current) = self.current.write() {
            *current = metrics;
        }
    }

    /// Replace the current snapshot from a dynamics reading.
    pub fn update_dynamics(&self, data: &CyclingDynamicsData) {
        self.update(PedalingMetrics::from(data));
    }

    /// Mark the sensor as having no data (e.g. after a disconnect).
    pub fn clear(&self) {
        self.update(PedalingMetrics::no_data());
    }
}

impl Default for SharedMetricsSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSource for SharedMetricsSource {
    fn latest(&self) -> PedalingMetrics {
        self.current
            .read()
            .map(|m| *m)
            .unwrap_or_else(|_| PedalingMetrics::no_data())
    }
}
