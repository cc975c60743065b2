//! Sensor-side pedaling dynamics and the live metrics snapshot.

pub mod dynamics;

pub use dynamics::{
    CyclingDynamicsData, LeftRightBalance, MetricsSource, PedalSmoothness, PedalingMetrics,
    SharedMetricsSource, TorqueEffectiveness,
};
