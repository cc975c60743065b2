//! Unit tests for target evaluation.

use pedaldrill::drills::{Target, TargetBand, TargetMetric};
use pedaldrill::sensors::PedalingMetrics;

#[test]
fn test_metric_selection() {
    let metrics = PedalingMetrics::new(52.0, 70.0, 30.0);

    assert_eq!(TargetMetric::Balance.read(&metrics), 52.0);
    assert_eq!(TargetMetric::TorqueEffectiveness.read(&metrics), 70.0);
    assert_eq!(TargetMetric::PedalSmoothness.read(&metrics), 30.0);
    assert_eq!(TargetMetric::Combined.read(&metrics), 50.0);
}

#[test]
fn test_target_against_snapshot() {
    let target = Target::between(TargetMetric::Balance, 48.0, 52.0);

    assert!(target.is_met_by(&PedalingMetrics::new(50.0, 0.0, 0.0)));
    assert!(!target.is_met_by(&PedalingMetrics::new(55.0, 0.0, 0.0)));
    assert!(!target.is_met_by(&PedalingMetrics::no_data()));
}

#[test]
fn test_proximity_is_bounded() {
    let target = Target::around(TargetMetric::Balance, 50.0, 2.0);

    for value in [0.0, 40.0, 47.0, 50.0, 53.0, 60.0, 100.0, f32::NAN] {
        let p = target.proximity(value);
        assert!((0.0..=1.0).contains(&p), "proximity {} for {}", p, value);
    }
    assert_eq!(target.proximity(51.0), 0.0);
    assert!((target.proximity(57.0) - 0.5).abs() < 1e-6);
}

#[test]
fn test_nan_is_never_met() {
    let target = Target::at_most(TargetMetric::PedalSmoothness, 100.0);
    assert!(!target.is_met(f32::NAN));
}

#[test]
fn test_target_serialization() {
    let target = Target::at_least(TargetMetric::TorqueEffectiveness, 65.0);
    let json = serde_json::to_string(&target).unwrap();
    assert_eq!(
        json,
        r#"{"metric":"torque_effectiveness","band":{"shape":"at_least","min":65.0}}"#
    );

    let parsed: Target = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.band, TargetBand::AtLeast { min: 65.0 });
}
