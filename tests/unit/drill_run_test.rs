//! Unit tests for the drill run state machine.
//!
//! Drives `DrillRun` with fixed 100 ms deltas so phase boundaries and
//! scores are exact.

use pedaldrill::drills::{
    DrillDefinition, DrillEvent, DrillRun, DrillStatus, Phase, PhaseScore, Target, TargetMetric,
    TickOutcome,
};
use pedaldrill::sensors::PedalingMetrics;

const TICK_MS: u64 = 100;

fn te(value: f32) -> PedalingMetrics {
    PedalingMetrics::new(50.0, value, 20.0)
}

fn balance(value: f32) -> PedalingMetrics {
    PedalingMetrics::new(value, 60.0, 20.0)
}

fn start(drill: DrillDefinition) -> (DrillRun, Vec<DrillEvent>) {
    let mut run = DrillRun::new(drill, 3, 3);
    let mut events = Vec::new();
    run.begin(&mut events);
    (run, events)
}

/// Tick until the run finishes; `metrics` gets the 0-based tick number.
fn run_to_end(
    run: &mut DrillRun,
    events: &mut Vec<DrillEvent>,
    metrics: impl Fn(usize) -> PedalingMetrics,
) {
    for tick in 0..10_000 {
        if run.advance(TICK_MS, &metrics(tick), events).unwrap() == TickOutcome::Finished {
            return;
        }
    }
    panic!("drill did not finish");
}

fn single_phase_min_50() -> DrillDefinition {
    DrillDefinition::new(
        "te_floor",
        "Torque Floor",
        TargetMetric::TorqueEffectiveness,
        vec![Phase::new("Hold 50", 5000)
            .with_target(Target::at_least(TargetMetric::TorqueEffectiveness, 50.0))],
    )
}

fn recovery_then_center() -> DrillDefinition {
    DrillDefinition::new(
        "center",
        "Find Center",
        TargetMetric::Balance,
        vec![
            Phase::new("Recover", 3000),
            Phase::new("Center", 3000)
                .with_target(Target::around(TargetMetric::Balance, 50.0, 2.0)),
        ],
    )
}

#[test]
fn test_begin_enters_first_phase() {
    let (run, events) = start(single_phase_min_50());

    assert_eq!(run.status(), DrillStatus::Running);
    assert_eq!(run.state().current_phase_index, 0);
    assert!(matches!(
        events.as_slice(),
        [DrillEvent::PhaseChanged { index: 0, .. }]
    ));
}

#[test]
fn test_constant_in_target_scores_100() {
    let (mut run, mut events) = start(single_phase_min_50());
    run_to_end(&mut run, &mut events, |_| te(60.0));

    let result = run.result();
    assert!(result.completed);
    assert_eq!(result.score, 100.0);
    assert_eq!(result.duration_ms, 5000);
    assert_eq!(run.status(), DrillStatus::Completed);
}

#[test]
fn test_constant_out_of_target_scores_0() {
    let (mut run, mut events) = start(single_phase_min_50());
    run_to_end(&mut run, &mut events, |_| te(10.0));

    let result = run.result();
    assert!(result.completed);
    assert_eq!(result.score, 0.0);
    assert_eq!(result.phase_scores, vec![PhaseScore::Scored(0.0)]);
}

#[test]
fn test_alternating_metric_scores_half() {
    let (mut run, mut events) = start(recovery_then_center());
    run_to_end(&mut run, &mut events, |tick| {
        if tick % 2 == 0 {
            balance(50.0)
        } else {
            balance(80.0)
        }
    });

    let result = run.result();
    assert!(result.completed);
    assert!((result.score - 50.0).abs() < 1.0);
    assert_eq!(result.phase_scores.len(), 2);
    assert_eq!(result.phase_scores[0], PhaseScore::NotApplicable);
    let second = result.phase_scores[1].percent().unwrap();
    assert!((second - 50.0).abs() < 1.0);
}

#[test]
fn test_targetless_drill_scores_full_by_default() {
    let drill = DrillDefinition::new(
        "spin",
        "Free Spin",
        TargetMetric::Combined,
        vec![Phase::new("Spin", 2000), Phase::new("Spin more", 2000)],
    );
    let (mut run, mut events) = start(drill);
    run_to_end(&mut run, &mut events, |_| PedalingMetrics::no_data());

    let result = run.result();
    assert_eq!(result.score, 100.0);
    assert_eq!(result.time_in_target_ms, 0);
    assert!(result
        .phase_scores
        .iter()
        .all(|s| *s == PhaseScore::NotApplicable));
}

#[test]
fn test_phase_index_is_monotonic_and_in_bounds() {
    let (mut run, _) = start(recovery_then_center());
    let phase_count = run.drill().phases.len();
    let mut last_index = 0;

    loop {
        let outcome = run
            .advance(TICK_MS, &balance(50.0), &mut Vec::new())
            .unwrap();
        let index = run.state().current_phase_index;
        assert!(index >= last_index);
        assert!(index < phase_count);
        last_index = index;
        if outcome == TickOutcome::Finished {
            break;
        }
    }
    assert_eq!(last_index, phase_count - 1);
}

#[test]
fn test_elapsed_matches_drill_length_within_one_tick() {
    let (mut run, mut events) = start(recovery_then_center());
    run_to_end(&mut run, &mut events, |_| balance(50.0));

    let total = run.drill().total_duration_ms();
    let elapsed = run.state().elapsed_ms;
    assert!(elapsed >= total);
    assert!(elapsed - total < TICK_MS);
}

#[test]
fn test_uneven_ticks_keep_phase_accounting() {
    let (mut run, _) = start(recovery_then_center());
    let deltas = [350u64, 1200, 990, 460, 700, 1333, 999];
    let mut events = Vec::new();
    let mut finished = false;
    for delta in deltas {
        if run.advance(delta, &balance(50.0), &mut events).unwrap() == TickOutcome::Finished {
            finished = true;
            break;
        }
    }

    assert!(finished);
    let result = run.result();
    assert!((0.0..=100.0).contains(&result.score));
    assert_eq!(result.phase_scores.len(), 2);
}

#[test]
fn test_event_order_for_full_run() {
    let (mut run, mut events) = start(recovery_then_center());
    run_to_end(&mut run, &mut events, |_| balance(50.0));

    let summary: Vec<String> = events
        .iter()
        .map(|e| match e {
            DrillEvent::PhaseChanged { index, .. } => format!("phase{}", index),
            DrillEvent::TargetEntered => "enter".to_string(),
            DrillEvent::TargetExited => "exit".to_string(),
            DrillEvent::PhaseEndingWarning { seconds_remaining } => {
                format!("warn{}", seconds_remaining)
            }
            other => format!("{:?}", other),
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            "phase0", "warn3", "warn2", "warn1", "phase1", "enter", "warn3", "warn2", "warn1"
        ]
    );
}

#[test]
fn test_no_target_edges_for_recovery_phase() {
    let drill = DrillDefinition::new(
        "recover",
        "Recover",
        TargetMetric::Balance,
        vec![Phase::new("Recover", 2000)],
    );
    let (mut run, mut events) = start(drill);
    run_to_end(&mut run, &mut events, |_| balance(50.0));

    assert!(!events
        .iter()
        .any(|e| matches!(e, DrillEvent::TargetEntered | DrillEvent::TargetExited)));
    assert!(!run.state().is_in_target);
}

#[test]
fn test_stop_mid_first_phase_leaves_scores_empty() {
    let drill = DrillDefinition::new(
        "multi",
        "Multi",
        TargetMetric::TorqueEffectiveness,
        vec![
            Phase::new("One", 4000)
                .with_target(Target::at_least(TargetMetric::TorqueEffectiveness, 50.0)),
            Phase::new("Two", 4000),
            Phase::new("Three", 4000)
                .with_target(Target::at_most(TargetMetric::TorqueEffectiveness, 90.0)),
        ],
    );
    let (mut run, _) = start(drill);
    for _ in 0..17 {
        run.advance(TICK_MS, &te(60.0), &mut Vec::new()).unwrap();
    }

    let result = run.cancel().unwrap();
    assert!(!result.completed);
    assert_eq!(result.duration_ms, 1700);
    assert!(result.phase_scores.is_empty());
    assert_eq!(result.score, 100.0);
    assert_eq!(result.time_in_target_ms, 1700);
    assert_eq!(result.time_in_target_percent, 100.0);
}

#[test]
fn test_stop_after_a_transition_keeps_earlier_scores() {
    let (mut run, _) = start(recovery_then_center());
    for _ in 0..35 {
        run.advance(TICK_MS, &balance(50.0), &mut Vec::new()).unwrap();
    }

    let result = run.cancel().unwrap();
    assert_eq!(result.phase_scores, vec![PhaseScore::NotApplicable]);
    assert!(!result.completed);
}

#[test]
fn test_pause_freezes_all_accumulators() {
    let (mut run, _) = start(single_phase_min_50());
    for _ in 0..10 {
        run.advance(TICK_MS, &te(60.0), &mut Vec::new()).unwrap();
    }
    let before = run.state().clone();

    assert!(run.pause());
    run.advance(10_000, &te(60.0), &mut Vec::new()).unwrap();
    assert_eq!(run.state().elapsed_ms, before.elapsed_ms);
    assert_eq!(run.state().phase_elapsed_ms, before.phase_elapsed_ms);
    assert_eq!(run.state().target_hold_ms, before.target_hold_ms);
    assert_eq!(run.status(), DrillStatus::Paused);

    assert!(run.resume());
    run.advance(TICK_MS, &te(60.0), &mut Vec::new()).unwrap();
    assert_eq!(run.state().elapsed_ms, before.elapsed_ms + TICK_MS);
}

#[test]
fn test_live_score_tracks_ratio() {
    let (mut run, _) = start(single_phase_min_50());
    assert_eq!(run.state().score, 100.0);

    run.advance(TICK_MS, &te(60.0), &mut Vec::new()).unwrap();
    run.advance(TICK_MS, &te(10.0), &mut Vec::new()).unwrap();
    run.advance(TICK_MS, &te(10.0), &mut Vec::new()).unwrap();
    run.advance(TICK_MS, &te(60.0), &mut Vec::new()).unwrap();

    assert_eq!(run.state().score, 50.0);
    assert!(run.state().is_in_target);
    assert_eq!(run.state().proximity, 0.0);

    run.advance(TICK_MS, &te(40.0), &mut Vec::new()).unwrap();
    assert!((run.state().proximity - 0.5).abs() < 1e-6);
}
