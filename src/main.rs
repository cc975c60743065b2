//! PedalDrill - guided pedaling technique drills
//!
//! Main entry point. Runs a short demonstration drill against a simulated
//! dual-sided power meter and records the result.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use pedaldrill::drills::{
    DrillDefinition, DrillDifficulty, DrillEngine, DrillEvent, JsonLinesRecorder, Phase,
    PhaseScore, Target, TargetMetric,
};
use pedaldrill::sensors::{
    CyclingDynamicsData, LeftRightBalance, PedalSmoothness, SharedMetricsSource,
    TorqueEffectiveness,
};
use pedaldrill::storage::config::{get_config_path, load_config, save_config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn demo_drill() -> DrillDefinition {
    let mut drill = DrillDefinition::new(
        "balance_basics",
        "Balance Basics",
        TargetMetric::Balance,
        vec![
            Phase::new("Spin up", 5_000).with_instruction("Easy spin, find your rhythm"),
            Phase::new("Center", 10_000)
                .with_target(Target::around(TargetMetric::Balance, 50.0, 2.0))
                .with_hold_time(3_000)
                .with_instruction("Keep power split within 48-52%"),
            Phase::new("Push through", 5_000)
                .with_target(Target::at_least(TargetMetric::TorqueEffectiveness, 60.0))
                .with_instruction("Drive through the top of the stroke"),
        ],
    );
    drill.description = "Short introduction to left/right balance".to_string();
    drill.difficulty = DrillDifficulty::Beginner;
    drill
}

/// Feed the shared source with a slowly wandering pedal stroke.
fn spawn_simulated_sensor(source: Arc<SharedMetricsSource>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(250));
        let mut t = 0.0f32;
        loop {
            ticker.tick().await;
            t += 0.25;
            let data = CyclingDynamicsData::new(
                LeftRightBalance::from_left(50.0 + 4.0 * (t * 0.7).sin()),
                PedalSmoothness::new(21.0, 23.0),
                TorqueEffectiveness::new(
                    62.0 + 8.0 * (t * 0.4).sin(),
                    60.0 + 8.0 * (t * 0.4).cos(),
                ),
            );
            source.update_dynamics(&data);
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PedalDrill v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config().context("Failed to load configuration")?;
    if !get_config_path().exists() {
        match save_config(&config) {
            Ok(()) => tracing::info!("Wrote default config to {:?}", get_config_path()),
            Err(e) => tracing::warn!("Could not write default config: {}", e),
        }
    }

    let source = Arc::new(SharedMetricsSource::new());
    let sensor = spawn_simulated_sensor(source.clone());

    let mut engine = DrillEngine::new(source, config.engine.clone());
    if config.recording.enabled {
        let recorder = JsonLinesRecorder::new(config.results_path());
        tracing::info!("Recording results to {:?}", recorder.path());
        engine = engine.with_recorder(Arc::new(recorder));
    }

    tracing::debug!("Tick interval {:?}", engine.settings().tick_interval());

    let events = engine.events();
    engine
        .start(demo_drill())
        .await
        .context("Failed to start drill")?;

    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    'run: loop {
        ticker.tick().await;
        while let Ok(event) = events.try_recv() {
            let terminal = event.is_terminal();
            match event {
                DrillEvent::CountdownTick { seconds_remaining } => {
                    tracing::info!("Starting in {}...", seconds_remaining)
                }
                DrillEvent::PhaseChanged { index, phase } => {
                    tracing::info!("Phase {}: {} - {}", index + 1, phase.name, phase.instruction)
                }
                DrillEvent::TargetEntered => tracing::info!("In target"),
                DrillEvent::TargetExited => tracing::info!("Out of target"),
                DrillEvent::PhaseEndingWarning { seconds_remaining } => {
                    tracing::info!("Phase ends in {}", seconds_remaining)
                }
                DrillEvent::Failed(reason) => tracing::error!("Drill failed: {}", reason),
                DrillEvent::Completed(result) => {
                    let phases: Vec<String> = result
                        .phase_scores
                        .iter()
                        .map(|s| match s {
                            PhaseScore::Scored(p) => format!("{:.0}%", p),
                            PhaseScore::NotApplicable => "-".to_string(),
                        })
                        .collect();
                    tracing::info!(
                        "Finished '{}': score {:.1}, {:.1}% in target, phases [{}]",
                        result.drill_name,
                        result.score,
                        result.time_in_target_percent,
                        phases.join(", ")
                    );
                }
            }
            if terminal {
                break 'run;
            }
        }
    }

    engine.destroy().await;
    sensor.abort();
    Ok(())
}
