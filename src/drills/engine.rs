//! Drill execution engine.
//!
//! A run is split in two layers:
//! - [`DrillRun`] is the synchronous phase/target/scoring state machine. It
//!   is advanced by explicit time deltas, which keeps it deterministic.
//! - [`DrillEngine`] owns one background task per run. The task is the only
//!   place a `DrillRun` is mutated; control calls reach it as commands over
//!   a channel and state leaves it through a watch channel.

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossbeam::channel::{Receiver, Sender, TrySendError};
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::drills::events::DrillEvent;
use crate::drills::recorder::ResultRecorder;
use crate::drills::scoring::{percent_of, ScoreTracker};
use crate::drills::types::{
    DrillDefinition, DrillError, DrillResult, DrillStatus, ExecutionState, Phase, PhaseScore,
};
use crate::sensors::{MetricsSource, PedalingMetrics};
use crate::storage::config::EngineSettings;

/// What a tick did to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Run continues
    Continue,
    /// Last phase elapsed; the run is completed
    Finished,
}

/// State machine for a single drill run.
pub struct DrillRun {
    drill: DrillDefinition,
    state: ExecutionState,
    scores: ScoreTracker,
    started_at: DateTime<Utc>,
    warning_seconds: u32,
    last_warning: Option<u32>,
}

impl DrillRun {
    /// Create a run in its countdown state.
    pub fn new(drill: DrillDefinition, countdown_seconds: u32, warning_seconds: u32) -> Self {
        Self {
            drill,
            state: ExecutionState::countdown(countdown_seconds),
            scores: ScoreTracker::new(),
            started_at: Utc::now(),
            warning_seconds,
            last_warning: None,
        }
    }

    /// The drill being run.
    pub fn drill(&self) -> &DrillDefinition {
        &self.drill
    }

    /// Current snapshot.
    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    /// Current status.
    pub fn status(&self) -> DrillStatus {
        self.state.status
    }

    /// Scores of the phases finished so far.
    pub fn phase_scores(&self) -> &[PhaseScore] {
        self.scores.phase_scores()
    }

    /// Update the countdown display.
    pub fn set_countdown(&mut self, seconds_remaining: u32) {
        if self.state.status == DrillStatus::Countdown {
            self.state.countdown_seconds_remaining = seconds_remaining;
        }
    }

    /// Leave the countdown and enter the first phase.
    pub fn begin(&mut self, events: &mut Vec<DrillEvent>) {
        if self.state.status != DrillStatus::Countdown {
            return;
        }

        self.state.status = DrillStatus::Running;
        self.state.countdown_seconds_remaining = 0;
        self.started_at = Utc::now();

        if let Some(first) = self.drill.phases.first() {
            self.state.proximity = 0.0;
            self.state.score = self.scores.score();
            events.push(DrillEvent::PhaseChanged {
                index: 0,
                phase: first.clone(),
            });
        }

        tracing::info!("Drill '{}' running", self.drill.name);
    }

    /// Freeze the clock. Only affects a running drill.
    pub fn pause(&mut self) -> bool {
        if self.state.status != DrillStatus::Running {
            return false;
        }
        self.state.status = DrillStatus::Paused;
        tracing::info!("Drill paused");
        true
    }

    /// Restart the clock. Only affects a paused drill.
    pub fn resume(&mut self) -> bool {
        if self.state.status != DrillStatus::Paused {
            return false;
        }
        self.state.status = DrillStatus::Running;
        tracing::info!("Drill resumed");
        true
    }

    fn phase(&self, index: usize) -> Result<&Phase, DrillError> {
        self.drill
            .phases
            .get(index)
            .ok_or(DrillError::PhaseOutOfRange {
                index,
                count: self.drill.phases.len(),
            })
    }

    /// Advance the run by `delta_ms` of wall-clock time.
    ///
    /// Does nothing unless the run is `Running`.
    pub fn advance(
        &mut self,
        delta_ms: u64,
        metrics: &PedalingMetrics,
        events: &mut Vec<DrillEvent>,
    ) -> Result<TickOutcome, DrillError> {
        if self.state.status != DrillStatus::Running {
            return Ok(TickOutcome::Continue);
        }

        self.state.elapsed_ms += delta_ms;
        self.state.phase_elapsed_ms += delta_ms;

        let index = self.state.current_phase_index;
        let (duration_ms, has_target) = {
            let phase = self.phase(index)?;
            (phase.duration_ms, phase.has_target())
        };

        if self.state.phase_elapsed_ms >= duration_ms {
            let score = self.scores.finish_phase(has_target);
            tracing::debug!(
                "Phase {} finished after {} ms with score {:?}",
                index,
                self.state.phase_elapsed_ms,
                score
            );

            let next = index + 1;
            if next >= self.drill.phases.len() {
                self.complete();
                return Ok(TickOutcome::Finished);
            }

            self.enter_phase(next);
            events.push(DrillEvent::PhaseChanged {
                index: next,
                phase: self.phase(next)?.clone(),
            });
        }

        let phase = self.phase(self.state.current_phase_index)?;
        let (target, hold_time_ms, duration_ms) =
            (phase.target, phase.hold_time_ms, phase.duration_ms);

        match target {
            Some(target) => {
                let met = target.is_met_by(metrics);
                self.scores.record(delta_ms, met);

                if met != self.state.is_in_target {
                    tracing::debug!("Target {}", if met { "entered" } else { "exited" });
                    events.push(if met {
                        DrillEvent::TargetEntered
                    } else {
                        DrillEvent::TargetExited
                    });
                }

                self.state.is_in_target = met;
                self.state.target_hold_ms = self.scores.phase_in_target_ms();
                self.state.continuous_in_target_ms = self.scores.streak_ms();
                self.state.hold_time_met = hold_time_ms
                    .map(|hold| self.scores.best_streak_ms() >= hold)
                    .unwrap_or(false);
                self.state.proximity = target.proximity_for(metrics);
            }
            None => {
                self.state.is_in_target = false;
                self.state.proximity = 0.0;
            }
        }

        self.state.score = self.scores.score();

        let remaining_ms = duration_ms.saturating_sub(self.state.phase_elapsed_ms);
        let seconds_remaining = remaining_ms.div_ceil(1000) as u32;
        if seconds_remaining >= 1 && seconds_remaining <= self.warning_seconds {
            self.state.phase_ending_countdown = Some(seconds_remaining);
            if self.last_warning != Some(seconds_remaining) {
                self.last_warning = Some(seconds_remaining);
                events.push(DrillEvent::PhaseEndingWarning { seconds_remaining });
            }
        } else {
            self.state.phase_ending_countdown = None;
        }

        Ok(TickOutcome::Continue)
    }

    fn enter_phase(&mut self, index: usize) {
        self.state.current_phase_index = index;
        self.state.phase_elapsed_ms = 0;
        self.state.target_hold_ms = 0;
        self.state.continuous_in_target_ms = 0;
        self.state.hold_time_met = false;
        self.state.is_in_target = false;
        self.state.phase_ending_countdown = None;
        self.last_warning = None;
        tracing::debug!("Transitioned to phase {}", index);
    }

    fn complete(&mut self) {
        self.state.status = DrillStatus::Completed;
        self.state.is_in_target = false;
        self.state.phase_ending_countdown = None;
        self.state.score = self.scores.score();
        tracing::info!(
            "Drill '{}' completed with score {:.1}",
            self.drill.name,
            self.state.score
        );
    }

    /// End the run early.
    ///
    /// Returns a partial result when the run had started its phases. The
    /// phase in progress is not scored.
    pub fn cancel(&mut self) -> Option<DrillResult> {
        let had_started = match self.state.status {
            DrillStatus::Running | DrillStatus::Paused => true,
            DrillStatus::Countdown => false,
            DrillStatus::Completed | DrillStatus::Cancelled => return None,
        };

        self.state.status = DrillStatus::Cancelled;
        self.state.is_in_target = false;
        self.state.phase_ending_countdown = None;
        tracing::info!(
            "Drill '{}' cancelled after {} ms",
            self.drill.name,
            self.state.elapsed_ms
        );

        had_started.then(|| self.result())
    }

    /// Build the result for the run as it stands.
    pub fn result(&self) -> DrillResult {
        DrillResult {
            id: Uuid::new_v4(),
            drill_id: self.drill.id.clone(),
            drill_name: self.drill.name.clone(),
            started_at: self.started_at,
            duration_ms: self.state.elapsed_ms,
            score: self.scores.score(),
            time_in_target_ms: self.scores.total_in_target_ms(),
            time_in_target_percent: percent_of(
                self.scores.total_in_target_ms(),
                self.state.elapsed_ms,
            ),
            completed: self.state.status == DrillStatus::Completed,
            phase_scores: self.scores.phase_scores().to_vec(),
        }
    }
}

/// Events kept for readers that fall behind; older ones are dropped first.
pub const EVENT_BACKLOG: usize = 1024;

/// Bounded event queue that evicts its oldest entry when full.
#[derive(Clone)]
struct EventQueue {
    tx: Sender<DrillEvent>,
    rx: Receiver<DrillEvent>,
}

impl EventQueue {
    fn new(capacity: usize) -> Self {
        let (tx, rx) = crossbeam::channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    fn push(&self, mut event: DrillEvent) {
        loop {
            match self.tx.try_send(event) {
                Ok(()) | Err(TrySendError::Disconnected(_)) => return,
                Err(TrySendError::Full(rejected)) => {
                    let _ = self.rx.try_recv();
                    event = rejected;
                }
            }
        }
    }
}

/// Control requests delivered to the run task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause,
    Resume,
    Stop,
}

type StateSender = Arc<watch::Sender<Option<ExecutionState>>>;

/// Everything the run task owns.
struct RunTask {
    run: DrillRun,
    settings: EngineSettings,
    metrics: Arc<dyn MetricsSource>,
    recorder: Option<Arc<dyn ResultRecorder>>,
    state_tx: StateSender,
    events: EventQueue,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl RunTask {
    fn publish(&self) {
        self.state_tx.send_replace(Some(self.run.state().clone()));
    }

    fn emit(&self, events: Vec<DrillEvent>) {
        for event in events {
            self.events.push(event);
        }
    }

    fn deliver(&self, result: DrillResult) {
        if let Some(recorder) = &self.recorder {
            if let Err(e) = recorder.record(&result) {
                tracing::warn!("Failed to record drill result: {}", e);
            }
        }
        self.events.push(DrillEvent::Completed(result));
    }

    fn cancel(&mut self) {
        let result = self.run.cancel();
        self.publish();
        if let Some(result) = result {
            self.deliver(result);
        }
    }

    async fn execute(mut self) {
        for remaining in (1..=self.settings.countdown_seconds).rev() {
            self.run.set_countdown(remaining);
            self.publish();
            self.emit(vec![DrillEvent::CountdownTick {
                seconds_remaining: remaining,
            }]);

            let sleep = tokio::time::sleep(Duration::from_secs(1));
            tokio::pin!(sleep);
            loop {
                tokio::select! {
                    biased;
                    command = self.commands.recv() => match command {
                        Some(Command::Stop) | None => {
                            self.cancel();
                            return;
                        }
                        Some(_) => {}
                    },
                    _ = &mut sleep => break,
                }
            }
        }

        let mut events = Vec::new();
        self.run.begin(&mut events);
        self.emit(events);
        self.publish();

        let mut ticker = tokio::time::interval(self.settings.tick_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        let mut last_wake = Instant::now();

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Pause) => {
                        if self.run.pause() {
                            self.publish();
                        }
                    }
                    Some(Command::Resume) => {
                        if self.run.resume() {
                            last_wake = Instant::now();
                            self.publish();
                        }
                    }
                    Some(Command::Stop) | None => {
                        self.cancel();
                        return;
                    }
                },
                _ = ticker.tick() => {
                    let now = Instant::now();
                    if self.run.status() != DrillStatus::Running {
                        last_wake = now;
                        continue;
                    }

                    let delta_ms = now.duration_since(last_wake).as_millis() as u64;
                    last_wake = now;

                    let metrics = self.metrics.latest();
                    let mut events = Vec::new();
                    match self.run.advance(delta_ms, &metrics, &mut events) {
                        Ok(TickOutcome::Continue) => {
                            self.emit(events);
                            self.publish();
                        }
                        Ok(TickOutcome::Finished) => {
                            self.emit(events);
                            self.publish();
                            let result = self.run.result();
                            self.deliver(result);
                            return;
                        }
                        Err(e) => {
                            tracing::error!("Drill run failed: {}", e);
                            self.emit(events);
                            self.events.push(DrillEvent::Failed(e.to_string()));
                            self.cancel();
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handle to the task driving the active run.
struct ActiveRun {
    handle: JoinHandle<()>,
}

/// Runs drills against a live metrics source.
///
/// Control methods take `&self` and may be called from any thread; the
/// engine can be shared behind an `Arc`. `start`, `stop` and `destroy`
/// must be called from within a tokio runtime.
pub struct DrillEngine {
    settings: EngineSettings,
    metrics: Arc<dyn MetricsSource>,
    recorder: Option<Arc<dyn ResultRecorder>>,
    state_tx: StateSender,
    state_rx: watch::Receiver<Option<ExecutionState>>,
    events: EventQueue,
    commands: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    active: tokio::sync::Mutex<Option<ActiveRun>>,
}

impl DrillEngine {
    /// Create an engine with explicit settings.
    pub fn new(metrics: Arc<dyn MetricsSource>, settings: EngineSettings) -> Self {
        let (state_tx, state_rx) = watch::channel(None);

        Self {
            settings,
            metrics,
            recorder: None,
            state_tx: Arc::new(state_tx),
            state_rx,
            events: EventQueue::new(EVENT_BACKLOG),
            commands: Mutex::new(None),
            active: tokio::sync::Mutex::new(None),
        }
    }

    /// Create an engine with default timing.
    pub fn with_defaults(metrics: Arc<dyn MetricsSource>) -> Self {
        Self::new(metrics, EngineSettings::default())
    }

    /// Hand every result to `recorder` as well as to the event stream.
    pub fn with_recorder(mut self, recorder: Arc<dyn ResultRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Engine settings.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Receiver for drill events.
    ///
    /// Receivers share one queue: each event goes to exactly one of them.
    /// The queue holds at most [`EVENT_BACKLOG`] events. When nobody drains
    /// it the oldest are discarded, so a run's final `Completed` or `Failed`
    /// is still there to read.
    pub fn events(&self) -> Receiver<DrillEvent> {
        self.events.rx.clone()
    }

    /// Subscribe to state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<Option<ExecutionState>> {
        self.state_rx.clone()
    }

    /// Latest state, or `None` when no run has been started.
    pub fn state(&self) -> Option<ExecutionState> {
        self.state_rx.borrow().clone()
    }

    /// Whether a run is counting down, running or paused.
    pub fn is_active(&self) -> bool {
        self.state()
            .map(|s| !s.status.is_finished())
            .unwrap_or(false)
    }

    /// Start a drill, superseding any run in progress.
    ///
    /// The previous run is torn down without producing a result.
    pub async fn start(&self, drill: DrillDefinition) -> Result<(), DrillError> {
        drill.validate()?;

        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            previous.handle.abort();
            let _ = previous.handle.await;
            tracing::info!("Previous drill run superseded");
        }

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        self.set_commands(Some(command_tx));

        tracing::info!(
            "Starting drill '{}' ({} phases, {} ms)",
            drill.name,
            drill.phases.len(),
            drill.total_duration_ms()
        );

        let task = RunTask {
            run: DrillRun::new(
                drill,
                self.settings.countdown_seconds,
                self.settings.warning_seconds,
            ),
            settings: self.settings.clone(),
            metrics: self.metrics.clone(),
            recorder: self.recorder.clone(),
            state_tx: self.state_tx.clone(),
            events: self.events.clone(),
            commands: command_rx,
        };
        task.publish();

        let state_tx = self.state_tx.clone();
        let events = self.events.clone();
        let handle = tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task.execute()).catch_unwind().await {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!("Drill run aborted: {}", reason);
                state_tx.send_modify(|state| {
                    if let Some(state) = state {
                        state.status = DrillStatus::Cancelled;
                        state.phase_ending_countdown = None;
                    }
                });
                events.push(DrillEvent::Failed(reason));
            }
        });

        *active = Some(ActiveRun { handle });
        Ok(())
    }

    /// Pause a running drill. No-op otherwise.
    pub fn pause(&self) {
        self.send(Command::Pause);
    }

    /// Resume a paused drill. No-op otherwise.
    pub fn resume(&self) {
        self.send(Command::Resume);
    }

    /// Stop the active run and wait for its task to finish.
    ///
    /// A run that had reached its phases yields one incomplete result.
    /// Calling this with no active run does nothing.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        let Some(run) = active.take() else {
            return;
        };

        self.send(Command::Stop);
        self.set_commands(None);
        if let Err(e) = run.handle.await {
            tracing::error!("Drill task ended abnormally: {}", e);
        }
    }

    /// Stop any run and clear the published state.
    pub async fn destroy(&self) {
        self.stop().await;
        self.state_tx.send_replace(None);
        tracing::debug!("Drill engine destroyed");
    }

    fn send(&self, command: Command) {
        if let Ok(commands) = self.commands.lock() {
            if let Some(tx) = commands.as_ref() {
                let _ = tx.send(command);
            }
        }
    }

    fn set_commands(&self, tx: Option<mpsc::UnboundedSender<Command>>) {
        if let Ok(mut commands) = self.commands.lock() {
            *commands = tx;
        }
    }
}
