//! Execution controller.
//!
//! Owns the simulation horizon and clock mode and drives run passes:
//!
//! - **Deferred**: `run()` blocks, drives the engine to the horizon, reports,
//!   and returns the pass summary.
//! - **Real-time**: `run()` hands the same sequence to a background thread
//!   and returns at once. The thread is owned by an [`ExecutionHandle`]
//!   that can be joined or asked to stop.
//!
//! State moves `Idle -> Running -> Completed`; a failed pass falls back to
//! `Idle`.

use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::ScenarioError;
use crate::config::RerunClock;
use crate::engine::{ClockMode, NodeHandle, SimulationEngine};
use crate::report::{Reporter, RunReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    Idle,
    Running,
    Completed,
}

/// Background clock context of a real-time pass
pub struct ExecutionHandle {
    thread: JoinHandle<Result<RunReport, ScenarioError>>,
    engine: Arc<dyn SimulationEngine>,
    state: Arc<Mutex<ExecutionState>>,
}

impl ExecutionHandle {
    /// Wait for the pass to finish and return its summary
    pub fn join(self) -> Result<RunReport, ScenarioError> {
        self.thread
            .join()
            .map_err(|_| ScenarioError::BackgroundPanicked)?
    }

    /// Ask the clock to stop at the next event boundary; no effect once the
    /// pass has left `Running`
    pub fn request_stop(&self) {
        if !self.is_finished() && *lock(&self.state) == ExecutionState::Running {
            self.engine.stop_clock();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}

/// Everything one pass needs; cloned into the background thread
#[derive(Clone)]
struct PassContext {
    engine: Arc<dyn SimulationEngine>,
    reporter: Arc<dyn Reporter>,
    state: Arc<Mutex<ExecutionState>>,
    backbone: Vec<NodeHandle>,
    horizon: Duration,
    clock_mode: ClockMode,
    rerun_clock: RerunClock,
}

impl PassContext {
    fn set_state(&self, state: ExecutionState) {
        *lock(&self.state) = state;
    }

    /// Rewind or keep the clock and arm the stop time for `pass`.
    /// Arming discards stop requests aimed at an earlier pass.
    fn prepare(&self, pass: u32) {
        if pass > 1 && self.rerun_clock == RerunClock::Reset {
            self.engine.reset_clock();
        }
        let clock_start = self.engine.now();
        self.engine.stop_at(clock_start + self.horizon);
    }

    /// Drive to the horizon, report, and publish the final state
    fn drive(&self, pass: u32) -> Result<RunReport, ScenarioError> {
        let result = self.drive_pass(pass);
        match &result {
            Ok(_) => self.set_state(ExecutionState::Completed),
            Err(e) => {
                warn!("Pass {} failed: {}", pass, e);
                self.set_state(ExecutionState::Idle);
            }
        }
        result
    }

    fn drive_pass(&self, pass: u32) -> Result<RunReport, ScenarioError> {
        let started_at = Utc::now();
        let probes_before = self.engine.probe_stats();

        let outcome = self.engine.run_clock()?;
        debug!("Finished simulation.");

        let run = RunReport {
            pass,
            clock_mode: self.clock_mode,
            started_at,
            clock_start: outcome.started_at,
            clock_end: outcome.ended_at,
            horizon: self.horizon,
            stopped_early: outcome.stopped_early,
            probe: self.engine.probe_stats().since(probes_before),
            backbone_positions: self
                .backbone
                .iter()
                .filter_map(|node| self.engine.position(*node))
                .collect(),
        };

        let stdout = io::stdout();
        let mut sink = stdout.lock();
        self.reporter
            .report(&run, &mut sink)
            .map_err(ScenarioError::Report)?;

        info!(
            "Pass {} reached {:?} ({} probes sent, {} received)",
            pass, run.clock_end, run.probe.sent, run.probe.received
        );
        Ok(run)
    }
}

fn lock(state: &Mutex<ExecutionState>) -> MutexGuard<'_, ExecutionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives run passes in the configured clock mode
pub struct ExecutionController {
    context: PassContext,
    passes: u32,
    handle: Option<ExecutionHandle>,
    last_report: Option<RunReport>,
}

impl ExecutionController {
    pub fn new(
        engine: Arc<dyn SimulationEngine>,
        backbone: Vec<NodeHandle>,
        horizon: Duration,
        clock_mode: ClockMode,
        rerun_clock: RerunClock,
    ) -> Self {
        Self {
            context: PassContext {
                engine,
                reporter: Arc::new(crate::report::NoopReporter),
                state: Arc::new(Mutex::new(ExecutionState::Idle)),
                backbone,
                horizon,
                clock_mode,
                rerun_clock,
            },
            passes: 0,
            handle: None,
            last_report: None,
        }
    }

    /// Replace the completion hook; takes effect from the next pass
    pub fn set_reporter(&mut self, reporter: Arc<dyn Reporter>) {
        self.context.reporter = reporter;
    }

    pub fn state(&self) -> ExecutionState {
        *lock(&self.context.state)
    }

    pub fn clock_mode(&self) -> ClockMode {
        self.context.clock_mode
    }

    pub fn horizon(&self) -> Duration {
        self.context.horizon
    }

    /// Number of passes started so far
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Summary of the most recent pass that has been collected
    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    /// True while a background pass has not finished
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Start a fresh pass.
    ///
    /// Returns the pass summary in deferred mode and `None` in real-time
    /// mode, where the summary is collected by [`join`](Self::join).
    pub fn run(&mut self) -> Result<Option<RunReport>, ScenarioError> {
        if self.is_running() {
            return Err(ScenarioError::RunInProgress);
        }
        self.join()?;

        self.passes += 1;
        let pass = self.passes;
        self.context.set_state(ExecutionState::Running);
        self.context.prepare(pass);

        match self.context.clock_mode {
            ClockMode::Deferred => {
                debug!("Simulation started.");
                let run = self.context.drive(pass)?;
                self.last_report = Some(run.clone());
                Ok(Some(run))
            }
            ClockMode::RealTime => {
                debug!("Simulation started in a new thread.");
                let context = self.context.clone();
                let spawned = thread::Builder::new()
                    .name("sim-clock".to_string())
                    .spawn(move || context.drive(pass));
                let thread = match spawned {
                    Ok(thread) => thread,
                    Err(e) => {
                        self.context.set_state(ExecutionState::Idle);
                        return Err(ScenarioError::Spawn(e));
                    }
                };
                self.handle = Some(ExecutionHandle {
                    thread,
                    engine: Arc::clone(&self.context.engine),
                    state: Arc::clone(&self.context.state),
                });
                Ok(None)
            }
        }
    }

    /// Wait for a background pass, if any, and return its summary
    pub fn join(&mut self) -> Result<Option<RunReport>, ScenarioError> {
        match self.handle.take() {
            Some(handle) => {
                let run = handle.join()?;
                self.last_report = Some(run.clone());
                Ok(Some(run))
            }
            None => Ok(None),
        }
    }

    /// Ask a background pass to stop early; no effect otherwise
    pub fn request_stop(&self) {
        if let Some(handle) = &self.handle {
            handle.request_stop();
        }
    }
}
