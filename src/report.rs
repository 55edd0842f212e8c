//! Completion reporting.
//!
//! A [`Reporter`] is invoked once at the end of every run pass with the
//! pass summary and an output sink. The default hook does nothing.

use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{ClockMode, ProbeStats};
use crate::topology::types::Position;

/// Summary of one run pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// 1-based pass number within the scenario
    pub pass: u32,
    pub clock_mode: ClockMode,
    /// Wall-clock time the pass started
    pub started_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    pub clock_start: Duration,
    #[serde(with = "humantime_serde")]
    pub clock_end: Duration,
    #[serde(with = "humantime_serde")]
    pub horizon: Duration,
    pub stopped_early: bool,
    /// Probe counters of this pass alone
    pub probe: ProbeStats,
    /// Backbone placements as the pass ended
    pub backbone_positions: Vec<Position>,
}

/// Completion hook for run passes
pub trait Reporter: Send + Sync {
    fn report(&self, _run: &RunReport, _sink: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }
}

/// Emits nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReporter;

impl Reporter for NoopReporter {}

/// Human-readable summary lines
#[derive(Debug, Default, Clone, Copy)]
pub struct TextReporter;

impl Reporter for TextReporter {
    fn report(&self, run: &RunReport, sink: &mut dyn Write) -> io::Result<()> {
        writeln!(sink, "{}", "=".repeat(60))?;
        writeln!(sink, "Pass {} ({:?} clock) started {}", run.pass, run.clock_mode, run.started_at)?;
        writeln!(
            sink,
            "Simulated {:?} -> {:?} (horizon {:?}){}",
            run.clock_start,
            run.clock_end,
            run.horizon,
            if run.stopped_early { ", stopped early" } else { "" }
        )?;

        let loss = if run.probe.sent == 0 {
            0.0
        } else {
            100.0 * (run.probe.sent - run.probe.received) as f64 / run.probe.sent as f64
        };
        writeln!(
            sink,
            "Probe: {} sent, {} received, {:.1}% loss",
            run.probe.sent, run.probe.received, loss
        )?;
        for (index, position) in run.backbone_positions.iter().enumerate() {
            writeln!(
                sink,
                "  node-{}: ({:.2}, {:.2}, {:.2})",
                index + 1,
                position.x,
                position.y,
                position.z
            )?;
        }
        Ok(())
    }
}

/// One JSON object per line
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReporter;

impl Reporter for JsonReporter {
    fn report(&self, run: &RunReport, sink: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *sink, run)?;
        writeln!(sink)
    }
}
