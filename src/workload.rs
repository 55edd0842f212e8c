//! Reachability probe workload.
//!
//! One probe runs per scenario: it is sourced from the first access-tier
//! station and targets the last address assigned on the access tier. The
//! probe is active from 1 s until half a second before the horizon and sends
//! one echo per second.

use std::net::Ipv4Addr;
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::config::ValidationError;
use crate::engine::{EngineError, NodeHandle, SimulationEngine};
use crate::ip::AddressMap;

/// Probe activation time
pub const PROBE_START: Duration = Duration::from_secs(1);
/// Gap between probe deactivation and the simulation horizon
pub const PROBE_TAIL: Duration = Duration::from_millis(500);
/// Time between echo requests
pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Active interval of the probe in simulated time, `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeWindow {
    pub start: Duration,
    pub stop: Duration,
    pub interval: Duration,
}

impl ProbeWindow {
    /// Derive the probe window for a simulation horizon.
    ///
    /// Horizons of 1.5 s or less leave no room between start and stop and
    /// are rejected.
    pub fn for_horizon(sim_time: Duration) -> Result<Self, ValidationError> {
        let stop = sim_time.checked_sub(PROBE_TAIL).unwrap_or_default();
        if stop <= PROBE_START {
            return Err(ValidationError::InvalidGeneral(format!(
                "sim_time {:?} leaves an empty probe window [{:?}, {:?}]; it must exceed {:?}",
                sim_time,
                PROBE_START,
                stop,
                PROBE_START + PROBE_TAIL
            )));
        }
        Ok(Self {
            start: PROBE_START,
            stop,
            interval: PROBE_INTERVAL,
        })
    }

    pub fn is_active(&self, at: Duration) -> bool {
        at >= self.start && at < self.stop
    }

    /// Echo time following `previous`, or the first one for `None`.
    /// Times are offsets from the start of a pass.
    pub fn next_echo(&self, previous: Option<Duration>) -> Option<Duration> {
        let at = match previous {
            None => self.start,
            Some(_) if self.interval.is_zero() => return None,
            Some(previous) => previous.checked_add(self.interval)?,
        };
        self.is_active(at).then_some(at)
    }

    /// Times at which echo requests leave the source, computed lazily
    pub fn echoes(&self) -> impl Iterator<Item = Duration> {
        let window = *self;
        std::iter::successors(window.next_echo(None), move |at| window.next_echo(Some(*at)))
    }
}

/// The installed probe: who sends and where to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub source: NodeHandle,
    pub target: Ipv4Addr,
    pub window: ProbeWindow,
}

/// Install the reachability probe from `source` to the last access-tier address
pub fn install_reachability_probe(
    engine: &dyn SimulationEngine,
    source: NodeHandle,
    access_addresses: &AddressMap,
    window: ProbeWindow,
) -> Result<ProbeTarget, EngineError> {
    let target = access_addresses
        .last()
        .ok_or(EngineError::LengthMismatch {
            what: "access tier addresses",
            expected: 1,
            got: 0,
        })?;

    engine.install_probe(source, target, &window)?;
    info!(
        "Installed reachability probe {} -> {} active [{:?}, {:?})",
        source, target, window.start, window.stop
    );
    Ok(ProbeTarget { source, target, window })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_for_ten_seconds() {
        let window = ProbeWindow::for_horizon(Duration::from_secs(10)).unwrap();
        assert_eq!(window.start, Duration::from_secs(1));
        assert_eq!(window.stop, Duration::from_millis(9500));
        assert_eq!(window.echoes().count(), 9);
        assert_eq!(window.echoes().last(), Some(Duration::from_secs(9)));
    }

    #[test]
    fn test_long_horizon_echoes_are_lazy() {
        // About a century of simulated time
        let window = ProbeWindow::for_horizon(Duration::from_secs(3_153_600_000)).unwrap();
        let first: Vec<Duration> = window.echoes().take(3).collect();
        assert_eq!(first, vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3),
        ]);
    }

    #[test]
    fn test_next_echo_stops_at_window_end() {
        let window = ProbeWindow::for_horizon(Duration::from_secs(3)).unwrap();
        assert_eq!(window.next_echo(None), Some(Duration::from_secs(1)));
        assert_eq!(window.next_echo(Some(Duration::from_secs(1))), Some(Duration::from_secs(2)));
        assert_eq!(window.next_echo(Some(Duration::from_secs(2))), None);

        let stuck = ProbeWindow { interval: Duration::ZERO, ..window };
        assert_eq!(stuck.next_echo(Some(Duration::from_secs(1))), None);
    }

    #[test]
    fn test_short_horizons_rejected() {
        assert!(ProbeWindow::for_horizon(Duration::from_secs(1)).is_err());
        assert!(ProbeWindow::for_horizon(Duration::from_millis(1500)).is_err());
        assert!(ProbeWindow::for_horizon(Duration::ZERO).is_err());
        assert!(ProbeWindow::for_horizon(Duration::from_millis(1501)).is_ok());
    }

    #[test]
    fn test_is_active_bounds() {
        let window = ProbeWindow::for_horizon(Duration::from_secs(3)).unwrap();
        assert!(!window.is_active(Duration::from_millis(999)));
        assert!(window.is_active(Duration::from_secs(1)));
        assert!(!window.is_active(Duration::from_millis(2500)));
    }
}
