//! Simulation engine seam.
//!
//! The scenario coordinator never models radio channels, MAC/PHY devices,
//! routing internals or event scheduling itself. It drives an engine through
//! the [`SimulationEngine`] trait, which is shared between the constructing
//! context and the background clock context, hence the `&self` receivers.

pub mod virtual_engine;

use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::topology::types::Position;
use crate::workload::ProbeWindow;

pub use virtual_engine::VirtualEngine;

/// Opaque reference to a node created by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeHandle(pub usize);

/// Opaque reference to a network device created by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceHandle(pub usize);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev#{}", self.0)
    }
}

/// How simulated time relates to wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockMode {
    /// Events are processed as fast as possible
    Deferred,
    /// Events are paced against the wall clock
    RealTime,
}

/// Role a device plays on its medium
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediumRole {
    /// Ad-hoc mesh interface on the backbone
    Mesh,
    /// Infrastructure station that associates with an access point
    Station,
    /// Infrastructure access point advertising the network identifier
    AccessPoint,
}

/// Transmission rate control for a device group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateControl {
    /// Adaptive auto rate fallback
    Arf,
    /// Same rate for every data frame
    ConstantRate { data_mode: String, rts_cts_threshold: u32 },
}

/// Parameters for a group of devices sharing one medium
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediumParams {
    pub role: MediumRole,
    pub ssid: Option<String>,
    pub rate_control: RateControl,
}

impl MediumParams {
    pub fn mesh(data_mode: &str, rts_cts_threshold: u32) -> Self {
        Self {
            role: MediumRole::Mesh,
            ssid: None,
            rate_control: RateControl::ConstantRate {
                data_mode: data_mode.to_string(),
                rts_cts_threshold,
            },
        }
    }

    pub fn station(ssid: &str) -> Self {
        Self {
            role: MediumRole::Station,
            ssid: Some(ssid.to_string()),
            rate_control: RateControl::Arf,
        }
    }

    pub fn access_point(ssid: &str) -> Self {
        Self {
            role: MediumRole::AccessPoint,
            ssid: Some(ssid.to_string()),
            rate_control: RateControl::Arf,
        }
    }
}

/// Routing protocol installed on the backbone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoutingProtocol {
    /// Reactive ad-hoc on-demand distance vector routing
    #[default]
    Aodv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoutingParams {
    pub protocol: RoutingProtocol,
}

/// Counters for the reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProbeStats {
    pub sent: u64,
    pub received: u64,
}

impl ProbeStats {
    /// Counters accumulated after `earlier` was read
    pub fn since(&self, earlier: ProbeStats) -> ProbeStats {
        ProbeStats {
            sent: self.sent.saturating_sub(earlier.sent),
            received: self.received.saturating_sub(earlier.received),
        }
    }
}

/// What a single `run_clock` call covered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockOutcome {
    pub started_at: Duration,
    pub ended_at: Duration,
    /// True when `stop_clock` cut the run short of its stop time
    pub stopped_early: bool,
}

/// Engine-side failures
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown node {0}")]
    UnknownNode(NodeHandle),
    #[error("Unknown device {0}")]
    UnknownDevice(DeviceHandle),
    #[error("Name '{0}' is already bound to another node")]
    DuplicateName(String),
    #[error("Length mismatch: {what} expected {expected}, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("Address block {base}/{mask} cannot hold {needed} devices")]
    AddressBlockExhausted {
        base: Ipv4Addr,
        mask: Ipv4Addr,
        needed: usize,
    },
    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capabilities the scenario coordinator consumes from a simulation engine
pub trait SimulationEngine: Send + Sync {
    /// Select deferred or real-time scheduling; must precede `run_clock`
    fn set_clock_mode(&self, mode: ClockMode);

    fn create_nodes(&self, count: usize) -> Vec<NodeHandle>;

    /// Bind a human-readable label to a node for later lookup
    fn name_node(&self, node: NodeHandle, label: &str) -> Result<(), EngineError>;

    /// Look up a node by the label bound with `name_node`
    fn find_node(&self, label: &str) -> Option<NodeHandle>;

    /// Create one device per node on a medium described by `medium`
    fn create_devices(
        &self,
        nodes: &[NodeHandle],
        medium: &MediumParams,
    ) -> Result<Vec<DeviceHandle>, EngineError>;

    /// Install static positions, one per node by index
    fn install_mobility(
        &self,
        nodes: &[NodeHandle],
        positions: &[Position],
    ) -> Result<(), EngineError>;

    fn set_position(&self, node: NodeHandle, position: Position) -> Result<(), EngineError>;

    fn position(&self, node: NodeHandle) -> Option<Position>;

    fn install_routing(
        &self,
        nodes: &[NodeHandle],
        routing: &RoutingParams,
    ) -> Result<(), EngineError>;

    /// Number the devices sequentially inside the block, starting at `base + 1`
    fn assign_addresses(
        &self,
        devices: &[DeviceHandle],
        base: Ipv4Addr,
        mask: Ipv4Addr,
    ) -> Result<Vec<Ipv4Addr>, EngineError>;

    /// Install a reachability probe from `source` to `target`. The window is
    /// relative to the start of every `run_clock` call.
    fn install_probe(
        &self,
        source: NodeHandle,
        target: Ipv4Addr,
        window: &ProbeWindow,
    ) -> Result<(), EngineError>;

    /// Schedule the clock to stop at absolute simulated time `time` and
    /// discard any stop request left from an earlier run
    fn stop_at(&self, time: Duration);

    /// Process events until the scheduled stop or a `stop_clock` request
    fn run_clock(&self) -> Result<ClockOutcome, EngineError>;

    /// Ask a running clock to return; safe to call from any thread
    fn stop_clock(&self);

    fn now(&self) -> Duration;

    /// Rewind the clock to zero, keeping topology and installed workloads
    fn reset_clock(&self);

    /// Record packet capture on `devices`, files named after `prefix`
    fn enable_capture(&self, devices: &[DeviceHandle], prefix: &str) -> Result<(), EngineError>;

    /// Schedule a routing table dump of `nodes` at offset `at` into every run
    fn dump_routes_at(
        &self,
        nodes: &[NodeHandle],
        at: Duration,
        path: &Path,
    ) -> Result<(), EngineError>;

    /// Probe counters accumulated across all clock runs
    fn probe_stats(&self) -> ProbeStats;
}
