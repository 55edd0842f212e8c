//! In-process simulation engine.
//!
//! `VirtualEngine` keeps the node/device/address bookkeeping the scenario
//! needs and runs a small event clock: probe echoes fire once per interval
//! inside their window and route dumps fire at their scheduled time. Both
//! schedules are offsets from the clock reading at the start of each
//! `run_clock` call, so every pass replays the same workload. Radio
//! reachability is a unit-disk model: two radios hear each other when they
//! are within `radio_range` meters.
//!
//! In real-time mode events are paced against the wall clock, scaled by
//! `time_scale` wall seconds per simulated second. The state lock is never
//! held while sleeping, so position updates from other threads do not wait
//! on the clock.

use std::collections::{HashMap, VecDeque};
use std::fmt::Write as _;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::{
    ClockMode, ClockOutcome, DeviceHandle, EngineError, MediumParams, MediumRole, NodeHandle,
    ProbeStats, RoutingParams, SimulationEngine,
};
use crate::topology::types::Position;
use crate::workload::ProbeWindow;

/// Default unit-disk radio range in meters
pub const DEFAULT_RADIO_RANGE: f64 = 100.0;

/// Longest uninterrupted sleep while pacing, so stop requests are seen quickly
const PACING_SLICE: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
struct NodeRecord {
    name: Option<String>,
    position: Position,
    routing: Option<RoutingParams>,
}

#[derive(Debug, Clone)]
struct DeviceRecord {
    node: NodeHandle,
    medium: MediumParams,
    address: Option<Ipv4Addr>,
    capture: Option<String>,
}

#[derive(Debug, Clone)]
struct ProbeRecord {
    source: NodeHandle,
    target: Ipv4Addr,
    window: ProbeWindow,
}

#[derive(Debug, Clone)]
struct RouteDump {
    nodes: Vec<NodeHandle>,
    at: Duration,
    path: PathBuf,
}

#[derive(Debug, Clone, Copy)]
enum Event {
    Echo(usize),
    Dump(usize),
}

#[derive(Debug)]
struct EngineState {
    mode: ClockMode,
    nodes: Vec<NodeRecord>,
    names: HashMap<String, NodeHandle>,
    devices: Vec<DeviceRecord>,
    probes: Vec<ProbeRecord>,
    dumps: Vec<RouteDump>,
    now: Duration,
    stop_at: Option<Duration>,
    stats: ProbeStats,
}

impl EngineState {
    fn node(&self, node: NodeHandle) -> Result<&NodeRecord, EngineError> {
        self.nodes.get(node.0).ok_or(EngineError::UnknownNode(node))
    }

    fn node_mut(&mut self, node: NodeHandle) -> Result<&mut NodeRecord, EngineError> {
        self.nodes.get_mut(node.0).ok_or(EngineError::UnknownNode(node))
    }

    fn has_role(&self, node: NodeHandle, role: MediumRole) -> bool {
        self.devices.iter().any(|d| d.node == node && d.medium.role == role)
    }

    fn is_mesh_router(&self, node: NodeHandle) -> bool {
        self.has_role(node, MediumRole::Mesh)
            && self.nodes.get(node.0).map_or(false, |n| n.routing.is_some())
    }

    /// The backbone node a node reaches the mesh through
    fn attachment(&self, node: NodeHandle, range: f64) -> Option<NodeHandle> {
        if self.has_role(node, MediumRole::Mesh) || self.has_role(node, MediumRole::AccessPoint) {
            return Some(node);
        }
        let station = self
            .devices
            .iter()
            .find(|d| d.node == node && d.medium.role == MediumRole::Station)?;
        let position = self.nodes.get(node.0)?.position;

        self.devices
            .iter()
            .filter(|d| d.medium.role == MediumRole::AccessPoint && d.medium.ssid == station.medium.ssid)
            .filter_map(|d| {
                let distance = self.nodes.get(d.node.0)?.position.distance(&position);
                (distance <= range).then_some((d.node, distance))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(ap, _)| ap)
    }

    /// Hop count between two mesh routers over in-range links
    fn mesh_hops(&self, from: NodeHandle, to: NodeHandle, range: f64) -> Option<usize> {
        if from == to {
            return Some(0);
        }
        if !self.is_mesh_router(from) || !self.is_mesh_router(to) {
            return None;
        }
        let routers: Vec<NodeHandle> = (0..self.nodes.len())
            .map(NodeHandle)
            .filter(|n| self.is_mesh_router(*n))
            .collect();

        let mut hops: HashMap<NodeHandle, usize> = HashMap::from([(from, 0)]);
        let mut queue = VecDeque::from([from]);
        while let Some(current) = queue.pop_front() {
            let depth = hops[&current];
            let here = self.nodes[current.0].position;
            for next in &routers {
                if hops.contains_key(next) || self.nodes[next.0].position.distance(&here) > range {
                    continue;
                }
                if *next == to {
                    return Some(depth + 1);
                }
                hops.insert(*next, depth + 1);
                queue.push_back(*next);
            }
        }
        None
    }

    fn node_for_address(&self, address: Ipv4Addr) -> Option<NodeHandle> {
        self.devices
            .iter()
            .find(|d| d.address == Some(address))
            .map(|d| d.node)
    }

    fn mesh_address(&self, node: NodeHandle) -> Option<Ipv4Addr> {
        self.devices
            .iter()
            .find(|d| d.node == node && d.medium.role == MediumRole::Mesh)
            .and_then(|d| d.address)
    }

    fn label(&self, node: NodeHandle) -> String {
        self.nodes
            .get(node.0)
            .and_then(|n| n.name.clone())
            .unwrap_or_else(|| node.to_string())
    }

    fn fire_echo(&mut self, index: usize, range: f64) {
        let Some(probe) = self.probes.get(index).cloned() else {
            return;
        };
        self.stats.sent += 1;

        let delivered = self.node_for_address(probe.target).and_then(|target| {
            let src_ap = self.attachment(probe.source, range)?;
            let dst_ap = self.attachment(target, range)?;
            self.mesh_hops(src_ap, dst_ap, range)
        });

        match delivered {
            Some(hops) => {
                self.stats.received += 1;
                debug!(
                    "t={:?} echo {} -> {} delivered over {} mesh hops",
                    self.now, probe.source, probe.target, hops
                );
            }
            None => debug!("t={:?} echo {} -> {} lost", self.now, probe.source, probe.target),
        }
    }

    fn fire_dump(&mut self, index: usize, range: f64) -> Result<(), EngineError> {
        let Some(dump) = self.dumps.get(index).cloned() else {
            return Ok(());
        };
        let mut table = String::new();
        for node in &dump.nodes {
            let _ = writeln!(table, "Node: {}; Time: +{:?}", self.label(*node), self.now);
            let _ = writeln!(table, "Destination\tHops");
            for peer in &dump.nodes {
                if peer == node {
                    continue;
                }
                if let (Some(hops), Some(address)) =
                    (self.mesh_hops(*node, *peer, range), self.mesh_address(*peer))
                {
                    let _ = writeln!(table, "{}\t{}", address, hops);
                }
            }
            table.push('\n');
        }
        std::fs::write(&dump.path, table)?;
        info!("Wrote routing tables to {}", dump.path.display());
        Ok(())
    }
}

/// Earliest pending event before `horizon`; echoes win ties
fn next_event(
    echoes: &[Option<Duration>],
    dumps: &[Option<Duration>],
    horizon: Duration,
) -> Option<(Duration, Event)> {
    let echo = echoes
        .iter()
        .enumerate()
        .filter_map(|(index, at)| at.map(|at| (at, Event::Echo(index))));
    let dump = dumps
        .iter()
        .enumerate()
        .filter_map(|(index, at)| at.map(|at| (at, Event::Dump(index))));
    echo.chain(dump)
        .filter(|(at, _)| *at < horizon)
        .min_by_key(|(at, _)| *at)
}

/// Engine backed by an in-memory model and an event clock
#[derive(Debug)]
pub struct VirtualEngine {
    state: Mutex<EngineState>,
    stop_requested: AtomicBool,
    radio_range: f64,
    time_scale: f64,
}

impl Default for VirtualEngine {
    fn default() -> Self {
        Self::new(DEFAULT_RADIO_RANGE, 1.0)
    }
}

impl VirtualEngine {
    /// Create an engine with a unit-disk `radio_range` (meters) and a
    /// real-time `time_scale` (wall seconds per simulated second)
    pub fn new(radio_range: f64, time_scale: f64) -> Self {
        Self {
            state: Mutex::new(EngineState {
                mode: ClockMode::Deferred,
                nodes: Vec::new(),
                names: HashMap::new(),
                devices: Vec::new(),
                probes: Vec::new(),
                dumps: Vec::new(),
                now: Duration::ZERO,
                stop_at: None,
                stats: ProbeStats::default(),
            }),
            stop_requested: AtomicBool::new(false),
            radio_range,
            time_scale,
        }
    }

    fn state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clock_mode(&self) -> ClockMode {
        self.state().mode
    }

    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    /// Number of devices created with `role`
    pub fn device_count(&self, role: MediumRole) -> usize {
        self.state().devices.iter().filter(|d| d.medium.role == role).count()
    }

    pub fn device_address(&self, device: DeviceHandle) -> Option<Ipv4Addr> {
        self.state().devices.get(device.0).and_then(|d| d.address)
    }

    pub fn device_node(&self, device: DeviceHandle) -> Option<NodeHandle> {
        self.state().devices.get(device.0).map(|d| d.node)
    }

    /// Capture file prefixes of devices with capture enabled
    pub fn capture_files(&self) -> Vec<String> {
        self.state().devices.iter().filter_map(|d| d.capture.clone()).collect()
    }

    pub fn has_routing(&self, node: NodeHandle) -> bool {
        self.state().nodes.get(node.0).map_or(false, |n| n.routing.is_some())
    }

    /// Sleep until `offset` simulated time has elapsed since `wall_start`.
    /// Returns false if a stop was requested while waiting.
    fn pace_until(&self, wall_start: Instant, offset: Duration) -> bool {
        let target = wall_start + offset.mul_f64(self.time_scale);
        loop {
            if self.stop_requested.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= target {
                return true;
            }
            thread::sleep((target - now).min(PACING_SLICE));
        }
    }
}

impl SimulationEngine for VirtualEngine {
    fn set_clock_mode(&self, mode: ClockMode) {
        debug!("Clock mode set to {:?}", mode);
        self.state().mode = mode;
    }

    fn create_nodes(&self, count: usize) -> Vec<NodeHandle> {
        let mut state = self.state();
        let first = state.nodes.len();
        state.nodes.extend((0..count).map(|_| NodeRecord {
            name: None,
            position: Position::default(),
            routing: None,
        }));
        (first..first + count).map(NodeHandle).collect()
    }

    fn name_node(&self, node: NodeHandle, label: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        if let Some(existing) = state.names.get(label) {
            if *existing != node {
                return Err(EngineError::DuplicateName(label.to_string()));
            }
        }
        state.node_mut(node)?.name = Some(label.to_string());
        state.names.insert(label.to_string(), node);
        Ok(())
    }

    fn find_node(&self, label: &str) -> Option<NodeHandle> {
        self.state().names.get(label).copied()
    }

    fn create_devices(
        &self,
        nodes: &[NodeHandle],
        medium: &MediumParams,
    ) -> Result<Vec<DeviceHandle>, EngineError> {
        let mut state = self.state();
        for node in nodes {
            state.node(*node)?;
        }
        let first = state.devices.len();
        state.devices.extend(nodes.iter().map(|node| DeviceRecord {
            node: *node,
            medium: medium.clone(),
            address: None,
            capture: None,
        }));
        Ok((first..first + nodes.len()).map(DeviceHandle).collect())
    }

    fn install_mobility(
        &self,
        nodes: &[NodeHandle],
        positions: &[Position],
    ) -> Result<(), EngineError> {
        if nodes.len() != positions.len() {
            return Err(EngineError::LengthMismatch {
                what: "positions",
                expected: nodes.len(),
                got: positions.len(),
            });
        }
        let mut state = self.state();
        for (node, position) in nodes.iter().zip(positions) {
            state.node_mut(*node)?.position = *position;
        }
        Ok(())
    }

    fn set_position(&self, node: NodeHandle, position: Position) -> Result<(), EngineError> {
        self.state().node_mut(node)?.position = position;
        Ok(())
    }

    fn position(&self, node: NodeHandle) -> Option<Position> {
        self.state().nodes.get(node.0).map(|n| n.position)
    }

    fn install_routing(
        &self,
        nodes: &[NodeHandle],
        routing: &RoutingParams,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        for node in nodes {
            state.node_mut(*node)?.routing = Some(*routing);
        }
        Ok(())
    }

    fn assign_addresses(
        &self,
        devices: &[DeviceHandle],
        base: Ipv4Addr,
        mask: Ipv4Addr,
    ) -> Result<Vec<Ipv4Addr>, EngineError> {
        let network = u32::from(base) & u32::from(mask);
        let capacity = u64::from(!u32::from(mask)).saturating_sub(1);
        if devices.len() as u64 > capacity {
            return Err(EngineError::AddressBlockExhausted {
                base,
                mask,
                needed: devices.len(),
            });
        }

        let mut state = self.state();
        let mut assigned = Vec::with_capacity(devices.len());
        for (offset, device) in devices.iter().enumerate() {
            let address = Ipv4Addr::from(network + 1 + offset as u32);
            state
                .devices
                .get_mut(device.0)
                .ok_or(EngineError::UnknownDevice(*device))?
                .address = Some(address);
            assigned.push(address);
        }
        Ok(assigned)
    }

    fn install_probe(
        &self,
        source: NodeHandle,
        target: Ipv4Addr,
        window: &ProbeWindow,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        state.node(source)?;
        state.probes.push(ProbeRecord {
            source,
            target,
            window: *window,
        });
        Ok(())
    }

    fn stop_at(&self, time: Duration) {
        self.state().stop_at = Some(time);
        self.stop_requested.store(false, Ordering::SeqCst);
    }

    fn run_clock(&self) -> Result<ClockOutcome, EngineError> {
        let (started_at, horizon, mode, windows, mut dumps) = {
            let state = self.state();
            let stop = state.stop_at.unwrap_or(state.now).max(state.now);
            let windows: Vec<ProbeWindow> = state.probes.iter().map(|p| p.window).collect();
            let dumps: Vec<Option<Duration>> = state.dumps.iter().map(|d| Some(d.at)).collect();
            (state.now, stop - state.now, state.mode, windows, dumps)
        };
        let mut echoes: Vec<Option<Duration>> = windows.iter().map(|w| w.next_echo(None)).collect();
        debug!(
            "Clock running from {:?} for {:?} ({} probes, {} dumps, {:?})",
            started_at,
            horizon,
            windows.len(),
            dumps.len(),
            mode
        );

        let wall_start = Instant::now();
        let mut stopped_early = false;
        let mut result = Ok(());

        while let Some((offset, event)) = next_event(&echoes, &dumps, horizon) {
            let keep_going = match mode {
                ClockMode::RealTime => self.pace_until(wall_start, offset),
                ClockMode::Deferred => !self.stop_requested.load(Ordering::SeqCst),
            };
            if !keep_going {
                stopped_early = true;
                break;
            }

            let mut state = self.state();
            state.now = started_at + offset;
            match event {
                Event::Echo(index) => {
                    state.fire_echo(index, self.radio_range);
                    echoes[index] = windows[index].next_echo(Some(offset));
                }
                Event::Dump(index) => {
                    dumps[index] = None;
                    if let Err(e) = state.fire_dump(index, self.radio_range) {
                        warn!("Route dump failed: {}", e);
                        result = Err(e);
                        break;
                    }
                }
            }
        }

        if result.is_ok() && !stopped_early {
            if mode == ClockMode::RealTime && !self.pace_until(wall_start, horizon) {
                stopped_early = true;
            } else {
                self.state().now = started_at + horizon;
            }
        }
        self.stop_requested.store(false, Ordering::SeqCst);
        result?;

        let ended_at = self.state().now;
        Ok(ClockOutcome {
            started_at,
            ended_at,
            stopped_early,
        })
    }

    fn stop_clock(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn now(&self) -> Duration {
        self.state().now
    }

    fn reset_clock(&self) {
        let mut state = self.state();
        state.now = Duration::ZERO;
        state.stop_at = None;
    }

    fn enable_capture(&self, devices: &[DeviceHandle], prefix: &str) -> Result<(), EngineError> {
        let mut state = self.state();
        for device in devices {
            let record = state
                .devices
                .get_mut(device.0)
                .ok_or(EngineError::UnknownDevice(*device))?;
            record.capture = Some(format!("{}-{}-{}.pcap", prefix, record.node.0, device.0));
        }
        Ok(())
    }

    fn dump_routes_at(
        &self,
        nodes: &[NodeHandle],
        at: Duration,
        path: &Path,
    ) -> Result<(), EngineError> {
        let mut state = self.state();
        for node in nodes {
            state.node(*node)?;
        }
        state.dumps.push(RouteDump {
            nodes: nodes.to_vec(),
            at,
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn probe_stats(&self) -> ProbeStats {
        self.state().stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn line_of_routers(engine: &VirtualEngine, spacing: f64, count: usize) -> Vec<NodeHandle> {
        let nodes = engine.create_nodes(count);
        let positions: Vec<Position> = (0..count)
            .map(|i| Position::new(i as f64 * spacing, 0.0, 0.0))
            .collect();
        engine.install_mobility(&nodes, &positions).unwrap();
        engine.create_devices(&nodes, &MediumParams::mesh("OfdmRate54Mbps", 0)).unwrap();
        engine.install_routing(&nodes, &RoutingParams::default()).unwrap();
        nodes
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let engine = VirtualEngine::default();
        let nodes = engine.create_nodes(2);
        engine.name_node(nodes[0], "node-1").unwrap();
        assert!(matches!(
            engine.name_node(nodes[1], "node-1"),
            Err(EngineError::DuplicateName(_))
        ));
        assert_eq!(engine.find_node("node-1"), Some(nodes[0]));
    }

    #[test]
    fn test_addresses_start_after_network() {
        let engine = VirtualEngine::default();
        let nodes = engine.create_nodes(3);
        let devices = engine.create_devices(&nodes, &MediumParams::station("ssid")).unwrap();
        let addresses = engine
            .assign_addresses(&devices, Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();
        assert_eq!(addresses[0], Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(addresses[2], Ipv4Addr::new(10, 0, 0, 3));
        assert_eq!(engine.device_address(devices[1]), Some(Ipv4Addr::new(10, 0, 0, 2)));
    }

    #[test]
    fn test_exhausted_block_rejected() {
        let engine = VirtualEngine::default();
        let nodes = engine.create_nodes(3);
        let devices = engine.create_devices(&nodes, &MediumParams::station("ssid")).unwrap();
        let result = engine.assign_addresses(
            &devices,
            Ipv4Addr::new(10, 0, 0, 0),
            Ipv4Addr::new(255, 255, 255, 252),
        );
        assert!(matches!(result, Err(EngineError::AddressBlockExhausted { .. })));
    }

    #[test]
    fn test_mesh_hops_follow_range() {
        let engine = VirtualEngine::new(60.0, 1.0);
        let nodes = line_of_routers(&engine, 50.0, 3);
        let state = engine.state();
        assert_eq!(state.mesh_hops(nodes[0], nodes[2], 60.0), Some(2));
        assert_eq!(state.mesh_hops(nodes[0], nodes[2], 40.0), None);
    }

    #[test]
    fn test_deferred_clock_counts_echoes() {
        let engine = VirtualEngine::default();
        let routers = line_of_routers(&engine, 10.0, 1);
        engine.create_devices(&routers, &MediumParams::access_point("ssid")).unwrap();

        let stations = engine.create_nodes(2);
        engine
            .install_mobility(&stations, &[Position::new(1.0, 0.0, 0.0), Position::new(-1.0, 0.0, 0.0)])
            .unwrap();
        let devices = engine.create_devices(&stations, &MediumParams::station("ssid")).unwrap();
        let addresses = engine
            .assign_addresses(&devices, Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();

        let window = ProbeWindow::for_horizon(Duration::from_secs(10)).unwrap();
        engine.install_probe(stations[0], addresses[1], &window).unwrap();
        engine.stop_at(Duration::from_secs(10));
        let outcome = engine.run_clock().unwrap();

        assert_eq!(outcome.ended_at, Duration::from_secs(10));
        assert!(!outcome.stopped_early);
        assert_eq!(engine.probe_stats(), ProbeStats { sent: 9, received: 9 });
    }

    #[test]
    fn test_out_of_range_station_loses_echoes() {
        let engine = VirtualEngine::new(20.0, 1.0);
        let routers = line_of_routers(&engine, 10.0, 1);
        engine.create_devices(&routers, &MediumParams::access_point("ssid")).unwrap();

        let stations = engine.create_nodes(2);
        engine
            .install_mobility(&stations, &[Position::new(500.0, 0.0, 0.0), Position::new(1.0, 0.0, 0.0)])
            .unwrap();
        let devices = engine.create_devices(&stations, &MediumParams::station("ssid")).unwrap();
        let addresses = engine
            .assign_addresses(&devices, Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();

        let window = ProbeWindow::for_horizon(Duration::from_secs(4)).unwrap();
        engine.install_probe(stations[0], addresses[1], &window).unwrap();
        engine.stop_at(Duration::from_secs(4));
        engine.run_clock().unwrap();

        assert_eq!(engine.probe_stats(), ProbeStats { sent: 3, received: 0 });
    }

    #[test]
    fn test_route_dump_written() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aodv.routes");
        let engine = VirtualEngine::default();
        let routers = line_of_routers(&engine, 10.0, 2);
        engine.name_node(routers[0], "node-1").unwrap();
        let devices: Vec<DeviceHandle> = vec![DeviceHandle(0), DeviceHandle(1)];
        engine
            .assign_addresses(&devices, Ipv4Addr::new(172, 16, 0, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();

        engine.dump_routes_at(&routers, Duration::from_secs(2), &path).unwrap();
        engine.stop_at(Duration::from_secs(3));
        engine.run_clock().unwrap();

        let table = std::fs::read_to_string(&path).unwrap();
        assert!(table.contains("Node: node-1"));
        assert!(table.contains("172.16.0.2\t1"));
    }

    // One AP with two stations next to it and a probe between them
    fn probed_engine(horizon: Duration) -> VirtualEngine {
        let engine = VirtualEngine::default();
        let routers = line_of_routers(&engine, 10.0, 1);
        engine.create_devices(&routers, &MediumParams::access_point("ssid")).unwrap();

        let stations = engine.create_nodes(2);
        engine
            .install_mobility(&stations, &[Position::new(1.0, 0.0, 0.0), Position::new(-1.0, 0.0, 0.0)])
            .unwrap();
        let devices = engine.create_devices(&stations, &MediumParams::station("ssid")).unwrap();
        let addresses = engine
            .assign_addresses(&devices, Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0))
            .unwrap();

        let window = ProbeWindow::for_horizon(horizon).unwrap();
        engine.install_probe(stations[0], addresses[1], &window).unwrap();
        engine
    }

    #[test]
    fn test_continued_run_replays_echoes() {
        let engine = probed_engine(Duration::from_secs(10));
        engine.stop_at(Duration::from_secs(10));
        engine.run_clock().unwrap();

        engine.stop_at(Duration::from_secs(20));
        let outcome = engine.run_clock().unwrap();

        assert_eq!(outcome.started_at, Duration::from_secs(10));
        assert_eq!(outcome.ended_at, Duration::from_secs(20));
        assert_eq!(engine.probe_stats(), ProbeStats { sent: 18, received: 18 });
    }

    #[test]
    fn test_long_window_runs_to_short_stop() {
        let engine = probed_engine(Duration::from_secs(3_153_600_000));
        engine.stop_at(Duration::from_secs(5));
        let outcome = engine.run_clock().unwrap();

        assert_eq!(outcome.ended_at, Duration::from_secs(5));
        assert_eq!(engine.probe_stats().sent, 4);
    }

    #[test]
    fn test_route_dump_repeats_each_run() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("aodv.routes");
        let engine = VirtualEngine::default();
        let routers = line_of_routers(&engine, 10.0, 2);
        engine.dump_routes_at(&routers, Duration::from_secs(2), &path).unwrap();

        engine.stop_at(Duration::from_secs(3));
        engine.run_clock().unwrap();
        std::fs::remove_file(&path).unwrap();

        engine.stop_at(Duration::from_secs(6));
        engine.run_clock().unwrap();
        let table = std::fs::read_to_string(&path).unwrap();
        assert!(table.contains("Time: +5s"));
    }

    #[test]
    fn test_stop_at_discards_stale_stop_request() {
        let engine = VirtualEngine::new(DEFAULT_RADIO_RANGE, 0.01);
        engine.set_clock_mode(ClockMode::RealTime);
        engine.stop_clock();
        engine.stop_at(Duration::from_secs(5));

        let outcome = engine.run_clock().unwrap();
        assert!(!outcome.stopped_early);
        assert_eq!(outcome.ended_at, Duration::from_secs(5));
    }

    #[test]
    fn test_probe_stats_since() {
        let before = ProbeStats { sent: 4, received: 1 };
        let after = ProbeStats { sent: 9, received: 5 };
        assert_eq!(after.since(before), ProbeStats { sent: 5, received: 4 });
    }

    #[test]
    fn test_reset_clock_rewinds() {
        let engine = VirtualEngine::default();
        engine.stop_at(Duration::from_secs(5));
        engine.run_clock().unwrap();
        assert_eq!(engine.now(), Duration::from_secs(5));
        engine.reset_clock();
        assert_eq!(engine.now(), Duration::ZERO);
    }

    #[test]
    fn test_stop_request_cuts_real_time_run_short() {
        let engine = VirtualEngine::new(DEFAULT_RADIO_RANGE, 1.0);
        engine.set_clock_mode(ClockMode::RealTime);
        engine.stop_at(Duration::from_secs(60));
        engine.stop_clock();

        let outcome = engine.run_clock().unwrap();
        assert!(outcome.stopped_early);
        assert!(outcome.ended_at < Duration::from_secs(60));
    }
}
