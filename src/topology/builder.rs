//! Two-tier topology construction.
//!
//! The backbone is a set of named mesh nodes. The access tier is a star
//! network layered over the same backbone nodes: every backbone node also
//! carries an access point, and every sampled station associates with one
//! of them under a shared network identifier.

use log::{debug, info};

use super::types::NodePopulation;
use crate::config::{ScenarioConfig, ValidationError};
use crate::engine::{DeviceHandle, EngineError, MediumParams, NodeHandle, SimulationEngine};
use crate::utils::validation::validate_population_sizes;

/// Engine handles for everything the builder provisioned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    /// Backbone nodes, index-aligned with the backbone population
    pub backbone: Vec<NodeHandle>,
    /// Labels bound to the backbone nodes, `node-1` upward
    pub names: Vec<String>,
    /// Access-tier station nodes, index-aligned with the access population
    pub stations: Vec<NodeHandle>,
    pub station_devices: Vec<DeviceHandle>,
    /// One access point per backbone node
    pub ap_devices: Vec<DeviceHandle>,
    /// One mesh interface per backbone node
    pub mesh_devices: Vec<DeviceHandle>,
}

impl Topology {
    /// Access-tier devices in address assignment order: access points, then stations
    pub fn access_devices(&self) -> Vec<DeviceHandle> {
        self.ap_devices
            .iter()
            .chain(self.station_devices.iter())
            .copied()
            .collect()
    }
}

/// Label for the backbone node at `index`
pub fn backbone_label(index: usize) -> String {
    format!("node-{}", index + 1)
}

/// Provisions both tiers on an engine
pub struct TopologyBuilder<'a> {
    engine: &'a dyn SimulationEngine,
    config: &'a ScenarioConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum TopologyError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl<'a> TopologyBuilder<'a> {
    pub fn new(engine: &'a dyn SimulationEngine, config: &'a ScenarioConfig) -> Self {
        Self { engine, config }
    }

    /// Provision backbone nodes, access devices and static positions
    pub fn build(
        &self,
        backbone: &NodePopulation,
        access: &NodePopulation,
    ) -> Result<Topology, TopologyError> {
        validate_population_sizes(backbone.len(), access.len())?;

        let (backbone_nodes, names) = self.create_backbone_nodes(backbone.len())?;
        let (stations, station_devices, ap_devices) =
            self.create_access_tier(&backbone_nodes, access.len())?;

        self.engine.install_mobility(&backbone_nodes, &backbone.positions())?;
        self.engine.install_mobility(&stations, &access.positions())?;
        debug!("Installed static positions for {} backbone and {} access nodes",
               backbone_nodes.len(), stations.len());

        let mesh_devices = self.create_backbone_devices(&backbone_nodes)?;

        Ok(Topology {
            backbone: backbone_nodes,
            names,
            stations,
            station_devices,
            ap_devices,
            mesh_devices,
        })
    }

    fn create_backbone_nodes(
        &self,
        count: usize,
    ) -> Result<(Vec<NodeHandle>, Vec<String>), TopologyError> {
        let nodes = self.engine.create_nodes(count);
        let mut names = Vec::with_capacity(count);
        for (index, node) in nodes.iter().enumerate() {
            let label = backbone_label(index);
            self.engine.name_node(*node, &label)?;
            names.push(label);
        }
        info!("Created {} backbone nodes", nodes.len());
        Ok((nodes, names))
    }

    // Stations plus one collocated access point per backbone node
    fn create_access_tier(
        &self,
        backbone: &[NodeHandle],
        n_stations: usize,
    ) -> Result<(Vec<NodeHandle>, Vec<DeviceHandle>, Vec<DeviceHandle>), TopologyError> {
        let ssid = &self.config.access.ssid;
        let stations = self.engine.create_nodes(n_stations);
        let station_devices = self
            .engine
            .create_devices(&stations, &MediumParams::station(ssid))?;
        let ap_devices = self
            .engine
            .create_devices(backbone, &MediumParams::access_point(ssid))?;

        info!(
            "Created {} stations and {} access points on '{}'",
            station_devices.len(),
            ap_devices.len(),
            ssid
        );
        Ok((stations, station_devices, ap_devices))
    }

    fn create_backbone_devices(&self, backbone: &[NodeHandle]) -> Result<Vec<DeviceHandle>, TopologyError> {
        let medium = MediumParams::mesh(
            &self.config.backbone.data_mode,
            self.config.backbone.rts_cts_threshold,
        );
        let devices = self.engine.create_devices(backbone, &medium)?;

        if self.config.diagnostics.pcap {
            debug!("Enabled packet capturing.");
            self.engine
                .enable_capture(&devices, &self.config.diagnostics.pcap_prefix)?;
        }
        info!("Installed {} mesh devices", devices.len());
        Ok(devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MediumRole, VirtualEngine};
    use crate::topology::types::Position;
    use proptest::prelude::*;
    use std::collections::HashSet;
    use std::time::Duration;

    fn population(count: usize) -> NodePopulation {
        NodePopulation::from_positions((0..count).map(|i| Position::new(i as f64 * 10.0, 0.0, 0.0)))
    }

    #[test]
    fn test_build_three_by_five() {
        let engine = VirtualEngine::default();
        let config = ScenarioConfig::new(Duration::from_secs(10), false);
        let topology = TopologyBuilder::new(&engine, &config)
            .build(&population(3), &population(5))
            .unwrap();

        assert_eq!(topology.backbone.len(), 3);
        assert_eq!(topology.names, vec!["node-1", "node-2", "node-3"]);
        assert_eq!(topology.stations.len(), 5);
        assert_eq!(topology.access_devices().len(), 8);
        assert_eq!(engine.device_count(MediumRole::AccessPoint), 3);
        assert_eq!(engine.device_count(MediumRole::Station), 5);
        assert_eq!(engine.device_count(MediumRole::Mesh), 3);
        assert_eq!(engine.find_node("node-2"), Some(topology.backbone[1]));
        assert_eq!(engine.capture_files().len(), 3);
    }

    #[test]
    fn test_positions_mirror_populations() {
        let engine = VirtualEngine::default();
        let config = ScenarioConfig::new(Duration::from_secs(10), false);
        let access = NodePopulation::from_positions(vec![Position::new(-4.0, 2.5, 0.0)]);
        let topology = TopologyBuilder::new(&engine, &config)
            .build(&population(2), &access)
            .unwrap();

        assert_eq!(engine.position(topology.backbone[1]), Some(Position::new(10.0, 0.0, 0.0)));
        assert_eq!(engine.position(topology.stations[0]), Some(Position::new(-4.0, 2.5, 0.0)));
    }

    #[test]
    fn test_empty_backbone_fails_fast() {
        let engine = VirtualEngine::default();
        let config = ScenarioConfig::new(Duration::from_secs(10), false);
        let result = TopologyBuilder::new(&engine, &config).build(&population(0), &population(5));
        assert!(matches!(result, Err(TopologyError::Validation(_))));
        assert_eq!(engine.node_count(), 0);
    }

    #[test]
    fn test_capture_disabled() {
        let engine = VirtualEngine::default();
        let mut config = ScenarioConfig::new(Duration::from_secs(10), false);
        config.diagnostics.pcap = false;
        TopologyBuilder::new(&engine, &config)
            .build(&population(2), &population(2))
            .unwrap();
        assert!(engine.capture_files().is_empty());
    }

    proptest! {
        #[test]
        fn prop_backbone_names_distinct(count in 1usize..64) {
            let engine = VirtualEngine::default();
            let config = ScenarioConfig::new(Duration::from_secs(10), false);
            let topology = TopologyBuilder::new(&engine, &config)
                .build(&population(count), &population(1))
                .unwrap();

            let names: HashSet<&String> = topology.names.iter().collect();
            prop_assert_eq!(topology.names.len(), count);
            prop_assert_eq!(names.len(), count);
        }
    }
}
