//! Scenario coordination.
//!
//! A [`Scenario`] owns one two-tier network instance on an engine. Building
//! it samples the access population, provisions both tiers, installs routing
//! and addresses, and installs the reachability probe; nothing runs until
//! [`Scenario::run`] is called.
//!
//! Mobility updates only move backbone nodes. Whether an update also starts
//! a new pass is the `rerun_on_update` policy, which defaults to re-running
//! on a deferred clock and not on a real-time one.

pub mod controller;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{ScenarioConfig, ValidationError};
use crate::engine::{EngineError, RoutingParams, SimulationEngine};
use crate::ip::{AddressError, AddressMap, AddressPlanner, NetworkTier};
use crate::mobility::{MobilityCoordinator, MobilityError};
use crate::report::{Reporter, RunReport};
use crate::topology::{sample_population, NodePopulation, Topology, TopologyBuilder, TopologyError};
use crate::utils::validation::{validate_population_sizes, validate_subnet_plan};
use crate::workload::{install_reachability_probe, ProbeTarget, ProbeWindow};

pub use controller::{ExecutionController, ExecutionHandle, ExecutionState};

/// Routing tables are dumped this long before the horizon
const ROUTE_DUMP_LEAD: Duration = Duration::from_secs(1);

/// Scenario-level failures
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Topology(#[from] TopologyError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Mobility(#[from] MobilityError),
    #[error("A real-time pass is still running")]
    RunInProgress,
    #[error("The scenario has been torn down")]
    TornDown,
    #[error("The background clock thread panicked")]
    BackgroundPanicked,
    #[error("Failed to spawn the background clock thread: {0}")]
    Spawn(std::io::Error),
    #[error("Reporter failed: {0}")]
    Report(std::io::Error),
}

/// One provisioned two-tier network scenario
pub struct Scenario {
    config: ScenarioConfig,
    engine: Arc<dyn SimulationEngine>,
    access: NodePopulation,
    topology: Topology,
    access_addresses: AddressMap,
    backbone_addresses: AddressMap,
    probe: ProbeTarget,
    mobility: MobilityCoordinator,
    controller: ExecutionController,
    torn_down: bool,
}

impl Scenario {
    /// Build a scenario, seeding the access sampler from `general.seed` or,
    /// when absent, from OS entropy
    pub fn new(
        backbone: NodePopulation,
        config: ScenarioConfig,
        engine: Arc<dyn SimulationEngine>,
    ) -> Result<Self, ScenarioError> {
        let mut rng = match config.general.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(backbone, config, engine, &mut rng)
    }

    /// Build a scenario drawing access placements from `rng`
    pub fn with_rng<R: Rng + ?Sized>(
        backbone: NodePopulation,
        config: ScenarioConfig,
        engine: Arc<dyn SimulationEngine>,
        rng: &mut R,
    ) -> Result<Self, ScenarioError> {
        config.validate()?;
        let n_nodes = backbone.len();
        let n_ues = config.access.n_ues;
        validate_population_sizes(n_nodes, n_ues)?;
        validate_subnet_plan(&config.access.subnet, n_nodes + n_ues, &config.backbone.subnet, n_nodes)?;
        let window = ProbeWindow::for_horizon(config.general.sim_time)?;

        engine.set_clock_mode(config.clock_mode());

        let access = sample_population(&config.access.region, n_ues, rng)?;
        let topology = TopologyBuilder::new(engine.as_ref(), &config).build(&backbone, &access)?;
        info!("Created {} backbone and {} access nodes", n_nodes, n_ues);

        engine.install_routing(&topology.backbone, &RoutingParams::default())?;
        let mut planner = AddressPlanner::new();
        let access_addresses = planner.assign(
            engine.as_ref(),
            NetworkTier::Access,
            config.access.subnet,
            &topology.access_devices(),
        )?;
        let backbone_addresses = planner.assign(
            engine.as_ref(),
            NetworkTier::Backbone,
            config.backbone.subnet,
            &topology.mesh_devices,
        )?;

        if config.diagnostics.print_routes {
            let at = config.general.sim_time.saturating_sub(ROUTE_DUMP_LEAD);
            engine.dump_routes_at(&topology.backbone, at, &config.diagnostics.routes_file)?;
            debug!("Scheduled routing table dump at {:?}", at);
        }
        debug!("Installed AODV internet stack.");

        let source = topology.stations[0];
        let probe = install_reachability_probe(engine.as_ref(), source, &access_addresses, window)?;

        let mobility = MobilityCoordinator::new(topology.backbone.clone(), backbone);
        let controller = ExecutionController::new(
            Arc::clone(&engine),
            topology.backbone.clone(),
            config.general.sim_time,
            config.clock_mode(),
            config.mobility.rerun_clock,
        );

        Ok(Self {
            config,
            engine,
            access,
            topology,
            access_addresses,
            backbone_addresses,
            probe,
            mobility,
            controller,
            torn_down: false,
        })
    }

    /// Replace the completion hook invoked at the end of every pass
    pub fn set_reporter(&mut self, reporter: Arc<dyn Reporter>) {
        self.controller.set_reporter(reporter);
    }

    /// Execute a fresh pass over the current topology state.
    ///
    /// Blocks on a deferred clock and returns the pass summary; on a
    /// real-time clock it returns `None` immediately while the pass runs in
    /// the background.
    pub fn run(&mut self) -> Result<Option<RunReport>, ScenarioError> {
        self.ensure_live()?;
        self.controller.run()
    }

    /// Move the backbone nodes to `new_positions`, one-to-one by index.
    ///
    /// With `rerun_on_update` the scenario is re-run synchronously and the
    /// new pass summary is returned.
    pub fn apply_mobility_update(
        &mut self,
        new_positions: NodePopulation,
    ) -> Result<Option<RunReport>, ScenarioError> {
        self.ensure_live()?;
        self.mobility.apply_update(self.engine.as_ref(), new_positions)?;

        if self.config.rerun_on_update() {
            debug!("Simulating with the updated mobility model.");
            return self.controller.run();
        }
        debug!("Applied mobility update to the live model.");
        Ok(None)
    }

    /// Wait for a background pass to finish
    pub fn join(&mut self) -> Result<Option<RunReport>, ScenarioError> {
        self.controller.join()
    }

    /// Ask a background pass to stop early
    pub fn request_stop(&self) {
        self.controller.request_stop();
    }

    /// Join any background pass and refuse further runs and updates
    pub fn teardown(&mut self) -> Result<Option<RunReport>, ScenarioError> {
        if self.torn_down {
            return Ok(None);
        }
        self.torn_down = true;
        info!("Tearing down scenario after {} passes", self.controller.passes());
        self.controller.join()
    }

    fn ensure_live(&self) -> Result<(), ScenarioError> {
        if self.torn_down {
            return Err(ScenarioError::TornDown);
        }
        Ok(())
    }

    pub fn config(&self) -> &ScenarioConfig {
        &self.config
    }

    pub fn state(&self) -> ExecutionState {
        self.controller.state()
    }

    pub fn passes(&self) -> u32 {
        self.controller.passes()
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.controller.last_report()
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Sampled access-tier placements
    pub fn access_population(&self) -> &NodePopulation {
        &self.access
    }

    /// Current backbone placements
    pub fn backbone_positions(&self) -> &NodePopulation {
        self.mobility.positions()
    }

    pub fn access_addresses(&self) -> &AddressMap {
        &self.access_addresses
    }

    pub fn backbone_addresses(&self) -> &AddressMap {
        &self.backbone_addresses
    }

    pub fn probe(&self) -> &ProbeTarget {
        &self.probe
    }
}

impl Drop for Scenario {
    fn drop(&mut self) {
        if self.controller.is_running() {
            warn!("Scenario dropped during a real-time pass; stopping the clock");
            self.controller.request_stop();
        }
        if let Err(e) = self.controller.join() {
            warn!("Background pass ended with an error: {}", e);
        }
    }
}
