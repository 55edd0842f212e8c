use crate::config::ScenarioConfig;
use crate::topology::NodePopulation;
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use log::{info, warn};
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Load and parse configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<ScenarioConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration '{}'", config_path.display()))?;

    let config: ScenarioConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration '{}'", config_path.display()))?;

    if config.backbone.nodes.is_empty() {
        warn!("Configuration lists no backbone nodes; they must be supplied by the caller");
    }

    config.validate()?;

    Ok(config)
}

/// CLI arguments that can override YAML settings
#[derive(Debug, Clone, Default)]
pub struct ScenarioOverrides {
    pub sim_time: Option<Duration>,
    pub use_real_time: Option<bool>,
    pub seed: Option<u64>,
    pub time_scale: Option<f64>,
    pub disable_pcap: bool,
    pub print_routes: bool,
}

/// Apply CLI overrides to a scenario configuration
pub fn apply_overrides(config: &mut ScenarioConfig, overrides: &ScenarioOverrides) -> Result<()> {
    if let Some(sim_time) = overrides.sim_time {
        info!("Overriding sim_time: {:?}", sim_time);
        config.general.sim_time = sim_time;
    }

    if let Some(use_real_time) = overrides.use_real_time {
        info!("Overriding use_real_time: {}", use_real_time);
        config.general.use_real_time = use_real_time;
    }

    if let Some(seed) = overrides.seed {
        config.general.seed = Some(seed);
    }

    if let Some(time_scale) = overrides.time_scale {
        config.engine.time_scale = time_scale;
    }

    if overrides.disable_pcap {
        config.diagnostics.pcap = false;
    }

    if overrides.print_routes {
        config.diagnostics.print_routes = true;
    }

    // Re-validate after applying overrides
    config.validate()?;

    Ok(())
}

/// Backbone population described by the configuration
pub fn backbone_population(config: &ScenarioConfig) -> Result<NodePopulation> {
    if config.backbone.nodes.is_empty() {
        return Err(eyre!("backbone.nodes must list at least one node position"));
    }
    Ok(NodePopulation::from_positions(config.backbone.nodes.iter().copied()))
}
