use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::engine::ClockMode;
use crate::ip::Subnet;
use crate::topology::types::{Position, RegionOfInterest};
use crate::utils::validation::{
    validate_clock_policy, validate_probe_horizon, validate_region, validate_subnet_plan,
    validate_update_script,
};

/// Default number of sampled access-tier nodes
pub const DEFAULT_N_UES: usize = 5;

/// What the clock does when a scenario is run again
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RerunClock {
    /// Each pass advances a further horizon from the current clock
    #[default]
    Continue,
    /// Each pass rewinds the clock to zero first
    Reset,
}

/// Complete scenario configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub backbone: BackboneConfig,
    #[serde(default)]
    pub mobility: MobilityConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

impl ScenarioConfig {
    /// Configuration with defaults for everything but the horizon and clock
    pub fn new(sim_time: Duration, use_real_time: bool) -> Self {
        let mut config = Self::default();
        config.general.sim_time = sim_time;
        config.general.use_real_time = use_real_time;
        config
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_probe_horizon(self.general.sim_time)?;
        validate_region(&self.access.region)?;

        if let Some(level) = &self.general.log_level {
            if level.parse::<log::LevelFilter>().is_err() {
                return Err(ValidationError::InvalidGeneral(format!(
                    "unknown log_level '{}'",
                    level
                )));
            }
        }

        if self.access.n_ues == 0 {
            return Err(ValidationError::InvalidAccess(
                "n_ues must be at least 1".to_string(),
            ));
        }
        if self.access.ssid.is_empty() {
            return Err(ValidationError::InvalidAccess("ssid cannot be empty".to_string()));
        }
        if self.backbone.data_mode.is_empty() {
            return Err(ValidationError::InvalidBackbone(
                "data_mode cannot be empty".to_string(),
            ));
        }

        // Access tier carries one access point per backbone node plus every station
        let backbone_count = self.backbone.nodes.len().max(1);
        validate_subnet_plan(
            &self.access.subnet,
            self.access.n_ues + backbone_count,
            &self.backbone.subnet,
            backbone_count,
        )?;

        validate_clock_policy(self.general.use_real_time, self.rerun_on_update())?;

        if !(self.engine.radio_range.is_finite() && self.engine.radio_range > 0.0) {
            return Err(ValidationError::InvalidEngine(format!(
                "radio_range must be positive, got {}",
                self.engine.radio_range
            )));
        }
        if !(self.engine.time_scale.is_finite() && self.engine.time_scale > 0.0) {
            return Err(ValidationError::InvalidEngine(format!(
                "time_scale must be positive, got {}",
                self.engine.time_scale
            )));
        }

        if !self.backbone.nodes.is_empty() {
            validate_update_script(&self.mobility.updates, self.backbone.nodes.len())?;
        }

        if self.diagnostics.pcap && self.diagnostics.pcap_prefix.is_empty() {
            return Err(ValidationError::InvalidGeneral(
                "pcap_prefix cannot be empty when pcap is enabled".to_string(),
            ));
        }

        Ok(())
    }

    pub fn clock_mode(&self) -> ClockMode {
        if self.general.use_real_time {
            ClockMode::RealTime
        } else {
            ClockMode::Deferred
        }
    }

    /// Whether a mobility update re-runs the scenario; defaults to the
    /// opposite of the real-time flag
    pub fn rerun_on_update(&self) -> bool {
        self.mobility
            .rerun_on_update
            .unwrap_or(!self.general.use_real_time)
    }
}

/// Horizon, clock and randomness settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    #[serde(with = "humantime_serde")]
    pub sim_time: Duration,
    pub use_real_time: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

/// Engine-side diagnostics artifacts
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub pcap: bool,
    pub pcap_prefix: String,
    pub print_routes: bool,
    pub routes_file: PathBuf,
}

/// Access tier: sampled stations and the infrastructure network they join
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AccessConfig {
    pub n_ues: usize,
    pub region: RegionOfInterest,
    pub subnet: Subnet,
    pub ssid: String,
}

/// Backbone tier: mesh nodes and their radio settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct BackboneConfig {
    pub subnet: Subnet,
    pub data_mode: String,
    pub rts_cts_threshold: u32,
    /// Initial backbone placements, used when the caller does not supply them
    pub nodes: Vec<Position>,
}

/// Mobility update behavior
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MobilityConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerun_on_update: Option<bool>,
    pub rerun_clock: RerunClock,
    /// Backbone position sets applied one after another by the CLI
    pub updates: Vec<Vec<Position>>,
}

/// Settings for the in-process engine
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub radio_range: f64,
    pub time_scale: f64,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid general configuration: {0}")]
    InvalidGeneral(String),
    #[error("Invalid access tier configuration: {0}")]
    InvalidAccess(String),
    #[error("Invalid backbone configuration: {0}")]
    InvalidBackbone(String),
    #[error("Invalid addressing configuration: {0}")]
    InvalidAddressing(String),
    #[error("Invalid mobility configuration: {0}")]
    InvalidMobility(String),
    #[error("Invalid engine configuration: {0}")]
    InvalidEngine(String),
}

/// Default implementations
impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            sim_time: Duration::from_secs(10),
            use_real_time: false,
            seed: None,
            log_level: Some("info".to_string()),
        }
    }
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            pcap: true,
            pcap_prefix: "rosns3".to_string(),
            print_routes: false,
            routes_file: PathBuf::from("aodv.routes"),
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            n_ues: DEFAULT_N_UES,
            region: RegionOfInterest::default(),
            subnet: Subnet::access_default(),
            ssid: "wifi-infra".to_string(),
        }
    }
}

impl Default for BackboneConfig {
    fn default() -> Self {
        Self {
            subnet: Subnet::backbone_default(),
            data_mode: "OfdmRate54Mbps".to_string(),
            rts_cts_threshold: 0,
            nodes: Vec::new(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            radio_range: crate::engine::virtual_engine::DEFAULT_RADIO_RANGE,
            time_scale: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_full_config_parsing() {
        let yaml = r#"
general:
  sim_time: "12s"
  use_real_time: false
  seed: 7
diagnostics:
  pcap: false
  print_routes: true
  routes_file: "out.routes"
access:
  n_ues: 8
  region: { mean: [10.0, 20.0], spread: [1.0, 2.0] }
  subnet: { base: "10.1.0.0", mask: "255.255.0.0" }
backbone:
  subnet: { base: "172.16.0.0", mask: "255.255.255.0" }
  nodes:
    - { x: 0.0, y: 0.0 }
    - { x: 40.0, y: 0.0, z: 1.5 }
mobility:
  rerun_clock: reset
  updates:
    - [ { x: 1.0, y: 0.0 }, { x: 41.0, y: 0.0 } ]
engine:
  radio_range: 75.0
"#;

        let config: ScenarioConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.general.sim_time, Duration::from_secs(12));
        assert_eq!(config.general.seed, Some(7));
        assert_eq!(config.access.n_ues, 8);
        assert_eq!(config.access.subnet.base, Ipv4Addr::new(10, 1, 0, 0));
        assert_eq!(config.access.ssid, "wifi-infra");
        assert_eq!(config.backbone.nodes[1].z, 1.5);
        assert_eq!(config.mobility.rerun_clock, RerunClock::Reset);
        assert_eq!(config.engine.time_scale, 1.0);
        assert!(config.rerun_on_update());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: ScenarioConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.general.sim_time, Duration::from_secs(10));
        assert!(config.diagnostics.pcap);
        assert_eq!(config.diagnostics.routes_file, PathBuf::from("aodv.routes"));
        assert_eq!(config.access.n_ues, DEFAULT_N_UES);
        assert_eq!(config.access.subnet, Subnet::access_default());
        assert_eq!(config.backbone.subnet, Subnet::backbone_default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_short_horizon_rejected() {
        let config = ScenarioConfig::new(Duration::from_secs(1), false);
        assert!(matches!(config.validate(), Err(ValidationError::InvalidGeneral(_))));
    }

    #[test]
    fn test_rerun_follows_clock_mode_by_default() {
        let deferred = ScenarioConfig::new(Duration::from_secs(10), false);
        let live = ScenarioConfig::new(Duration::from_secs(10), true);
        assert!(deferred.rerun_on_update());
        assert!(!live.rerun_on_update());
        assert_eq!(live.clock_mode(), ClockMode::RealTime);
    }

    #[test]
    fn test_rerun_with_real_time_rejected() {
        let mut config = ScenarioConfig::new(Duration::from_secs(10), true);
        config.mobility.rerun_on_update = Some(true);
        assert!(matches!(config.validate(), Err(ValidationError::InvalidMobility(_))));
    }

    #[test]
    fn test_overlapping_subnets_rejected() {
        let mut config = ScenarioConfig::new(Duration::from_secs(10), false);
        config.backbone.subnet = Subnet::new(Ipv4Addr::new(10, 0, 0, 128), Ipv4Addr::new(255, 255, 255, 128));
        assert!(matches!(config.validate(), Err(ValidationError::InvalidAddressing(_))));
    }

    #[test]
    fn test_update_script_length_checked() {
        let mut config = ScenarioConfig::new(Duration::from_secs(10), false);
        config.backbone.nodes = vec![Position::default(), Position::default()];
        config.mobility.updates = vec![vec![Position::default()]];
        assert!(matches!(config.validate(), Err(ValidationError::InvalidMobility(_))));
    }

    #[test]
    fn test_bad_engine_settings_rejected() {
        let mut config = ScenarioConfig::new(Duration::from_secs(10), false);
        config.engine.time_scale = 0.0;
        assert!(matches!(config.validate(), Err(ValidationError::InvalidEngine(_))));
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        let mut config = ScenarioConfig::new(Duration::from_secs(10), false);
        config.general.log_level = Some("chatty".to_string());
        assert!(matches!(config.validate(), Err(ValidationError::InvalidGeneral(_))));

        config.general.log_level = Some("debug".to_string());
        assert!(config.validate().is_ok());
    }
}
