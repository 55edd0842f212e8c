use clap::{Parser, ValueEnum};
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use meshsim::config_loader::{self, ScenarioOverrides};
use meshsim::engine::{ClockMode, VirtualEngine};
use meshsim::report::{JsonReporter, NoopReporter, Reporter, TextReporter};
use meshsim::scenario::Scenario;
use meshsim::topology::NodePopulation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    None,
    Text,
    Json,
}

/// Two-tier mobile mesh/access network scenario runner
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the scenario configuration YAML file
    #[arg(short, long)]
    config: PathBuf,

    /// Simulation horizon in seconds
    #[arg(long, value_parser = parse_seconds)]
    sim_time: Option<Duration>,

    /// Run the clock in real time on a background thread
    #[arg(long)]
    real_time: bool,

    /// Seed for access-tier sampling
    #[arg(long)]
    seed: Option<u64>,

    /// Wall seconds per simulated second in real-time mode
    #[arg(long)]
    time_scale: Option<f64>,

    /// How each completed pass is reported on stdout
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    report: ReportFormat,

    /// Disable packet capture on the backbone devices
    #[arg(long)]
    no_pcap: bool,

    /// Dump backbone routing tables one second before the horizon
    #[arg(long)]
    print_routes: bool,
}

impl Args {
    fn overrides(&self) -> ScenarioOverrides {
        ScenarioOverrides {
            sim_time: self.sim_time,
            use_real_time: self.real_time.then_some(true),
            seed: self.seed,
            time_scale: self.time_scale,
            disable_pcap: self.no_pcap,
            print_routes: self.print_routes,
        }
    }

    fn reporter(&self) -> Arc<dyn Reporter> {
        match self.report {
            ReportFormat::None => Arc::new(NoopReporter),
            ReportFormat::Text => Arc::new(TextReporter),
            ReportFormat::Json => Arc::new(JsonReporter),
        }
    }
}

fn parse_seconds(value: &str) -> std::result::Result<Duration, String> {
    let seconds: f64 = value
        .parse()
        .map_err(|e| format!("invalid number of seconds '{}': {}", value, e))?;
    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration '{}': {}", value, e))
}

fn config_log_level(level: &Option<String>) -> Option<LevelFilter> {
    level.as_deref().and_then(|level| level.parse().ok())
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging at "info"; general.log_level adjusts it once loaded
    // unless RUST_LOG is set
    let env_filter = std::env::var_os("RUST_LOG").is_some();
    env_logger::Builder::from_env(Env::default().default_filter_or("trace")).init();
    if !env_filter {
        log::set_max_level(LevelFilter::Info);
    }

    info!("Starting MeshSim scenario runner");
    info!("Configuration file: {:?}", args.config);

    let mut config = config_loader::load_config(&args.config)?;
    config_loader::apply_overrides(&mut config, &args.overrides())?;

    if !env_filter {
        if let Some(level) = config_log_level(&config.general.log_level) {
            log::set_max_level(level);
        }
    }
    let backbone = config_loader::backbone_population(&config)?;

    let engine = Arc::new(VirtualEngine::new(
        config.engine.radio_range,
        config.engine.time_scale,
    ));
    let mut scenario = Scenario::new(backbone, config.clone(), engine)
        .wrap_err("Failed to build scenario")?;
    scenario.set_reporter(args.reporter());

    info!(
        "Scenario ready: {} backbone nodes ({}), {} access nodes ({})",
        scenario.topology().backbone.len(),
        scenario.backbone_addresses().subnet(),
        scenario.topology().stations.len(),
        scenario.access_addresses().subnet()
    );

    scenario.run().wrap_err("Simulation pass failed")?;

    // On a live clock, spread scripted updates across the horizon
    let updates = &config.mobility.updates;
    let spacing = match config.clock_mode() {
        ClockMode::RealTime => config
            .general
            .sim_time
            .mul_f64(config.engine.time_scale)
            .div_f64((updates.len() + 1) as f64),
        ClockMode::Deferred => Duration::ZERO,
    };

    for (index, update) in updates.iter().enumerate() {
        if !spacing.is_zero() {
            thread::sleep(spacing);
        }
        info!("Applying mobility update {} of {}", index + 1, updates.len());
        scenario
            .apply_mobility_update(NodePopulation::from_positions(update.iter().copied()))
            .wrap_err_with(|| format!("Mobility update {} failed", index + 1))?;
    }

    scenario.teardown().wrap_err("Background pass failed")?;
    info!("Simulation finished after {} passes", scenario.passes());
    Ok(())
}
