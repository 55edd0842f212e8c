//! # MeshSim - Two-tier mobile wireless network scenario coordinator
//!
//! This library coordinates a simulated two-tier wireless network: a
//! backbone of mesh nodes running reactive (AODV) routing, and an access
//! tier of mobile stations associating with access points collocated on the
//! backbone nodes.
//!
//! ## Overview
//!
//! A scenario provisions both node populations, puts each tier on its own
//! IPv4 subnet, installs static positions and a reachability probe, then
//! drives simulated time either synchronously or on a real-time clock in a
//! background thread. Backbone positions can be updated while the scenario
//! lives; on a deferred clock every update re-runs the scenario.
//!
//! Radio propagation, MAC/PHY behavior, routing internals and the event
//! scheduler belong to the simulation engine, reached through the
//! [`engine::SimulationEngine`] trait. [`engine::VirtualEngine`] is the
//! in-process implementation.
//!
//! ## Architecture
//!
//! - `config`: Scenario configuration structures and validation
//! - `config_loader`: YAML loading and CLI overrides
//! - `topology`: Placement model, access-tier sampling, topology builder
//! - `ip`: Tier address planning
//! - `mobility`: Backbone position updates
//! - `workload`: Reachability probe installation
//! - `scenario`: Scenario construction and the execution controller
//! - `engine`: Engine capabilities and the in-process engine
//! - `report`: Completion reporting hooks
//! - `utils`: Validation and IPv4 helpers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use meshsim::config::ScenarioConfig;
//! use meshsim::engine::VirtualEngine;
//! use meshsim::scenario::Scenario;
//! use meshsim::topology::{NodePopulation, Position};
//!
//! let backbone = NodePopulation::from_positions(vec![
//!     Position::new(0.0, 0.0, 0.0),
//!     Position::new(40.0, 0.0, 0.0),
//! ]);
//! let config = ScenarioConfig::new(Duration::from_secs(10), false);
//! let mut scenario = Scenario::new(backbone, config, Arc::new(VirtualEngine::default()))?;
//!
//! let report = scenario.run()?;
//! println!("{:?}", report);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Error Handling
//!
//! Library components return `thiserror` enums that roll up into
//! [`scenario::ScenarioError`]. The loader and binary use `color_eyre` for
//! error reporting with context.

pub mod config;
pub mod config_loader;
pub mod engine;
pub mod ip;
pub mod mobility;
pub mod report;
pub mod scenario;
pub mod topology;
pub mod utils;
pub mod workload;
