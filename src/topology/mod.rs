//! Network topology module.
//!
//! This module contains the placement data model, access-tier sampling and
//! the two-tier topology builder.

pub mod builder;
pub mod distribution;
pub mod types;

// Re-export key types and functions for easier access
pub use builder::{backbone_label, Topology, TopologyBuilder, TopologyError};
pub use distribution::sample_population;
pub use types::{MobileNode, NodePopulation, Position, RegionOfInterest};
