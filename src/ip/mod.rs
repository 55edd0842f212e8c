//! IP address planning module.
//!
//! This module assigns the two disjoint address ranges of a scenario: one
//! for the access tier (stations and access points) and one for the
//! backbone tier (mesh interfaces).

pub mod allocator;
pub mod registry;

// Re-export commonly used types
pub use allocator::{AddressError, AddressPlanner};
pub use registry::{AddressMap, NetworkTier, Subnet};
