//! Shared utilities: validation and IPv4 helpers.

pub mod ip_utils;
pub mod validation;

pub use validation::{
    validate_clock_policy, validate_population_sizes, validate_probe_horizon, validate_region,
    validate_subnet_plan, validate_update_script,
};
