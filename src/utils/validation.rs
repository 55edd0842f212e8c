//! Configuration validation utilities.
//!
//! This module provides the precondition checks run before a scenario
//! touches the engine. Every failure here is fatal: a scenario that fails
//! validation is never left runnable.

use std::time::Duration;

use crate::config::ValidationError;
use crate::ip::Subnet;
use crate::topology::types::{Position, RegionOfInterest};
use crate::workload::ProbeWindow;

/// Validate that the horizon leaves a non-empty probe window
///
/// # Examples
/// ```
/// use meshsim::utils::validation::validate_probe_horizon;
/// use std::time::Duration;
///
/// assert!(validate_probe_horizon(Duration::from_secs(10)).is_ok());
/// assert!(validate_probe_horizon(Duration::from_secs(1)).is_err());
/// ```
pub fn validate_probe_horizon(sim_time: Duration) -> Result<(), ValidationError> {
    ProbeWindow::for_horizon(sim_time).map(|_| ())
}

/// Validate region-of-interest parameters
pub fn validate_region(region: &RegionOfInterest) -> Result<(), ValidationError> {
    if region.mean.iter().any(|m| !m.is_finite()) {
        return Err(ValidationError::InvalidAccess(format!(
            "region mean must be finite, got {:?}",
            region.mean
        )));
    }
    if region.spread.iter().any(|s| !s.is_finite() || *s < 0.0) {
        return Err(ValidationError::InvalidAccess(format!(
            "region spread must be finite and non-negative, got {:?}",
            region.spread
        )));
    }
    Ok(())
}

/// Validate population sizes
///
/// Checks that there is at least one backbone node and one access node.
/// The probe needs a first station to send from.
pub fn validate_population_sizes(n_nodes: usize, n_ues: usize) -> Result<(), ValidationError> {
    if n_nodes == 0 {
        return Err(ValidationError::InvalidBackbone(
            "at least one backbone node is required".to_string(),
        ));
    }
    if n_ues == 0 {
        return Err(ValidationError::InvalidAccess(
            "at least one access node is required".to_string(),
        ));
    }
    Ok(())
}

/// Validate the two tier blocks against each other and the device counts
///
/// Checks for:
/// - Contiguous netmasks
/// - Disjoint blocks
/// - Enough host addresses in each block
pub fn validate_subnet_plan(
    access: &Subnet,
    access_devices: usize,
    backbone: &Subnet,
    backbone_devices: usize,
) -> Result<(), ValidationError> {
    for (tier, subnet, needed) in [
        ("access", access, access_devices),
        ("backbone", backbone, backbone_devices),
    ] {
        subnet.prefix_len().map_err(|e| {
            ValidationError::InvalidAddressing(format!("{} tier: {}", tier, e))
        })?;
        if needed as u64 > subnet.capacity() {
            return Err(ValidationError::InvalidAddressing(format!(
                "{} tier block {} holds {} hosts but {} devices need addresses",
                tier,
                subnet,
                subnet.capacity(),
                needed
            )));
        }
    }

    if access.overlaps(backbone) {
        return Err(ValidationError::InvalidAddressing(format!(
            "access block {} overlaps backbone block {}",
            access, backbone
        )));
    }

    log::debug!("Address plan: access {} ({} devices), backbone {} ({} devices)",
                access, access_devices, backbone, backbone_devices);
    Ok(())
}

/// Validate the clock / mobility re-run combination.
///
/// Re-running on every update needs the previous pass finished, which a
/// live real-time clock cannot guarantee.
pub fn validate_clock_policy(use_real_time: bool, rerun_on_update: bool) -> Result<(), ValidationError> {
    if use_real_time && rerun_on_update {
        return Err(ValidationError::InvalidMobility(
            "rerun_on_update cannot be combined with a real-time clock".to_string(),
        ));
    }
    Ok(())
}

/// Validate scripted mobility updates against the backbone size
pub fn validate_update_script(updates: &[Vec<Position>], n_nodes: usize) -> Result<(), ValidationError> {
    for (index, update) in updates.iter().enumerate() {
        if update.len() != n_nodes {
            return Err(ValidationError::InvalidMobility(format!(
                "update {} has {} positions but the backbone has {} nodes",
                index,
                update.len(),
                n_nodes
            )));
        }
        if update.iter().any(|p| !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite())) {
            return Err(ValidationError::InvalidMobility(format!(
                "update {} contains a non-finite coordinate",
                index
            )));
        }
    }
    Ok(())
}
