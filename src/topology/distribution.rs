//! Access-tier placement sampling.
//!
//! Access-tier ("user") nodes are placed by drawing independent normal
//! samples around a region of interest:
//!
//! - **x** ~ N(mean.x, spread.x)
//! - **y** ~ N(mean.y, spread.y)
//! - **z** = 0
//!
//! No rejection or clamping is applied; negative coordinates and points far
//! outside any physical area are kept as drawn. The random source is a
//! parameter so callers can seed it; only the outermost composition point
//! should fall back to OS entropy.

use log::{debug, info};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::types::{MobileNode, NodePopulation, Position, RegionOfInterest};
use crate::config::ValidationError;

/// Sample `count` access-tier placements around `region`.
///
/// # Arguments
///
/// * `region` - Center and per-axis spread of the distribution
/// * `count` - Number of placements to draw
/// * `rng` - Source of randomness
///
/// # Returns
///
/// * A population of `count` nodes with sequential ids starting at 0
/// * `ValidationError::InvalidAccess` if a spread is negative or not finite
pub fn sample_population<R: Rng + ?Sized>(
    region: &RegionOfInterest,
    count: usize,
    rng: &mut R,
) -> Result<NodePopulation, ValidationError> {
    let x_axis = axis_distribution(region.mean[0], region.spread[0])?;
    let y_axis = axis_distribution(region.mean[1], region.spread[1])?;

    let nodes: Vec<MobileNode> = (0..count)
        .map(|id| {
            let position = Position::new(x_axis.sample(rng), y_axis.sample(rng), 0.0);
            debug!("Sampled access node {} at ({:.2}, {:.2})", id, position.x, position.y);
            MobileNode { position, id }
        })
        .collect();

    info!(
        "Sampled {} access nodes around ({}, {}) with spread ({}, {})",
        count, region.mean[0], region.mean[1], region.spread[0], region.spread[1]
    );
    Ok(NodePopulation::new(nodes))
}

fn axis_distribution(mean: f64, spread: f64) -> Result<Normal<f64>, ValidationError> {
    if !mean.is_finite() {
        return Err(ValidationError::InvalidAccess(format!(
            "region mean must be finite, got {}",
            mean
        )));
    }
    Normal::new(mean, spread).map_err(|e| {
        ValidationError::InvalidAccess(format!("invalid region spread {}: {}", spread, e))
    })
}
