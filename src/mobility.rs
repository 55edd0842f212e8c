//! Backbone mobility coordination.
//!
//! Only backbone positions change after construction. Station positions are
//! installed once by the topology builder and never pass through here.

use log::debug;

use crate::engine::{EngineError, NodeHandle, SimulationEngine};
use crate::topology::types::NodePopulation;

#[derive(Debug, thiserror::Error)]
pub enum MobilityError {
    #[error("Mobility update has {got} positions but the backbone has {expected} nodes")]
    LengthMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Sole writer of backbone position data after construction
#[derive(Debug, Clone)]
pub struct MobilityCoordinator {
    backbone: Vec<NodeHandle>,
    positions: NodePopulation,
    updates_applied: usize,
}

impl MobilityCoordinator {
    /// Track `backbone` nodes whose initial placements are `positions`
    pub fn new(backbone: Vec<NodeHandle>, positions: NodePopulation) -> Self {
        Self {
            backbone,
            positions,
            updates_applied: 0,
        }
    }

    /// Current record of backbone placements
    pub fn positions(&self) -> &NodePopulation {
        &self.positions
    }

    pub fn updates_applied(&self) -> usize {
        self.updates_applied
    }

    /// Overwrite the backbone placements and push them into the engine,
    /// one-to-one by index.
    ///
    /// A length mismatch is rejected before anything is written.
    pub fn apply_update(
        &mut self,
        engine: &dyn SimulationEngine,
        new_positions: NodePopulation,
    ) -> Result<(), MobilityError> {
        if new_positions.len() != self.backbone.len() {
            return Err(MobilityError::LengthMismatch {
                expected: self.backbone.len(),
                got: new_positions.len(),
            });
        }

        for (node, placement) in self.backbone.iter().zip(new_positions.iter()) {
            engine.set_position(*node, placement.position)?;
        }
        self.positions = new_positions;
        self.updates_applied += 1;

        debug!(
            "Applied mobility update {} to {} backbone nodes",
            self.updates_applied,
            self.backbone.len()
        );
        Ok(())
    }
}
