//! Placement data model.
//!
//! This file contains the types describing where simulated nodes sit:
//! positions, per-node placement directives, ordered populations and the
//! region-of-interest parameters used to sample the access tier.

use serde::{Deserialize, Serialize};

/// A point in simulation space, in meters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

impl Position {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to another position
    pub fn distance(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Placement directive for one simulated node
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MobileNode {
    pub position: Position,
    pub id: usize,
}

/// Ordered collection of placement directives.
///
/// Indices are the only link between a population entry and the engine node
/// it describes; ids are informational.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodePopulation {
    nodes: Vec<MobileNode>,
}

impl NodePopulation {
    pub fn new(nodes: Vec<MobileNode>) -> Self {
        Self { nodes }
    }

    /// Build a population from bare positions, numbering ids from 0
    pub fn from_positions<I>(positions: I) -> Self
    where
        I: IntoIterator<Item = Position>,
    {
        let nodes = positions
            .into_iter()
            .enumerate()
            .map(|(id, position)| MobileNode { position, id })
            .collect();
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&MobileNode> {
        self.nodes.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MobileNode> {
        self.nodes.iter()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.nodes.iter().map(|node| node.position).collect()
    }
}

impl<'a> IntoIterator for &'a NodePopulation {
    type Item = &'a MobileNode;
    type IntoIter = std::slice::Iter<'a, MobileNode>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Spatial distribution parameters for access-tier placement.
///
/// `mean` is the region center and `spread` the per-axis standard deviation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    pub mean: [f64; 2],
    pub spread: [f64; 2],
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self {
            mean: [0.0, 0.0],
            spread: [5.0, 15.0],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_positions_numbers_ids() {
        let population = NodePopulation::from_positions(vec![
            Position::new(1.0, 2.0, 0.0),
            Position::new(3.0, 4.0, 0.0),
        ]);
        assert_eq!(population.len(), 2);
        assert_eq!(population.get(0).unwrap().id, 0);
        assert_eq!(population.get(1).unwrap().id, 1);
        assert_eq!(population.get(1).unwrap().position.y, 4.0);
    }

    #[test]
    fn test_distance() {
        let a = Position::new(0.0, 0.0, 0.0);
        let b = Position::new(3.0, 4.0, 0.0);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_population_yaml_is_a_plain_list() {
        let yaml = r#"
- position: { x: 1.0, y: 2.0 }
  id: 0
"#;
        let population: NodePopulation = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(population.len(), 1);
        assert_eq!(population.get(0).unwrap().position.z, 0.0);
    }
}
