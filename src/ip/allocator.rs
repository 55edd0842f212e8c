//! Tier address planning.
//!
//! The planner hands each tier its block exactly once, access tier first and
//! backbone tier second, and refuses blocks that overlap an earlier tier or
//! are too small for the devices. Address numbering inside a block is left
//! to the engine.

use log::info;

use super::registry::{AddressMap, NetworkTier, Subnet};
use crate::engine::{DeviceHandle, EngineError, SimulationEngine};

/// Address planning failures; all are fatal misconfigurations
#[derive(Debug, thiserror::Error)]
pub enum AddressError {
    #[error("The {0} tier has already been assigned addresses")]
    TierAlreadyAssigned(NetworkTier),
    #[error("The {tier} tier must be assigned after the {missing} tier")]
    OutOfOrder {
        tier: NetworkTier,
        missing: NetworkTier,
    },
    #[error("The {tier} block {subnet} overlaps the {other} block {other_subnet}")]
    Overlap {
        tier: NetworkTier,
        subnet: Subnet,
        other: NetworkTier,
        other_subnet: Subnet,
    },
    #[error("The {tier} block {subnet} holds {capacity} hosts but {needed} devices need addresses")]
    Exhausted {
        tier: NetworkTier,
        subnet: Subnet,
        capacity: u64,
        needed: usize,
    },
    #[error("Invalid netmask for the {tier} tier: {reason}")]
    InvalidMask { tier: NetworkTier, reason: String },
    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Assigns the two tier address ranges of one scenario
#[derive(Debug, Default)]
pub struct AddressPlanner {
    assigned: Vec<(NetworkTier, Subnet)>,
}

impl AddressPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `subnet` could be assigned to `tier` for `needed` devices
    /// without touching the engine
    pub fn check(&self, tier: NetworkTier, subnet: Subnet, needed: usize) -> Result<(), AddressError> {
        if self.assigned.iter().any(|(t, _)| *t == tier) {
            return Err(AddressError::TierAlreadyAssigned(tier));
        }
        let position = NetworkTier::ORDER.iter().position(|t| *t == tier).unwrap_or(0);
        for earlier in &NetworkTier::ORDER[..position] {
            if !self.assigned.iter().any(|(t, _)| t == earlier) {
                return Err(AddressError::OutOfOrder {
                    tier,
                    missing: *earlier,
                });
            }
        }

        subnet
            .prefix_len()
            .map_err(|reason| AddressError::InvalidMask { tier, reason })?;

        if let Some((other, other_subnet)) = self.assigned.iter().find(|(_, s)| s.overlaps(&subnet)) {
            return Err(AddressError::Overlap {
                tier,
                subnet,
                other: *other,
                other_subnet: *other_subnet,
            });
        }

        let capacity = subnet.capacity();
        if needed as u64 > capacity {
            return Err(AddressError::Exhausted {
                tier,
                subnet,
                capacity,
                needed,
            });
        }
        Ok(())
    }

    /// Assign `subnet` to the devices of `tier`.
    ///
    /// # Arguments
    /// * `engine` - Engine that numbers the devices
    /// * `tier` - Which tier the devices belong to
    /// * `subnet` - Block to draw addresses from
    /// * `devices` - Devices in the order addresses should be handed out
    ///
    /// # Returns
    /// * The device index to address mapping for this tier
    pub fn assign(
        &mut self,
        engine: &dyn SimulationEngine,
        tier: NetworkTier,
        subnet: Subnet,
        devices: &[DeviceHandle],
    ) -> Result<AddressMap, AddressError> {
        self.check(tier, subnet, devices.len())?;

        let addresses = engine.assign_addresses(devices, subnet.base, subnet.mask)?;
        if addresses.len() != devices.len() {
            return Err(EngineError::LengthMismatch {
                what: "assigned addresses",
                expected: devices.len(),
                got: addresses.len(),
            }
            .into());
        }
        self.assigned.push((tier, subnet));

        info!("Assigned {} {} tier addresses from {}", devices.len(), tier, subnet);
        Ok(AddressMap::new(
            tier,
            subnet,
            devices.iter().copied().zip(addresses).collect(),
        ))
    }

    /// Blocks assigned so far, in assignment order
    pub fn assigned(&self) -> &[(NetworkTier, Subnet)] {
        &self.assigned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MediumParams, VirtualEngine};
    use proptest::prelude::*;
    use std::net::Ipv4Addr;

    fn devices(engine: &VirtualEngine, count: usize) -> Vec<DeviceHandle> {
        let nodes = engine.create_nodes(count);
        engine.create_devices(&nodes, &MediumParams::station("ssid")).unwrap()
    }

    #[test]
    fn test_default_plan() {
        let engine = VirtualEngine::default();
        let access_devices = devices(&engine, 8);
        let backbone_devices = devices(&engine, 3);
        let mut planner = AddressPlanner::new();

        let access = planner
            .assign(&engine, NetworkTier::Access, Subnet::access_default(), &access_devices)
            .unwrap();
        let backbone = planner
            .assign(&engine, NetworkTier::Backbone, Subnet::backbone_default(), &backbone_devices)
            .unwrap();

        assert_eq!(access.len(), 8);
        assert_eq!(access.last(), Some(Ipv4Addr::new(10, 0, 0, 8)));
        assert_eq!(backbone.get(0), Some(Ipv4Addr::new(172, 16, 0, 1)));
        assert!(access.addresses().iter().all(|a| !backbone.subnet().contains(*a)));
    }

    #[test]
    fn test_backbone_first_rejected() {
        let engine = VirtualEngine::default();
        let backbone_devices = devices(&engine, 2);
        let mut planner = AddressPlanner::new();
        let result = planner.assign(&engine, NetworkTier::Backbone, Subnet::backbone_default(), &backbone_devices);
        assert!(matches!(result, Err(AddressError::OutOfOrder { .. })));
    }

    #[test]
    fn test_tier_assigned_once() {
        let engine = VirtualEngine::default();
        let access_devices = devices(&engine, 2);
        let mut planner = AddressPlanner::new();
        planner
            .assign(&engine, NetworkTier::Access, Subnet::access_default(), &access_devices)
            .unwrap();
        let again = planner.assign(&engine, NetworkTier::Access, Subnet::access_default(), &access_devices);
        assert!(matches!(again, Err(AddressError::TierAlreadyAssigned(NetworkTier::Access))));
    }

    #[test]
    fn test_overlap_rejected() {
        let engine = VirtualEngine::default();
        let access_devices = devices(&engine, 2);
        let backbone_devices = devices(&engine, 2);
        let mut planner = AddressPlanner::new();
        planner
            .assign(&engine, NetworkTier::Access, Subnet::access_default(), &access_devices)
            .unwrap();
        let wide = Subnet::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 0, 0, 0));
        let result = planner.assign(&engine, NetworkTier::Backbone, wide, &backbone_devices);
        assert!(matches!(result, Err(AddressError::Overlap { .. })));
    }

    #[test]
    fn test_exhaustion_rejected_before_engine() {
        let engine = VirtualEngine::default();
        let access_devices = devices(&engine, 3);
        let tiny = Subnet::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 252));
        let mut planner = AddressPlanner::new();
        let result = planner.assign(&engine, NetworkTier::Access, tiny, &access_devices);
        assert!(matches!(result, Err(AddressError::Exhausted { capacity: 2, needed: 3, .. })));
        assert!(planner.assigned().is_empty());
    }

    proptest! {
        #[test]
        fn prop_assigned_ranges_never_overlap(
            a in any::<u32>(), a_prefix in 8u32..31,
            b in any::<u32>(), b_prefix in 8u32..31,
        ) {
            let mask = |p: u32| Ipv4Addr::from(u32::MAX << (32 - p));
            let access = Subnet::new(Ipv4Addr::from(a), mask(a_prefix));
            let backbone = Subnet::new(Ipv4Addr::from(b), mask(b_prefix));

            let engine = VirtualEngine::default();
            let access_devices = devices(&engine, 2);
            let backbone_devices = devices(&engine, 2);
            let mut planner = AddressPlanner::new();
            let access_map = planner.assign(&engine, NetworkTier::Access, access, &access_devices).unwrap();

            match planner.assign(&engine, NetworkTier::Backbone, backbone, &backbone_devices) {
                Ok(backbone_map) => {
                    for addr in access_map.addresses() {
                        prop_assert!(!backbone_map.subnet().contains(addr));
                        prop_assert!(!backbone_map.addresses().contains(&addr));
                    }
                }
                Err(AddressError::Overlap { .. }) => prop_assert!(access.overlaps(&backbone)),
                Err(e) => prop_assert!(false, "unexpected error: {}", e),
            }
        }
    }
}
