//! Network tiers, subnets and assigned address maps.
//!
//! This file describes the address blocks each tier draws from and records
//! which device received which address, so later phases (the probe target,
//! reports) can look addresses up by device index.

use std::fmt;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::engine::DeviceHandle;
use crate::utils::ip_utils::{broadcast_of, format_cidr, host_capacity, network_of, prefix_len};

/// Tier classification for address planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkTier {
    /// Stations plus their collocated access points
    Access,
    /// Mesh interfaces of backbone nodes
    Backbone,
}

impl NetworkTier {
    /// Tiers in the order they must be assigned
    pub const ORDER: [NetworkTier; 2] = [NetworkTier::Access, NetworkTier::Backbone];
}

impl fmt::Display for NetworkTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkTier::Access => write!(f, "access"),
            NetworkTier::Backbone => write!(f, "backbone"),
        }
    }
}

/// An IPv4 block given as base address and netmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub base: Ipv4Addr,
    pub mask: Ipv4Addr,
}

impl Subnet {
    pub fn new(base: Ipv4Addr, mask: Ipv4Addr) -> Self {
        Self { base, mask }
    }

    /// Default access tier block, 10.0.0.0/24
    pub fn access_default() -> Self {
        Self::new(Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(255, 255, 255, 0))
    }

    /// Default backbone tier block, 172.16.0.0/24
    pub fn backbone_default() -> Self {
        Self::new(Ipv4Addr::new(172, 16, 0, 0), Ipv4Addr::new(255, 255, 255, 0))
    }

    pub fn prefix_len(&self) -> Result<u8, String> {
        prefix_len(self.mask)
    }

    pub fn network(&self) -> Ipv4Addr {
        network_of(self.base, self.mask)
    }

    pub fn broadcast(&self) -> Ipv4Addr {
        broadcast_of(self.base, self.mask)
    }

    /// Usable host addresses in the block
    pub fn capacity(&self) -> u64 {
        host_capacity(self.mask)
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        network_of(addr, self.mask) == self.network()
    }

    /// True when the two blocks share at least one address
    pub fn overlaps(&self, other: &Subnet) -> bool {
        u32::from(self.network()) <= u32::from(other.broadcast())
            && u32::from(other.network()) <= u32::from(self.broadcast())
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match format_cidr(self.base, self.mask) {
            Ok(cidr) => write!(f, "{}", cidr),
            Err(_) => write!(f, "{}/{}", self.base, self.mask),
        }
    }
}

/// Addresses handed out to one tier, indexed by device position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressMap {
    tier: NetworkTier,
    subnet: Subnet,
    entries: Vec<(DeviceHandle, Ipv4Addr)>,
}

impl AddressMap {
    pub(crate) fn new(tier: NetworkTier, subnet: Subnet, entries: Vec<(DeviceHandle, Ipv4Addr)>) -> Self {
        Self { tier, subnet, entries }
    }

    pub fn tier(&self) -> NetworkTier {
        self.tier
    }

    pub fn subnet(&self) -> Subnet {
        self.subnet
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Address of the device at `index` in assignment order
    pub fn get(&self, index: usize) -> Option<Ipv4Addr> {
        self.entries.get(index).map(|(_, addr)| *addr)
    }

    /// The most recently assigned address
    pub fn last(&self) -> Option<Ipv4Addr> {
        self.entries.last().map(|(_, addr)| *addr)
    }

    pub fn address_of(&self, device: DeviceHandle) -> Option<Ipv4Addr> {
        self.entries
            .iter()
            .find(|(d, _)| *d == device)
            .map(|(_, addr)| *addr)
    }

    pub fn addresses(&self) -> Vec<Ipv4Addr> {
        self.entries.iter().map(|(_, addr)| *addr).collect()
    }
}
