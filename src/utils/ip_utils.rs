use std::net::Ipv4Addr;

/// IPv4 netmask helpers used by subnet planning and validation

/// Prefix length of a contiguous netmask (e.g. 255.255.255.0 -> 24)
pub fn prefix_len(mask: Ipv4Addr) -> Result<u8, String> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    if bits.checked_shl(ones).unwrap_or(0) != 0 {
        return Err(format!("Netmask {} is not contiguous", mask));
    }
    Ok(ones as u8)
}

/// Network address of `addr` under `mask`
pub fn network_of(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) & u32::from(mask))
}

/// Last address (broadcast) of the block containing `addr`
pub fn broadcast_of(addr: Ipv4Addr, mask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(addr) | !u32::from(mask))
}

/// Number of usable host addresses in a block, excluding network and broadcast
pub fn host_capacity(mask: Ipv4Addr) -> u64 {
    u64::from(!u32::from(mask)).saturating_sub(1)
}

/// Format a block in CIDR notation, e.g. `10.0.0.0/24`
pub fn format_cidr(addr: Ipv4Addr, mask: Ipv4Addr) -> Result<String, String> {
    let prefix = prefix_len(mask)?;
    Ok(format!("{}/{}", network_of(addr, mask), prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_len() {
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 0)), Ok(24));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 0, 0)), Ok(16));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 255)), Ok(32));
        assert_eq!(prefix_len(Ipv4Addr::new(0, 0, 0, 0)), Ok(0));
        assert!(prefix_len(Ipv4Addr::new(255, 0, 255, 0)).is_err());
    }

    #[test]
    fn test_block_bounds() {
        let mask = Ipv4Addr::new(255, 255, 255, 0);
        assert_eq!(network_of(Ipv4Addr::new(10, 0, 0, 77), mask), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(broadcast_of(Ipv4Addr::new(10, 0, 0, 77), mask), Ipv4Addr::new(10, 0, 0, 255));
        assert_eq!(host_capacity(mask), 254);
        assert_eq!(host_capacity(Ipv4Addr::new(255, 255, 255, 255)), 0);
    }

    #[test]
    fn test_format_cidr() {
        assert_eq!(
            format_cidr(Ipv4Addr::new(172, 16, 0, 9), Ipv4Addr::new(255, 255, 255, 0)),
            Ok("172.16.0.0/24".to_string())
        );
    }
}
