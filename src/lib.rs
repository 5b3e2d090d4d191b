mod batch;
mod config;
mod error;
mod gateway;
mod parse;
mod traits;
pub mod sys;

pub use batch::{add_dnss, add_ips, del_dnss, del_ips};
pub use config::Config;
pub use error::Error;
pub use gateway::{attribute_gateways, GatewayDisplay, InterfaceGateways};
pub use ipnet;
pub use parse::{parse_address, parse_addresses, parse_dns, parse_dnss, parse_gateway};
pub use traits::Configurator;

use ipnet::IpNet;
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};

/// Administrative state of an interface.
#[derive(Default, Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum OperationalState {
    Up,
    #[default]
    Down,
}

impl Display for OperationalState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Up => "UP",
            Self::Down => "DOWN",
        })
    }
}

/// Interface identity as resolved from the live OS table.
///
/// Resolved fresh on every call, nothing is cached between calls.
#[derive(Default, Clone, Eq, PartialEq, Hash, Debug)]
pub struct InterfaceIdentity {
    pub name: String,
    pub index: u32,
    pub hwaddress: Option<[u8; 6]>,
    pub mtu: u32,
    pub state: OperationalState,
    /// Windows only.
    pub luid: Option<u64>,
}

/// Everything known about one interface.
#[derive(Default, Clone, Eq, PartialEq, Debug)]
pub struct InterfaceInfo {
    pub identity: InterfaceIdentity,
    pub addresses: Vec<IpNet>,
    pub broadcasts: Vec<Ipv4Addr>,
    pub gateways: InterfaceGateways,
}

/// IPv4 broadcast addresses of the given networks.
///
/// Host routes (/32) have none, and neither does a network whose broadcast
/// is the interface address itself, such as the upper host of a /31.
pub fn broadcast_addresses(addresses: &[IpNet]) -> Vec<Ipv4Addr> {
    addresses
        .iter()
        .filter_map(|network| match network {
            IpNet::V4(v4) if v4.prefix_len() < 32 => Some((v4.addr(), v4.broadcast())),
            _ => None,
        })
        .filter(|(addr, broadcast)| broadcast != addr && !broadcast.is_unspecified())
        .map(|(_, broadcast)| broadcast)
        .collect()
}

/// IPv4 169.254.0.0/16 or IPv6 fe80::/10.
pub fn is_link_local(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.is_link_local(),
        IpAddr::V6(v6) => (v6.segments()[0] & 0xffc0) == 0xfe80,
    }
}

/// Constructs the backend of the host platform.
///
/// Call once at startup and hand the result (or a reference to it) to the
/// code that needs it.
pub fn configurator(config: Config) -> Result<sys::Backend, Error> {
    sys::Backend::new(config)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_broadcasts() {
        let addresses: Vec<IpNet> = ["10.0.0.5/24", "10.0.1.1/32", "10.0.2.1/31", "fd00::1/64"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        assert_eq!(
            broadcast_addresses(&addresses),
            vec![Ipv4Addr::new(10, 0, 0, 255)]
        );

        // The lower host of a /31 still reports the upper one.
        let addresses: Vec<IpNet> = vec!["10.0.2.0/31".parse().unwrap()];
        assert_eq!(
            broadcast_addresses(&addresses),
            vec![Ipv4Addr::new(10, 0, 2, 1)]
        );
    }

    #[test]
    fn test_link_local() {
        assert!(is_link_local(&"169.254.10.1".parse().unwrap()));
        assert!(is_link_local(&"fe80::1".parse().unwrap()));
        assert!(is_link_local(&"febf::1".parse().unwrap()));
        assert!(!is_link_local(&"fec0::1".parse().unwrap()));
        assert!(!is_link_local(&"10.0.0.5".parse().unwrap()));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(OperationalState::Up.to_string(), "UP");
        assert_eq!(OperationalState::Down.to_string(), "DOWN");
    }
}
