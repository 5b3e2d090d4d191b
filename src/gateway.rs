use ipnet::IpNet;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// Default gateways attributed to one interface, per address family.
#[derive(Default, Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct InterfaceGateways {
    pub v4: Option<IpAddr>,
    pub v6: Option<IpAddr>,
}

impl InterfaceGateways {
    fn is_complete(&self) -> bool {
        self.v4.is_some() && self.v6.is_some()
    }
}

/// Renders a gateway slot, `N/A` when nothing was attributed.
pub struct GatewayDisplay(pub Option<IpAddr>);

impl Display for GatewayDisplay {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(gateway) => write!(f, "{gateway}"),
            None => f.write_str("N/A"),
        }
    }
}

/// Attributes system-wide default gateways to an interface by subnet
/// containment.
///
/// `gateways` are the next hops the OS reports without interface
/// attribution. A gateway belongs to the interface if one of the
/// interface's subnets of the same family contains it. The first match per
/// family wins.
pub fn attribute_gateways(gateways: &[IpAddr], subnets: &[IpNet]) -> InterfaceGateways {
    let mut result = InterfaceGateways::default();

    for gateway in gateways {
        let slot = match gateway {
            IpAddr::V4(_) => &mut result.v4,
            IpAddr::V6(_) => &mut result.v6,
        };
        if slot.is_some() {
            continue;
        }

        let matched = subnets.iter().any(|subnet| {
            subnet.addr().is_ipv4() == gateway.is_ipv4() && subnet.contains(gateway)
        });
        if matched {
            *slot = Some(*gateway);
        }

        if result.is_complete() {
            break;
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;

    fn nets(items: &[&str]) -> Vec<IpNet> {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn ips(items: &[&str]) -> Vec<IpAddr> {
        items.iter().map(|s| s.parse().unwrap()).collect()
    }

    #[test]
    fn test_match_per_family() {
        let result = attribute_gateways(
            &ips(&["10.1.0.1", "192.168.1.1", "fe80::1"]),
            &nets(&["192.168.1.20/24", "fe80::aa/64"]),
        );
        assert_eq!(result.v4, Some("192.168.1.1".parse().unwrap()));
        assert_eq!(result.v6, Some("fe80::1".parse().unwrap()));
    }

    #[test]
    fn test_first_match_wins() {
        let result = attribute_gateways(
            &ips(&["10.0.0.1", "10.0.0.254"]),
            &nets(&["10.0.0.5/24"]),
        );
        assert_eq!(result.v4, Some("10.0.0.1".parse().unwrap()));
        assert_eq!(result.v6, None);
    }

    #[test]
    fn test_not_available() {
        let result = attribute_gateways(&ips(&["172.16.0.1"]), &nets(&["10.0.0.5/24"]));
        assert_eq!(result, InterfaceGateways::default());
        assert_eq!(GatewayDisplay(result.v4).to_string(), "N/A");
        assert_eq!(
            GatewayDisplay(Some("10.0.0.1".parse().unwrap())).to_string(),
            "10.0.0.1"
        );
    }

    #[test]
    fn test_family_mismatch_ignored() {
        // ::ffff:10.0.0.1 is v6 and must not match a v4 subnet.
        let result = attribute_gateways(&ips(&["::ffff:10.0.0.1"]), &nets(&["10.0.0.5/24"]));
        assert_eq!(result.v4, None);
        assert_eq!(result.v6, None);
    }
}
