use crate::{InterfaceIdentity, OperationalState};
use ipnet::IpNet;
use libc::{AF_INET, AF_INET6};
use netlink_packet_route::address::Nla as AddressNla;
use netlink_packet_route::link::nlas::Nla as LinkNla;
use netlink_packet_route::route::Nla as RouteNla;
use netlink_packet_route::{
    AddressMessage, LinkMessage, RouteMessage, RtnlMessage, IFF_UP, RTN_UNICAST, RTPROT_STATIC,
    RT_SCOPE_UNIVERSE, RT_TABLE_MAIN,
};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

pub(super) fn family_of(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => AF_INET as u8,
        IpAddr::V6(_) => AF_INET6 as u8,
    }
}

fn octets(addr: &IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

pub(super) fn ip_from_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(|b| Ipv4Addr::from(b).into()),
        16 => <[u8; 16]>::try_from(bytes).ok().map(|b| Ipv6Addr::from(b).into()),
        _ => None,
    }
}

pub(super) fn parse_link(message: &LinkMessage) -> InterfaceIdentity {
    let mut identity = InterfaceIdentity {
        index: message.header.index,
        state: if message.header.flags & IFF_UP != 0 {
            OperationalState::Up
        } else {
            OperationalState::Down
        },
        ..Default::default()
    };

    for nla in &message.nlas {
        match nla {
            LinkNla::IfName(name) => identity.name = name.clone(),
            LinkNla::Mtu(mtu) => identity.mtu = *mtu,
            LinkNla::Address(address) => identity.hwaddress = address.as_slice().try_into().ok(),
            _ => {}
        }
    }
    identity
}

/// Index and network of an address entry. For IPv4 the local address wins
/// over the peer address of point-to-point links.
pub(super) fn parse_address(message: &AddressMessage) -> Option<(u32, IpNet)> {
    let mut address = None;
    let mut local = None;
    for nla in &message.nlas {
        match nla {
            AddressNla::Address(bytes) => address = ip_from_bytes(bytes),
            AddressNla::Local(bytes) => local = ip_from_bytes(bytes),
            _ => {}
        }
    }
    let addr = local.or(address)?;
    let network = IpNet::new(addr, message.header.prefix_len).ok()?;
    Some((message.header.index, network))
}

pub(super) fn make_address_message(index: u32, network: IpNet) -> AddressMessage {
    let mut message = AddressMessage::default();
    message.header.prefix_len = network.prefix_len();
    message.header.index = index;
    message.header.family = family_of(&network.addr());

    let address_vec = octets(&network.addr());
    message.nlas.push(AddressNla::Address(address_vec.clone()));

    if let IpNet::V4(network_v4) = network {
        // IFA_LOCAL is the interface address proper on IPv4
        message.nlas.push(AddressNla::Local(address_vec));
        if network_v4.prefix_len() < 31 {
            message.nlas.push(AddressNla::Broadcast(
                network_v4.broadcast().octets().to_vec(),
            ));
        }
    }

    message
}

pub(super) fn route_dump_message(family: u8) -> RouteMessage {
    let mut message = RouteMessage::default();
    message.header.address_family = family;
    message
}

fn route_table(message: &RouteMessage) -> u32 {
    message
        .nlas
        .iter()
        .find_map(|nla| match nla {
            RouteNla::Table(table) => Some(*table),
            _ => None,
        })
        .unwrap_or(message.header.table as u32)
}

/// Unicast route of the main table with an unspecified destination.
pub(super) fn is_default_route(message: &RouteMessage) -> bool {
    message.header.destination_prefix_length == 0
        && message.header.kind == RTN_UNICAST
        && route_table(message) == RT_TABLE_MAIN as u32
}

/// Default routes of `family` found in a route dump. The kernel may answer
/// with other families and tables, those are left alone.
pub(super) fn stale_default_routes(replies: Vec<RtnlMessage>, family: u8) -> Vec<RouteMessage> {
    replies
        .into_iter()
        .filter_map(|reply| match reply {
            RtnlMessage::NewRoute(route)
                if route.header.address_family == family && is_default_route(&route) =>
            {
                Some(route)
            }
            _ => None,
        })
        .collect()
}

pub(super) fn route_gateway(message: &RouteMessage) -> Option<IpAddr> {
    message.nlas.iter().find_map(|nla| match nla {
        RouteNla::Gateway(bytes) => ip_from_bytes(bytes),
        _ => None,
    })
}

pub(super) fn make_default_route(index: u32, gateway: IpAddr, metric: u32) -> RouteMessage {
    let mut message = RouteMessage::default();
    message.header.address_family = family_of(&gateway);
    message.header.table = RT_TABLE_MAIN;
    message.header.protocol = RTPROT_STATIC;
    message.header.scope = RT_SCOPE_UNIVERSE;
    message.header.kind = RTN_UNICAST;

    message.nlas.push(RouteNla::Gateway(octets(&gateway)));
    message.nlas.push(RouteNla::Oif(index));
    if metric != 0 {
        message.nlas.push(RouteNla::Priority(metric));
    }
    message
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_address_message_v4() {
        let message = make_address_message(3, "10.0.0.5/24".parse().unwrap());
        assert_eq!(message.header.index, 3);
        assert_eq!(message.header.prefix_len, 24);
        assert_eq!(message.header.family, AF_INET as u8);
        assert!(message.nlas.contains(&AddressNla::Local(vec![10, 0, 0, 5])));
        assert!(message
            .nlas
            .contains(&AddressNla::Broadcast(vec![10, 0, 0, 255])));
        assert_eq!(parse_address(&message), Some((3, "10.0.0.5/24".parse().unwrap())));
    }

    #[test]
    fn test_address_message_v6() {
        let message = make_address_message(7, "fd00::5/64".parse().unwrap());
        assert_eq!(message.header.family, AF_INET6 as u8);
        assert_eq!(message.nlas.len(), 1);
        assert_eq!(parse_address(&message), Some((7, "fd00::5/64".parse().unwrap())));
    }

    #[test]
    fn test_default_route() {
        let gateway: IpAddr = "192.168.1.1".parse().unwrap();
        let message = make_default_route(2, gateway, 0);
        assert!(is_default_route(&message));
        assert_eq!(route_gateway(&message), Some(gateway));
        assert!(!message.nlas.iter().any(|nla| matches!(nla, RouteNla::Priority(_))));

        let mut subnet = make_default_route(2, gateway, 100);
        subnet.header.destination_prefix_length = 24;
        assert!(!is_default_route(&subnet));
    }

    #[test]
    fn test_stale_default_routes() {
        let v4 = make_default_route(2, "192.168.1.1".parse().unwrap(), 0);
        let v6 = make_default_route(2, "fd00::1".parse().unwrap(), 0);

        let mut local = make_default_route(2, "192.168.1.1".parse().unwrap(), 0);
        local.header.table = 255;
        let mut extended = make_default_route(3, "10.0.0.1".parse().unwrap(), 0);
        extended.nlas.push(RouteNla::Table(1000));
        let mut subnet = make_default_route(2, "192.168.1.1".parse().unwrap(), 0);
        subnet.header.destination_prefix_length = 24;

        let replies = vec![
            RtnlMessage::NewRoute(local),
            RtnlMessage::NewRoute(v6.clone()),
            RtnlMessage::NewRoute(extended),
            RtnlMessage::NewRoute(subnet),
            RtnlMessage::NewLink(LinkMessage::default()),
            RtnlMessage::NewRoute(v4.clone()),
        ];
        assert_eq!(stale_default_routes(replies.clone(), AF_INET as u8), vec![v4]);
        assert_eq!(stale_default_routes(replies, AF_INET6 as u8), vec![v6]);
    }

    #[test]
    fn test_parse_link() {
        let mut message = LinkMessage::default();
        message.header.index = 4;
        message.header.flags = IFF_UP;
        message.nlas.push(LinkNla::IfName("eth0".to_string()));
        message.nlas.push(LinkNla::Mtu(1500));
        message
            .nlas
            .push(LinkNla::Address(vec![0x02, 0, 0, 0, 0, 0x01]));

        let identity = parse_link(&message);
        assert_eq!(identity.name, "eth0");
        assert_eq!(identity.index, 4);
        assert_eq!(identity.mtu, 1500);
        assert_eq!(identity.state, OperationalState::Up);
        assert_eq!(identity.hwaddress, Some([0x02, 0, 0, 0, 0, 0x01]));
    }
}
