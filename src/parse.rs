//! Normalization of user-supplied address strings.

use crate::Error;
use ipnet::IpNet;
use std::net::IpAddr;

/// Parses `addr/prefix` or a bare IP address.
///
/// A bare address gets a host prefix: `/32` for IPv4, `/128` for IPv6. The
/// host part is preserved, so `192.168.1.10/24` keeps `192.168.1.10` as its
/// address and `192.168.1.0/24` as its network.
pub fn parse_address(s: &str) -> Result<IpNet, Error> {
    let s = s.trim();
    if let Ok(network) = s.parse::<IpNet>() {
        return Ok(network);
    }
    let addr = s
        .parse::<IpAddr>()
        .map_err(|_| Error::InvalidFormat(s.to_string()))?;
    let prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNet::new(addr, prefix).map_err(|_| Error::InvalidFormat(s.to_string()))
}

/// Parses every string or none of them.
pub fn parse_addresses<S: AsRef<str>>(items: &[S]) -> Result<Vec<IpNet>, Error> {
    items.iter().map(|s| parse_address(s.as_ref())).collect()
}

pub fn parse_dns(s: &str) -> Result<IpAddr, Error> {
    parse_ip(s)
}

pub fn parse_dnss<S: AsRef<str>>(items: &[S]) -> Result<Vec<IpAddr>, Error> {
    items.iter().map(|s| parse_dns(s.as_ref())).collect()
}

pub fn parse_gateway(s: &str) -> Result<IpAddr, Error> {
    parse_ip(s)
}

fn parse_ip(s: &str) -> Result<IpAddr, Error> {
    let s = s.trim();
    s.parse().map_err(|_| Error::InvalidFormat(s.to_string()))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn test_bare_ipv4() {
        let net = parse_address("192.168.1.10").unwrap();
        assert_eq!(net.addr(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(net.prefix_len(), 32);
    }

    #[test]
    fn test_bare_ipv6() {
        let net = parse_address("fd00::1").unwrap();
        assert_eq!(net.addr(), "fd00::1".parse::<Ipv6Addr>().unwrap());
        assert_eq!(net.prefix_len(), 128);
    }

    #[test]
    fn test_cidr_keeps_host() {
        let net = parse_address("192.168.1.10/24").unwrap();
        assert_eq!(net.addr(), IpAddr::V4(Ipv4Addr::new(192, 168, 1, 10)));
        assert_eq!(net.trunc(), "192.168.1.0/24".parse::<IpNet>().unwrap());
        assert_eq!(net.prefix_len(), 24);
    }

    #[test]
    fn test_invalid() {
        assert!(matches!(
            parse_address("not-an-ip"),
            Err(Error::InvalidFormat(s)) if s == "not-an-ip"
        ));
        assert!(parse_address("10.0.0.1/33").is_err());
        assert!(parse_dns("dns.example").is_err());
        assert!(parse_gateway("").is_err());
    }

    #[test]
    fn test_list_is_all_or_nothing() {
        assert_eq!(
            parse_addresses(&["10.0.0.6/24", "10.0.0.7"]).unwrap(),
            vec![
                "10.0.0.6/24".parse::<IpNet>().unwrap(),
                "10.0.0.7/32".parse::<IpNet>().unwrap()
            ]
        );
        assert!(parse_addresses(&["10.0.0.6/24", "bogus", "10.0.0.7"]).is_err());
        assert!(parse_dnss(&["1.1.1.1", "2606:4700::1111"]).is_ok());
        assert!(parse_dnss(&["1.1.1.1", "1.1.1"]).is_err());
    }
}
