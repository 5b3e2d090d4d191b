use super::iphlpapi::Iphlpapi;
use crate::{Config, Error, InterfaceIdentity, OperationalState};
use ipnet::IpNet;
use log::warn;
use std::iter;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::slice;
use widestring::U16CStr;
use windows::Win32::NetworkManagement::IpHelper::IP_ADAPTER_ADDRESSES_LH;
use windows::Win32::NetworkManagement::Ndis::IfOperStatusUp;
use windows::Win32::Networking::WinSock::SOCKET_ADDRESS;

const AF_INET: u16 = 2;
const AF_INET6: u16 = 23;

/// One entry of the adapter table, copied out of the OS buffer.
#[derive(Clone, Debug, Default)]
pub(super) struct Adapter {
    pub(super) identity: InterfaceIdentity,
    pub(super) ipv4_index: u32,
    pub(super) addresses: Vec<IpNet>,
    pub(super) dns_servers: Vec<IpAddr>,
    pub(super) gateways: Vec<IpAddr>,
}

/// Walks the adapter table. Windows has no direct name to LUID lookup, so
/// every identity resolution goes through here.
pub(super) fn adapters(iphlpapi: &Iphlpapi, config: &Config) -> Result<Vec<Adapter>, Error> {
    let buffer = match iphlpapi.adapters_addresses(config)? {
        Some(buffer) => buffer,
        None => return Ok(vec![]),
    };

    let head = buffer.as_ptr() as *const IP_ADAPTER_ADDRESSES_LH;
    unsafe { chain(head, |a| a.Next) }
        .map(|adapter| unsafe { parse_adapter(adapter) })
        .collect()
}

pub(super) fn find<'a>(adapters: &'a [Adapter], name: &str) -> Result<&'a Adapter, Error> {
    adapters
        .iter()
        .find(|adapter| adapter.identity.name == name)
        .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
}

/// Iterates an OS-owned singly linked list.
unsafe fn chain<'a, T: 'a>(
    head: *const T,
    next: fn(&T) -> *mut T,
) -> impl Iterator<Item = &'a T> {
    iter::successors(head.as_ref(), move |item| next(item).as_ref())
}

unsafe fn parse_adapter(adapter: &IP_ADAPTER_ADDRESSES_LH) -> Result<Adapter, Error> {
    if adapter.FriendlyName.0.is_null() {
        return Err(Error::UnexpectedMetadata);
    }
    let name = U16CStr::from_ptr_str(adapter.FriendlyName.0).to_string()?;

    let ipv4_index = adapter.Anonymous1.Anonymous.IfIndex;
    let hwaddress = match adapter.PhysicalAddressLength {
        6 => <[u8; 6]>::try_from(&adapter.PhysicalAddress[..6]).ok(),
        _ => None,
    };

    let identity = InterfaceIdentity {
        index: if ipv4_index != 0 {
            ipv4_index
        } else {
            adapter.Ipv6IfIndex
        },
        hwaddress,
        mtu: adapter.Mtu,
        state: if adapter.OperStatus == IfOperStatusUp {
            OperationalState::Up
        } else {
            OperationalState::Down
        },
        luid: Some(adapter.Luid.Value),
        name,
    };

    let mut addresses = vec![];
    for unicast in chain(adapter.FirstUnicastAddress, |u| u.Next) {
        let network = socket_address_ip(&unicast.Address)
            .and_then(|ip| IpNet::new(ip, unicast.OnLinkPrefixLength).ok());
        match network {
            Some(network) => addresses.push(network),
            None => warn!("Skipping malformed address on {}", identity.name),
        }
    }

    let dns_servers = chain(adapter.FirstDnsServerAddress, |d| d.Next)
        .filter_map(|dns| socket_address_ip(&dns.Address))
        .collect();
    let gateways = chain(adapter.FirstGatewayAddress, |g| g.Next)
        .filter_map(|gateway| socket_address_ip(&gateway.Address))
        .collect();

    Ok(Adapter {
        identity,
        ipv4_index,
        addresses,
        dns_servers,
        gateways,
    })
}

unsafe fn socket_address_ip(address: &SOCKET_ADDRESS) -> Option<IpAddr> {
    if address.lpSockaddr.is_null() {
        return None;
    }
    let len = usize::try_from(address.iSockaddrLength).ok()?;
    sockaddr_ip(slice::from_raw_parts(address.lpSockaddr as *const u8, len))
}

/// Address of a raw `SOCKADDR_IN` / `SOCKADDR_IN6`.
fn sockaddr_ip(bytes: &[u8]) -> Option<IpAddr> {
    let family = u16::from_ne_bytes(bytes.get(0..2)?.try_into().ok()?);
    match family {
        AF_INET => {
            let octets: [u8; 4] = bytes.get(4..8)?.try_into().ok()?;
            Some(Ipv4Addr::from(octets).into())
        }
        AF_INET6 => {
            let octets: [u8; 16] = bytes.get(8..24)?.try_into().ok()?;
            Some(Ipv6Addr::from(octets).into())
        }
        _ => None,
    }
}
