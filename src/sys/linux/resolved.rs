//! Per-link DNS servers held by systemd-resolved, over the system bus.
//!
//! The service has no incremental call: the link's list is read whole and
//! written back whole.

use super::messages::{family_of, ip_from_bytes};
use crate::Error;
use log::debug;
use std::net::IpAddr;
use zbus::blocking::{Connection, Proxy};
use zbus::zvariant::OwnedObjectPath;

const DESTINATION: &str = "org.freedesktop.resolve1";
const MANAGER_PATH: &str = "/org/freedesktop/resolve1";
const MANAGER_INTERFACE: &str = "org.freedesktop.resolve1.Manager";
const LINK_INTERFACE: &str = "org.freedesktop.resolve1.Link";

/// Address family plus raw address bytes, the `(iay)` wire form.
type DnsEntry = (i32, Vec<u8>);

pub(super) struct Resolved {
    connection: Connection,
}

impl Resolved {
    pub(super) fn connect() -> Result<Self, Error> {
        Ok(Self {
            connection: Connection::system()?,
        })
    }

    fn manager(&self) -> Result<Proxy<'_>, Error> {
        Ok(Proxy::new(
            &self.connection,
            DESTINATION,
            MANAGER_PATH,
            MANAGER_INTERFACE,
        )?)
    }

    pub(super) fn link_dns(&self, index: u32) -> Result<Vec<IpAddr>, Error> {
        let path: OwnedObjectPath = self.manager()?.call("GetLink", &(index as i32,))?;
        let link = Proxy::new(&self.connection, DESTINATION, path.as_str(), LINK_INTERFACE)?;

        let entries: Vec<DnsEntry> = link.get_property("DNS")?;
        debug!("link #{index} DNS entries: {entries:?}");
        entries.iter().map(decode).collect()
    }

    pub(super) fn set_link_dns(&self, index: u32, servers: &[IpAddr]) -> Result<(), Error> {
        let entries: Vec<DnsEntry> = servers.iter().map(encode).collect();
        debug!("SetLinkDNS #{index} {entries:?}");
        let _: () = self
            .manager()?
            .call("SetLinkDNS", &(index as i32, entries))?;
        Ok(())
    }
}

fn encode(addr: &IpAddr) -> DnsEntry {
    let bytes = match addr {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    };
    (family_of(addr) as i32, bytes)
}

fn decode(entry: &DnsEntry) -> Result<IpAddr, Error> {
    let (family, bytes) = entry;
    match ip_from_bytes(bytes) {
        Some(addr) if family_of(&addr) as i32 == *family => Ok(addr),
        _ => Err(Error::UnexpectedMetadata),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_wire_form() {
        let v4: IpAddr = "1.1.1.1".parse().unwrap();
        assert_eq!(encode(&v4), (libc::AF_INET, vec![1, 1, 1, 1]));
        assert_eq!(decode(&encode(&v4)).unwrap(), v4);

        let v6: IpAddr = "2606:4700::1111".parse().unwrap();
        assert_eq!(encode(&v6).0, libc::AF_INET6);
        assert_eq!(encode(&v6).1.len(), 16);
    }

    #[test]
    fn test_decode_rejects_mismatch() {
        assert!(decode(&(libc::AF_INET6, vec![1, 1, 1, 1])).is_err());
        assert!(decode(&(libc::AF_INET, vec![1, 1, 1])).is_err());
    }
}
