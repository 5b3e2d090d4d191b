mod messages;
mod netlink;
mod resolved;

use self::messages::{
    is_default_route, make_address_message, make_default_route, parse_address, parse_link, route_dump_message,
    route_gateway, stale_default_routes,
};
use self::netlink::{errno, RouteSocket};
use self::resolved::Resolved;
use crate::sys::posix::{if_names, if_nametoindex, if_set_flags_masked};
use crate::{Config, Configurator, Error, InterfaceIdentity, OperationalState};
use ipnet::IpNet;
use log::debug;
use netlink_packet_route::{
    AddressMessage, LinkMessage, RtnlMessage, NLM_F_CREATE, NLM_F_EXCL,
};
use std::net::IpAddr;

/// rtnetlink for links, addresses and routes; systemd-resolved for DNS.
#[derive(Debug)]
pub struct Backend {
    config: Config,
}

impl Backend {
    pub fn new(config: Config) -> Result<Self, Error> {
        Ok(Self { config })
    }

    fn links(&self) -> Result<Vec<InterfaceIdentity>, Error> {
        let replies = RouteSocket::connect()?.dump(RtnlMessage::GetLink(LinkMessage::default()))?;
        Ok(replies
            .iter()
            .filter_map(|reply| match reply {
                RtnlMessage::NewLink(link) => Some(parse_link(link)),
                _ => None,
            })
            .collect())
    }

    fn addresses_of(&self, index: u32) -> Result<Vec<IpNet>, Error> {
        let replies =
            RouteSocket::connect()?.dump(RtnlMessage::GetAddress(AddressMessage::default()))?;
        Ok(replies
            .iter()
            .filter_map(|reply| match reply {
                RtnlMessage::NewAddress(address) => parse_address(address),
                _ => None,
            })
            .filter(|(i, _)| *i == index)
            .map(|(_, network)| network)
            .collect())
    }
}

impl Configurator for Backend {
    fn interface(&self, name: &str) -> Result<InterfaceIdentity, Error> {
        self.links()?
            .into_iter()
            .find(|link| link.name == name)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))
    }

    fn list_interfaces(&self) -> Result<Vec<InterfaceIdentity>, Error> {
        self.links()
    }

    fn is_existing_iface(&self, name: &str) -> Result<(), Error> {
        match if_names()?.iter().any(|n| n == name) {
            true => Ok(()),
            false => Err(Error::InterfaceNotFound(name.to_string())),
        }
    }

    fn addresses(&self, name: &str) -> Result<Vec<IpNet>, Error> {
        self.addresses_of(if_nametoindex(name)?)
    }

    fn add_ip(&self, name: &str, network: IpNet) -> Result<(), Error> {
        let index = if_nametoindex(name)?;
        RouteSocket::connect()?.execute(
            RtnlMessage::NewAddress(make_address_message(index, network)),
            NLM_F_CREATE | NLM_F_EXCL,
        )
    }

    fn del_ip(&self, name: &str, network: IpNet) -> Result<(), Error> {
        let index = if_nametoindex(name)?;
        let not_found = || Error::EntryNotFound(format!("address {network} on {name}"));

        if !self.addresses_of(index)?.contains(&network) {
            return Err(not_found());
        }
        RouteSocket::connect()?
            .execute(RtnlMessage::DelAddress(make_address_message(index, network)), 0)
            .map_err(|e| match errno(&e) {
                Some(libc::EADDRNOTAVAIL) => not_found(),
                _ => e,
            })
    }

    fn dns_servers(&self, name: &str) -> Result<Vec<IpAddr>, Error> {
        let index = if_nametoindex(name)?;
        Resolved::connect()?.link_dns(index)
    }

    fn set_dnss(&self, name: &str, servers: &[IpAddr]) -> Result<(), Error> {
        let index = if_nametoindex(name)?;
        Resolved::connect()?.set_link_dns(index, servers)
    }

    fn default_gateways(&self) -> Result<Vec<IpAddr>, Error> {
        let replies = RouteSocket::connect()?.dump(RtnlMessage::GetRoute(route_dump_message(0)))?;
        Ok(replies
            .iter()
            .filter_map(|reply| match reply {
                RtnlMessage::NewRoute(route) if is_default_route(route) => route_gateway(route),
                _ => None,
            })
            .collect())
    }

    fn set_gateway(&self, name: &str, gateway: IpAddr) -> Result<(), Error> {
        let index = if_nametoindex(name)?;
        let mut socket = RouteSocket::connect()?;
        let family = messages::family_of(&gateway);

        let replies = socket.dump(RtnlMessage::GetRoute(route_dump_message(family)))?;
        for route in stale_default_routes(replies, family) {
            debug!("Deleting default route via {:?}", route_gateway(&route));
            absorb_missing_route(socket.execute(RtnlMessage::DelRoute(route), 0))?;
        }

        let route = make_default_route(index, gateway, self.config.route_metric);
        socket.execute(RtnlMessage::NewRoute(route), NLM_F_CREATE | NLM_F_EXCL)
    }

    fn set_state(&self, name: &str, state: OperationalState) -> Result<(), Error> {
        let changed = if_set_flags_masked(
            name,
            libc::IFF_UP as libc::c_short,
            state == OperationalState::Up,
        )?;
        if !changed {
            debug!("{name} is already {state}");
        }
        Ok(())
    }
}

/// A route that vanished between the dump and the delete is not a failure.
fn absorb_missing_route(result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Err(e) if errno(&e) == Some(libc::ESRCH) => {
            debug!("Default route already gone: {e}");
            Ok(())
        }
        other => other,
    }
}
