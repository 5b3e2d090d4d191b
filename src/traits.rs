use crate::batch::apply_all;
use crate::{
    attribute_gateways, broadcast_addresses, is_link_local, Error, InterfaceGateways,
    InterfaceIdentity, InterfaceInfo, OperationalState,
};
use ipnet::IpNet;
use log::debug;
use std::net::IpAddr;

/// Verbs for inspecting and configuring host interfaces, addressed by name.
///
/// Backends supply the platform primitives; the overwrite and idempotency
/// rules shared by all platforms live in the provided methods.
pub trait Configurator {
    fn interface(&self, name: &str) -> Result<InterfaceIdentity, Error>;
    fn list_interfaces(&self) -> Result<Vec<InterfaceIdentity>, Error>;

    /// Succeeds iff the live interface table has an interface called `name`.
    fn is_existing_iface(&self, name: &str) -> Result<(), Error> {
        self.interface(name).map(|_| ())
    }

    fn addresses(&self, name: &str) -> Result<Vec<IpNet>, Error>;
    fn add_ip(&self, name: &str, network: IpNet) -> Result<(), Error>;
    /// Fails with [`Error::EntryNotFound`] unless exactly this address and
    /// prefix are assigned.
    fn del_ip(&self, name: &str, network: IpNet) -> Result<(), Error>;

    /// Replaces every address except link-local ones with `networks`.
    ///
    /// Not transactional: every removal and addition is attempted, the first
    /// failure is returned.
    fn set_ips(&self, name: &str, networks: &[IpNet]) -> Result<(), Error> {
        let stale: Vec<IpNet> = self
            .addresses(name)?
            .into_iter()
            .filter(|network| !is_link_local(&network.addr()))
            .collect();

        let removed = apply_all(&stale, |network| self.del_ip(name, *network));
        let added = apply_all(networks, |network| self.add_ip(name, *network));
        removed.and(added)
    }

    fn dns_servers(&self, name: &str) -> Result<Vec<IpAddr>, Error>;
    /// Publishes exactly `servers` as the resolver list of `name`.
    fn set_dnss(&self, name: &str, servers: &[IpAddr]) -> Result<(), Error>;

    /// Adding a server that is already configured is a no-op.
    fn add_dns(&self, name: &str, server: IpAddr) -> Result<(), Error> {
        let mut servers = self.dns_servers(name)?;
        if servers.contains(&server) {
            debug!("DNS server {server} already set on {name}");
            return Ok(());
        }
        servers.push(server);
        self.set_dnss(name, &servers)
    }

    fn del_dns(&self, name: &str, server: IpAddr) -> Result<(), Error> {
        let servers = self.dns_servers(name)?;
        if !servers.contains(&server) {
            return Err(Error::EntryNotFound(format!("DNS server {server} on {name}")));
        }
        let remaining: Vec<IpAddr> = servers.into_iter().filter(|s| *s != server).collect();
        self.set_dnss(name, &remaining)
    }

    /// Next hops of all default routes, not attributed to any interface.
    fn default_gateways(&self) -> Result<Vec<IpAddr>, Error>;
    /// Leaves exactly one default route of the gateway's family, via `name`.
    fn set_gateway(&self, name: &str, gateway: IpAddr) -> Result<(), Error>;

    fn gateways(&self, name: &str) -> Result<InterfaceGateways, Error> {
        let addresses = self.addresses(name)?;
        Ok(attribute_gateways(&self.default_gateways()?, &addresses))
    }

    fn state(&self, name: &str) -> Result<OperationalState, Error> {
        Ok(self.interface(name)?.state)
    }

    fn set_state(&self, name: &str, state: OperationalState) -> Result<(), Error>;

    fn interface_info(&self, name: &str) -> Result<InterfaceInfo, Error> {
        let identity = self.interface(name)?;
        let addresses = self.addresses(name)?;
        let gateways = attribute_gateways(&self.default_gateways()?, &addresses);
        Ok(InterfaceInfo {
            identity,
            broadcasts: broadcast_addresses(&addresses),
            addresses,
            gateways,
        })
    }
}
