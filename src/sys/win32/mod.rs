mod adapters;
mod iphlpapi;
mod netsh;

use self::adapters::{adapters, find, Adapter};
use self::iphlpapi::{
    from_in_addr, in_addr, os_code, IpForwardRow, Iphlpapi, ERROR_NOT_FOUND,
    MIB_IPPROTO_NETMGMT, MIB_IPROUTE_TYPE_INDIRECT,
};
use self::netsh::Netsh;
use crate::batch::apply_all;
use crate::{is_link_local, Config, Configurator, Error, InterfaceIdentity, OperationalState};
use ipnet::IpNet;
use log::{debug, warn};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use windows::Win32::NetworkManagement::IpHelper::MIB_UNICASTIPADDRESS_ROW;
use windows::Win32::NetworkManagement::Ndis::NET_LUID_LH;
use windows::Win32::Networking::WinSock::{
    IpDadStatePreferred, IpPrefixOriginManual, IpSuffixOriginManual,
};

/// IP Helper for addresses and routes, the network shell for DNS and
/// admin state.
pub struct Backend {
    config: Config,
    iphlpapi: Iphlpapi,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Backend {
    /// Resolves every IP Helper entry point up front.
    pub fn new(config: Config) -> Result<Self, Error> {
        Ok(Self {
            iphlpapi: Iphlpapi::load()?,
            config,
        })
    }

    fn adapter(&self, name: &str) -> Result<Adapter, Error> {
        let adapters = adapters(&self.iphlpapi, &self.config)?;
        find(&adapters, name).cloned()
    }

    fn netsh(&self) -> Netsh<'_> {
        Netsh::new(&self.config)
    }

    fn unicast_row(adapter: &Adapter, network: IpNet) -> MIB_UNICASTIPADDRESS_ROW {
        let mut row = MIB_UNICASTIPADDRESS_ROW::default();
        row.Address = std::net::SocketAddr::new(network.addr(), 0).into();
        row.InterfaceIndex = adapter.identity.index;
        row.InterfaceLuid = NET_LUID_LH {
            Value: adapter.identity.luid.unwrap_or_default(),
        };
        row.OnLinkPrefixLength = network.prefix_len();
        row.PrefixOrigin = IpPrefixOriginManual;
        row.SuffixOrigin = IpSuffixOriginManual;
        row.DadState = IpDadStatePreferred;
        row.ValidLifetime = u32::MAX;
        row.PreferredLifetime = u32::MAX;
        row
    }

    /// Network shell fallback for addresses IP Helper refused to remove.
    fn clear_addresses(&self, name: &str, stuck: &[IpNet]) -> Result<(), Error> {
        if stuck.is_empty() {
            return Ok(());
        }
        warn!("Removing {} address(es) on {name} through netsh", stuck.len());

        let netsh = self.netsh();
        apply_all(stuck, |network| {
            netsh.run(&netsh::delete_address(name, &network.addr())?)
        })
    }
}

impl Configurator for Backend {
    fn interface(&self, name: &str) -> Result<InterfaceIdentity, Error> {
        Ok(self.adapter(name)?.identity)
    }

    fn list_interfaces(&self) -> Result<Vec<InterfaceIdentity>, Error> {
        Ok(adapters(&self.iphlpapi, &self.config)?
            .into_iter()
            .map(|adapter| adapter.identity)
            .collect())
    }

    fn addresses(&self, name: &str) -> Result<Vec<IpNet>, Error> {
        Ok(self.adapter(name)?.addresses)
    }

    fn add_ip(&self, name: &str, network: IpNet) -> Result<(), Error> {
        let adapter = self.adapter(name)?;
        match network {
            IpNet::V4(v4) => self
                .iphlpapi
                .add_ip_address(v4.addr(), v4.netmask(), adapter.ipv4_index),
            IpNet::V6(_) => self
                .iphlpapi
                .create_unicast_entry(&Self::unicast_row(&adapter, network)),
        }
    }

    fn del_ip(&self, name: &str, network: IpNet) -> Result<(), Error> {
        let adapter = self.adapter(name)?;
        let not_found = || Error::EntryNotFound(format!("address {network} on {name}"));

        let present = match network {
            IpNet::V4(v4) => self.iphlpapi.ip_addr_table(&self.config)?.iter().any(|row| {
                row.dwIndex == adapter.ipv4_index
                    && row.dwAddr == in_addr(v4.addr())
                    && row.dwMask == in_addr(v4.netmask())
            }),
            IpNet::V6(_) => adapter.addresses.contains(&network),
        };
        if !present {
            return Err(not_found());
        }

        self.iphlpapi
            .delete_unicast_entry(&Self::unicast_row(&adapter, network))
            .map_err(|e| match os_code(&e) {
                Some(ERROR_NOT_FOUND) => not_found(),
                _ => e,
            })
    }

    fn set_ips(&self, name: &str, networks: &[IpNet]) -> Result<(), Error> {
        let stale: Vec<IpNet> = self
            .addresses(name)?
            .into_iter()
            .filter(|network| !is_link_local(&network.addr()))
            .collect();

        let mut stuck = vec![];
        for network in stale {
            if let Err(e) = self.del_ip(name, network) {
                warn!("Failed to remove {network} from {name}: {e}");
                stuck.push(network);
            }
        }

        let cleared = self.clear_addresses(name, &stuck);
        let added = apply_all(networks, |network| self.add_ip(name, *network));
        cleared.and(added)
    }

    fn dns_servers(&self, name: &str) -> Result<Vec<IpAddr>, Error> {
        Ok(self.adapter(name)?.dns_servers)
    }

    fn set_dnss(&self, name: &str, servers: &[IpAddr]) -> Result<(), Error> {
        self.is_existing_iface(name)?;
        let netsh = self.netsh();

        let mut result = Ok(());
        for ipv6 in [false, true] {
            let wanted = servers.iter().any(|server| server.is_ipv6() == ipv6);
            match netsh.run(&netsh::clear_dns(name, ipv6)?) {
                Ok(()) => {}
                // Only fatal when servers of that family are to be published.
                Err(e) if wanted => result = result.and(Err(e)),
                Err(e) => warn!("Failed to clear DNS servers on {name}: {e}"),
            }
        }

        let added = apply_all(servers, |server| netsh.run(&netsh::add_dns(name, server)?));
        result.and(added)
    }

    fn add_dns(&self, name: &str, server: IpAddr) -> Result<(), Error> {
        if self.dns_servers(name)?.contains(&server) {
            debug!("DNS server {server} already set on {name}");
            return Ok(());
        }
        self.netsh().run(&netsh::add_dns(name, &server)?)
    }

    fn del_dns(&self, name: &str, server: IpAddr) -> Result<(), Error> {
        if !self.dns_servers(name)?.contains(&server) {
            return Err(Error::EntryNotFound(format!("DNS server {server} on {name}")));
        }
        self.netsh().run(&netsh::delete_dns(name, &server)?)
    }

    fn default_gateways(&self) -> Result<Vec<IpAddr>, Error> {
        let mut gateways: Vec<IpAddr> = vec![];
        for gateway in adapters(&self.iphlpapi, &self.config)?
            .into_iter()
            .flat_map(|adapter| adapter.gateways)
        {
            if !gateways.contains(&gateway) {
                gateways.push(gateway);
            }
        }
        Ok(gateways)
    }

    fn set_gateway(&self, name: &str, gateway: IpAddr) -> Result<(), Error> {
        let gateway = match gateway {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => return Err(Error::Unsupported("IPv6 default gateway on Windows")),
        };
        let adapter = self.adapter(name)?;

        for row in stale_default_routes(self.iphlpapi.ip_forward_table(&self.config)?) {
            debug!(
                "Deleting default route via {} on #{}",
                from_in_addr(row.dwForwardNextHop),
                row.dwForwardIfIndex
            );
            absorb_missing_route(self.iphlpapi.delete_ip_forward_entry(&row))?;
        }

        self.iphlpapi
            .create_ip_forward_entry(&default_route(adapter.ipv4_index, gateway, &self.config))
    }

    fn set_state(&self, name: &str, state: OperationalState) -> Result<(), Error> {
        if self.state(name)? == state {
            debug!("{name} is already {state}");
            return Ok(());
        }
        self.netsh().run(&netsh::set_admin_state(name, state)?)
    }
}

/// Every IPv4 default route, whatever interface it points through.
fn stale_default_routes(rows: Vec<IpForwardRow>) -> Vec<IpForwardRow> {
    rows.into_iter()
        .filter(|row| row.dwForwardDest == 0 && row.dwForwardMask == 0)
        .collect()
}

/// A route that vanished between the dump and the delete is not a failure.
fn absorb_missing_route(result: Result<(), Error>) -> Result<(), Error> {
    match result {
        Err(e) if os_code(&e) == Some(ERROR_NOT_FOUND) => {
            debug!("Default route already gone: {e}");
            Ok(())
        }
        other => other,
    }
}

fn default_route(index: u32, gateway: Ipv4Addr, config: &Config) -> IpForwardRow {
    IpForwardRow {
        dwForwardNextHop: in_addr(gateway),
        dwForwardIfIndex: index,
        dwForwardType: MIB_IPROUTE_TYPE_INDIRECT,
        dwForwardProto: MIB_IPPROTO_NETMGMT,
        dwForwardMetric1: config.route_metric,
        ..Default::default()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_route_row() {
        let config = Config::default();
        let row = default_route(12, Ipv4Addr::new(192, 168, 1, 1), &config);
        assert_eq!(row.dwForwardDest, 0);
        assert_eq!(row.dwForwardMask, 0);
        assert_eq!(from_in_addr(row.dwForwardNextHop), Ipv4Addr::new(192, 168, 1, 1));
        assert_eq!(row.dwForwardIfIndex, 12);
        assert_eq!(row.dwForwardMetric1, 25);
    }

    #[test]
    fn test_stale_default_routes() {
        let config = Config::default();
        let old = default_route(3, Ipv4Addr::new(10, 0, 0, 1), &config);
        let other = default_route(7, Ipv4Addr::new(172, 16, 0, 1), &config);
        let subnet = IpForwardRow {
            dwForwardDest: in_addr(Ipv4Addr::new(10, 0, 0, 0)),
            dwForwardMask: in_addr(Ipv4Addr::new(255, 255, 255, 0)),
            dwForwardIfIndex: 3,
            ..Default::default()
        };
        let host = IpForwardRow {
            dwForwardDest: in_addr(Ipv4Addr::new(10, 0, 0, 9)),
            dwForwardMask: in_addr(Ipv4Addr::BROADCAST),
            ..Default::default()
        };

        let stale = stale_default_routes(vec![subnet, old, host, other]);
        assert_eq!(stale, vec![old, other]);
        assert!(stale_default_routes(vec![subnet, host]).is_empty());
    }

    #[test]
    fn test_absorb_missing_route() {
        let missing = Error::Os(std::io::Error::from_raw_os_error(ERROR_NOT_FOUND as i32));
        assert!(absorb_missing_route(Err(missing)).is_ok());
        assert!(absorb_missing_route(Ok(())).is_ok());

        let denied = Error::Os(std::io::Error::from_raw_os_error(5));
        match absorb_missing_route(Err(denied)) {
            Err(e) => assert_eq!(os_code(&e), Some(5)),
            Ok(()) => panic!("access denied must not be absorbed"),
        }
    }

    #[test]
    fn test_backend_debug() {
        let backend = Backend::new(Config::default()).unwrap();
        let text = format!("{backend:?}");
        assert!(text.starts_with("Backend"));
        assert!(text.contains("netsh"));
    }

    #[test]
    fn test_unicast_row() {
        let adapter = Adapter {
            identity: InterfaceIdentity {
                index: 9,
                luid: Some(0x0006_0000_0100_0000),
                ..Default::default()
            },
            ..Default::default()
        };
        let row = Backend::unicast_row(&adapter, "fd00::5/64".parse().unwrap());
        assert_eq!(row.InterfaceIndex, 9);
        assert_eq!(row.OnLinkPrefixLength, 64);
        assert_eq!(unsafe { row.InterfaceLuid.Value }, 0x0006_0000_0100_0000);
        assert_eq!(row.ValidLifetime, u32::MAX);
        assert_eq!(row.DadState, IpDadStatePreferred);
    }

    #[test]
    fn test_unknown_interface() {
        let backend = Backend::new(Config::default()).unwrap();
        assert!(backend
            .is_existing_iface("nctl-missing0")
            .unwrap_err()
            .is_not_found());
        assert!(matches!(
            backend.set_gateway("nctl-missing0", "fd00::1".parse().unwrap()),
            Err(Error::Unsupported(_))
        ));
    }
}
