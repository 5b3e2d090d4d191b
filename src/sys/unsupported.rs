use crate::{Config, Configurator, Error, InterfaceIdentity, OperationalState};
use ipnet::IpNet;
use std::net::IpAddr;

const PLATFORM: &str = "interface configuration on this platform";

/// Backend for hosts without a native implementation. Every verb fails with
/// [`Error::Unsupported`].
#[derive(Debug)]
pub struct Backend {
    _config: Config,
}

impl Backend {
    pub fn new(config: Config) -> Result<Self, Error> {
        Ok(Self { _config: config })
    }
}

impl Configurator for Backend {
    fn interface(&self, _name: &str) -> Result<InterfaceIdentity, Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn list_interfaces(&self) -> Result<Vec<InterfaceIdentity>, Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn addresses(&self, _name: &str) -> Result<Vec<IpNet>, Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn add_ip(&self, _name: &str, _network: IpNet) -> Result<(), Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn del_ip(&self, _name: &str, _network: IpNet) -> Result<(), Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn dns_servers(&self, _name: &str) -> Result<Vec<IpAddr>, Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn set_dnss(&self, _name: &str, _servers: &[IpAddr]) -> Result<(), Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn default_gateways(&self) -> Result<Vec<IpAddr>, Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn set_gateway(&self, _name: &str, _gateway: IpAddr) -> Result<(), Error> {
        Err(Error::Unsupported(PLATFORM))
    }

    fn set_state(&self, _name: &str, _state: OperationalState) -> Result<(), Error> {
        Err(Error::Unsupported("changing interface state on this platform"))
    }
}
