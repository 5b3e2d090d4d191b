//! Multi-value verbs.
//!
//! Every item is attempted in order, failures never stop the loop and nothing
//! is rolled back. The first failure becomes the result of the whole call.

use crate::{Configurator, Error};
use ipnet::IpNet;
use log::warn;
use std::fmt::Display;
use std::net::IpAddr;

pub(crate) fn apply_all<T, F>(items: &[T], mut op: F) -> Result<(), Error>
where
    T: Display,
    F: FnMut(&T) -> Result<(), Error>,
{
    let mut first = None;
    for item in items {
        if let Err(e) = op(item) {
            warn!("{item}: {e}");
            first.get_or_insert(e);
        }
    }
    first.map_or(Ok(()), Err)
}

pub fn add_ips<C: Configurator + ?Sized>(
    c: &C,
    name: &str,
    networks: &[IpNet],
) -> Result<(), Error> {
    apply_all(networks, |network| c.add_ip(name, *network))
}

pub fn del_ips<C: Configurator + ?Sized>(
    c: &C,
    name: &str,
    networks: &[IpNet],
) -> Result<(), Error> {
    apply_all(networks, |network| c.del_ip(name, *network))
}

pub fn add_dnss<C: Configurator + ?Sized>(
    c: &C,
    name: &str,
    servers: &[IpAddr],
) -> Result<(), Error> {
    apply_all(servers, |server| c.add_dns(name, *server))
}

pub fn del_dnss<C: Configurator + ?Sized>(
    c: &C,
    name: &str,
    servers: &[IpAddr],
) -> Result<(), Error> {
    apply_all(servers, |server| c.del_dns(name, *server))
}
