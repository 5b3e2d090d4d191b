//! Subprocess calls to the network shell, for what IP Helper cannot do
//! simply: DNS servers, admin state and removing stubborn addresses.

use crate::{Config, Error, OperationalState};
use log::debug;
use std::net::IpAddr;
use std::os::windows::process::CommandExt;
use std::process::Command;

pub(super) struct Netsh<'a> {
    program: &'a str,
}

impl<'a> Netsh<'a> {
    pub(super) fn new(config: &'a Config) -> Self {
        Self {
            program: &config.netsh,
        }
    }

    /// Runs one command. A non-zero exit becomes [`Error::Command`] carrying
    /// stdout and stderr.
    pub(super) fn run(&self, args: &[String]) -> Result<(), Error> {
        debug!("{} {}", self.program, args.join(" "));

        let mut command = Command::new(self.program);
        // Already quoted, see `name_arg`.
        for arg in args {
            command.raw_arg(arg);
        }
        let output = command.output()?;
        if output.status.success() {
            return Ok(());
        }

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(Error::Command {
            program: self.program.to_string(),
            code: output.status.code(),
            output: text.trim().to_string(),
        })
    }
}

fn family(addr: &IpAddr) -> &'static str {
    match addr {
        IpAddr::V4(_) => "ipv4",
        IpAddr::V6(_) => "ipv6",
    }
}

/// `key="name"`. Interface names may hold spaces but never quotes.
fn name_arg(key: &str, name: &str) -> Result<String, Error> {
    if name.is_empty() || name.contains('"') {
        return Err(Error::InvalidParameter);
    }
    Ok(format!("{key}=\"{name}\""))
}

fn args(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}

pub(super) fn add_dns(name: &str, server: &IpAddr) -> Result<Vec<String>, Error> {
    let mut cmd = args(&["interface", family(server), "add", "dnsserver"]);
    cmd.push(name_arg("name", name)?);
    cmd.push(format!("address={server}"));
    cmd.push("validate=no".to_string());
    Ok(cmd)
}

pub(super) fn delete_dns(name: &str, server: &IpAddr) -> Result<Vec<String>, Error> {
    let mut cmd = args(&["interface", family(server), "delete", "dnsserver"]);
    cmd.push(name_arg("name", name)?);
    cmd.push(format!("address={server}"));
    Ok(cmd)
}

/// Leaves one family with an empty static list. Switching to static also
/// drops servers learned through DHCP.
pub(super) fn clear_dns(name: &str, ipv6: bool) -> Result<Vec<String>, Error> {
    let family = if ipv6 { "ipv6" } else { "ipv4" };
    let mut cmd = args(&["interface", family, "set", "dnsservers"]);
    cmd.push(name_arg("name", name)?);
    cmd.push("source=static".to_string());
    cmd.push("address=none".to_string());
    Ok(cmd)
}

pub(super) fn delete_address(name: &str, addr: &IpAddr) -> Result<Vec<String>, Error> {
    let mut cmd = args(&["interface", family(addr), "delete", "address"]);
    cmd.push(match addr {
        IpAddr::V4(_) => name_arg("name", name)?,
        IpAddr::V6(_) => name_arg("interface", name)?,
    });
    cmd.push(format!("address={addr}"));
    Ok(cmd)
}

pub(super) fn set_admin_state(name: &str, state: OperationalState) -> Result<Vec<String>, Error> {
    let mut cmd = args(&["interface", "set", "interface"]);
    cmd.push(name_arg("name", name)?);
    cmd.push(
        match state {
            OperationalState::Up => "admin=ENABLED",
            OperationalState::Down => "admin=DISABLED",
        }
        .to_string(),
    );
    Ok(cmd)
}
