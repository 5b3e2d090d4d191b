//! Interface name resolution and administrative flags through libc/ioctl.

mod ifacename;
mod ifreq;

pub(crate) use ifacename::InterfaceName;

use crate::Error;
use std::net::UdpSocket;
use std::os::unix::io::AsRawFd;

mod ioctls {
    nix::ioctl_read_bad!(siocgifflags, libc::SIOCGIFFLAGS, super::ifreq::ifreq);
    nix::ioctl_write_ptr_bad!(siocsifflags, libc::SIOCSIFFLAGS, super::ifreq::ifreq);
}

pub(crate) fn if_nametoindex(name: &str) -> Result<u32, Error> {
    let cname = InterfaceName::try_from(name)?;

    match unsafe { libc::if_nametoindex(cname.as_ptr()) } {
        0 => Err(Error::InterfaceNotFound(name.to_string())),
        n => Ok(n),
    }
}

/// Names of every interface in the kernel table.
pub(crate) fn if_names() -> Result<Vec<String>, Error> {
    Ok(nix::net::if_::if_nameindex()?
        .iter()
        .filter_map(|iface| iface.name().to_str().ok().map(str::to_string))
        .collect())
}

pub(crate) fn if_flags(name: &str) -> Result<libc::c_short, Error> {
    let mut req = ifreq::ifreq::new(InterfaceName::try_from(name)?);
    let socket = dummy_socket()?;

    unsafe {
        ioctls::siocgifflags(socket.as_raw_fd(), &mut req)?;
        Ok(req.ifr_ifru.ifru_flags)
    }
}

/// Sets or clears `mask` in the interface flags. Returns `false` without
/// touching the interface when the flags already match.
pub(crate) fn if_set_flags_masked(name: &str, mask: libc::c_short, v: bool) -> Result<bool, Error> {
    let flags = if_flags(name)?;
    let wanted = if v { flags | mask } else { flags & !mask };
    if wanted == flags {
        return Ok(false);
    }

    let mut req = ifreq::ifreq::new(InterfaceName::try_from(name)?);
    req.ifr_ifru.ifru_flags = wanted;
    let socket = dummy_socket()?;

    unsafe { ioctls::siocsifflags(socket.as_raw_fd(), &req) }?;
    Ok(true)
}

fn dummy_socket() -> Result<UdpSocket, Error> {
    UdpSocket::bind("0.0.0.0:0")
        .or_else(|_| UdpSocket::bind("[::1]:0"))
        .map_err(Error::from)
}
