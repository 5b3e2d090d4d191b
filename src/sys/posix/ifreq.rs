#![allow(non_camel_case_types)]
#![allow(dead_code)]

use super::InterfaceName;
use std::mem;

#[repr(C)]
#[derive(Copy, Clone)]
pub(crate) struct ifreq {
    pub(crate) ifr_name: InterfaceName,
    pub(crate) ifr_ifru: ifreq_ifru,
}

/// Only the members the flag ioctls touch; `align` pads the union to the
/// kernel's size.
#[repr(C)]
#[derive(Copy, Clone)]
pub(crate) union ifreq_ifru {
    pub(crate) ifru_flags: libc::c_short,
    align: [u64; 3],
}

impl ifreq {
    pub(crate) fn new(name: InterfaceName) -> Self {
        ifreq {
            ifr_name: name,
            ifr_ifru: unsafe { mem::zeroed() },
        }
    }
}
