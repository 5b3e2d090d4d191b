#![allow(non_snake_case)]
//! IP Helper entry points, resolved once from `iphlpapi.dll` when the
//! backend is built.

use crate::{Config, Error};
use log::debug;
use std::ffi::c_void;
use std::io::{self, ErrorKind};
use std::net::Ipv4Addr;
use std::{mem, slice};
use windows::core::PCSTR;
use windows::Win32::Foundation::HINSTANCE;
use windows::Win32::NetworkManagement::IpHelper::{
    IP_ADAPTER_ADDRESSES_LH, MIB_UNICASTIPADDRESS_ROW,
};
use windows::Win32::System::LibraryLoader::{FreeLibrary, GetProcAddress, LoadLibraryW};

const LIBRARY: &str = "iphlpapi.dll";

pub(super) const NO_ERROR: u32 = 0;
pub(super) const ERROR_INSUFFICIENT_BUFFER: u32 = 122;
pub(super) const ERROR_BUFFER_OVERFLOW: u32 = 111;
pub(super) const ERROR_NO_DATA: u32 = 232;
pub(super) const ERROR_NOT_FOUND: u32 = 1168;

pub(super) const AF_UNSPEC: u32 = 0;
pub(super) const GAA_FLAG_INCLUDE_GATEWAYS: u32 = 0x0080;
pub(super) const GAA_FLAG_INCLUDE_ALL_INTERFACES: u32 = 0x0100;

/// `MIB_IPADDRROW`.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub(super) struct IpAddrRow {
    pub(super) dwAddr: u32,
    pub(super) dwIndex: u32,
    pub(super) dwMask: u32,
    pub(super) dwBCastAddr: u32,
    pub(super) dwReasmSize: u32,
    pub(super) unused1: u16,
    pub(super) wType: u16,
}

/// `MIB_IPFORWARDROW`.
#[repr(C)]
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub(super) struct IpForwardRow {
    pub(super) dwForwardDest: u32,
    pub(super) dwForwardMask: u32,
    pub(super) dwForwardPolicy: u32,
    pub(super) dwForwardNextHop: u32,
    pub(super) dwForwardIfIndex: u32,
    pub(super) dwForwardType: u32,
    pub(super) dwForwardProto: u32,
    pub(super) dwForwardAge: u32,
    pub(super) dwForwardNextHopAS: u32,
    pub(super) dwForwardMetric1: u32,
    pub(super) dwForwardMetric2: u32,
    pub(super) dwForwardMetric3: u32,
    pub(super) dwForwardMetric4: u32,
    pub(super) dwForwardMetric5: u32,
}

pub(super) const MIB_IPROUTE_TYPE_INDIRECT: u32 = 4;
pub(super) const MIB_IPPROTO_NETMGMT: u32 = 3;

type AddIpAddressFn = unsafe extern "system" fn(u32, u32, u32, *mut u32, *mut u32) -> u32;
type GetTableFn = unsafe extern "system" fn(*mut c_void, *mut u32, i32) -> u32;
type UnicastEntryFn = unsafe extern "system" fn(*const MIB_UNICASTIPADDRESS_ROW) -> u32;
type ForwardEntryFn = unsafe extern "system" fn(*const IpForwardRow) -> u32;
type GetAdaptersAddressesFn =
    unsafe extern "system" fn(u32, u32, *mut c_void, *mut IP_ADAPTER_ADDRESSES_LH, *mut u32) -> u32;

pub(super) struct Iphlpapi {
    module: HINSTANCE,
    add_ip_address: AddIpAddressFn,
    get_ip_addr_table: GetTableFn,
    create_unicast_entry: UnicastEntryFn,
    delete_unicast_entry: UnicastEntryFn,
    get_ip_forward_table: GetTableFn,
    create_ip_forward_entry: ForwardEntryFn,
    delete_ip_forward_entry: ForwardEntryFn,
    get_adapters_addresses: GetAdaptersAddressesFn,
}

unsafe fn symbol<F: Copy>(module: HINSTANCE, name: &'static str) -> Result<F, Error> {
    debug_assert!(name.ends_with('\0'));
    match GetProcAddress(module, PCSTR(name.as_ptr())) {
        Some(f) => Ok(mem::transmute_copy(&f)),
        None => Err(io::Error::new(
            ErrorKind::NotFound,
            format!("{LIBRARY} has no {}", name.trim_end_matches('\0')),
        )
        .into()),
    }
}

impl Iphlpapi {
    /// Fails if the library or any entry point is missing.
    pub(super) fn load() -> Result<Self, Error> {
        let module = unsafe { LoadLibraryW(LIBRARY)? };
        let module = scopeguard::guard(module, |module| unsafe {
            FreeLibrary(module);
        });

        let (add_ip_address, get_ip_addr_table) = unsafe {
            (
                symbol(*module, "AddIPAddress\0")?,
                symbol(*module, "GetIpAddrTable\0")?,
            )
        };
        let (create_unicast_entry, delete_unicast_entry) = unsafe {
            (
                symbol(*module, "CreateUnicastIpAddressEntry\0")?,
                symbol(*module, "DeleteUnicastIpAddressEntry\0")?,
            )
        };
        let (get_ip_forward_table, create_ip_forward_entry, delete_ip_forward_entry) = unsafe {
            (
                symbol(*module, "GetIpForwardTable\0")?,
                symbol(*module, "CreateIpForwardEntry\0")?,
                symbol(*module, "DeleteIpForwardEntry\0")?,
            )
        };
        let get_adapters_addresses = unsafe { symbol(*module, "GetAdaptersAddresses\0")? };
        debug!("Resolved IP Helper entry points from {LIBRARY}");

        Ok(Self {
            module: scopeguard::ScopeGuard::into_inner(module),
            add_ip_address,
            get_ip_addr_table,
            create_unicast_entry,
            delete_unicast_entry,
            get_ip_forward_table,
            create_ip_forward_entry,
            delete_ip_forward_entry,
            get_adapters_addresses,
        })
    }

    pub(super) fn add_ip_address(
        &self,
        address: Ipv4Addr,
        mask: Ipv4Addr,
        index: u32,
    ) -> Result<(), Error> {
        let mut context = 0;
        let mut instance = 0;
        check(unsafe {
            (self.add_ip_address)(
                in_addr(address),
                in_addr(mask),
                index,
                &mut context,
                &mut instance,
            )
        })?;
        debug!("AddIPAddress {address}/{mask} on #{index}: context {context}");
        Ok(())
    }

    pub(super) fn ip_addr_table(&self, config: &Config) -> Result<Vec<IpAddrRow>, Error> {
        let buffer = sized_query(config, |buf, size| unsafe {
            (self.get_ip_addr_table)(buf, size, 0)
        })?;
        Ok(buffer.map(|b| unsafe { table_rows(&b) }).unwrap_or_default())
    }

    pub(super) fn create_unicast_entry(&self, row: &MIB_UNICASTIPADDRESS_ROW) -> Result<(), Error> {
        check(unsafe { (self.create_unicast_entry)(row) })
    }

    pub(super) fn delete_unicast_entry(&self, row: &MIB_UNICASTIPADDRESS_ROW) -> Result<(), Error> {
        check(unsafe { (self.delete_unicast_entry)(row) })
    }

    pub(super) fn ip_forward_table(&self, config: &Config) -> Result<Vec<IpForwardRow>, Error> {
        let buffer = sized_query(config, |buf, size| unsafe {
            (self.get_ip_forward_table)(buf, size, 0)
        })?;
        Ok(buffer.map(|b| unsafe { table_rows(&b) }).unwrap_or_default())
    }

    pub(super) fn create_ip_forward_entry(&self, row: &IpForwardRow) -> Result<(), Error> {
        check(unsafe { (self.create_ip_forward_entry)(row) })
    }

    pub(super) fn delete_ip_forward_entry(&self, row: &IpForwardRow) -> Result<(), Error> {
        check(unsafe { (self.delete_ip_forward_entry)(row) })
    }

    /// Raw `IP_ADAPTER_ADDRESSES_LH` list; `None` if the host has no adapters.
    pub(super) fn adapters_addresses(&self, config: &Config) -> Result<Option<Vec<u64>>, Error> {
        sized_query(config, |buf, size| unsafe {
            (self.get_adapters_addresses)(
                AF_UNSPEC,
                GAA_FLAG_INCLUDE_GATEWAYS | GAA_FLAG_INCLUDE_ALL_INTERFACES,
                std::ptr::null_mut(),
                buf.cast(),
                size,
            )
        })
    }
}

impl Drop for Iphlpapi {
    fn drop(&mut self) {
        unsafe {
            FreeLibrary(self.module);
        }
    }
}

pub(super) fn check(code: u32) -> Result<(), Error> {
    match code {
        NO_ERROR => Ok(()),
        code => Err(io::Error::from_raw_os_error(code as i32).into()),
    }
}

pub(super) fn os_code(e: &Error) -> Option<u32> {
    match e {
        Error::Os(e) => e.raw_os_error().map(|code| code as u32),
        _ => None,
    }
}

/// `IPAddr` keeps the octets in network order.
pub(super) fn in_addr(address: Ipv4Addr) -> u32 {
    u32::from_ne_bytes(address.octets())
}

pub(super) fn from_in_addr(address: u32) -> Ipv4Addr {
    Ipv4Addr::from(address.to_ne_bytes())
}

/// Runs a size-negotiated table query, doubling the buffer while the OS
/// reports it as too small. `None` means the OS has no data to return.
///
/// The buffer is made of `u64` so that the 8-byte aligned adapter records
/// can be read in place.
pub(super) fn sized_query<F>(config: &Config, mut query: F) -> Result<Option<Vec<u64>>, Error>
where
    F: FnMut(*mut c_void, *mut u32) -> u32,
{
    let mut size = config.table_buffer_initial.max(mem::size_of::<u64>());
    loop {
        let mut buffer = vec![0u64; (size + 7) / 8];
        let mut len = (buffer.len() * mem::size_of::<u64>()) as u32;

        match query(buffer.as_mut_ptr().cast(), &mut len) {
            NO_ERROR => return Ok(Some(buffer)),
            ERROR_NO_DATA => return Ok(None),
            ERROR_BUFFER_OVERFLOW | ERROR_INSUFFICIENT_BUFFER => {
                size *= 2;
                if size > config.table_buffer_max {
                    return Err(io::Error::from_raw_os_error(ERROR_BUFFER_OVERFLOW as i32).into());
                }
                debug!("Table needs {len} bytes, retrying with {size}");
            }
            code => return Err(io::Error::from_raw_os_error(code as i32).into()),
        }
    }
}

/// Rows of a `dwNumEntries`-prefixed MIB table.
///
/// # Safety
/// `buffer` must hold a table of `R` as filled by the OS.
pub(super) unsafe fn table_rows<R: Copy>(buffer: &[u64]) -> Vec<R> {
    let bytes = buffer.len() * mem::size_of::<u64>();
    if bytes < mem::size_of::<u32>() {
        return vec![];
    }
    let base = buffer.as_ptr() as *const u8;
    let count = *(base as *const u32) as usize;
    let capacity = (bytes - mem::size_of::<u32>()) / mem::size_of::<R>();

    slice::from_raw_parts(base.add(mem::size_of::<u32>()) as *const R, count.min(capacity)).to_vec()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_in_addr_is_network_order() {
        let address = Ipv4Addr::new(192, 168, 1, 10);
        let raw = in_addr(address);
        assert_eq!(raw.to_ne_bytes(), [192, 168, 1, 10]);
        assert_eq!(from_in_addr(raw), address);
    }

    #[test]
    fn test_sized_query_doubles() {
        let config = Config::default();
        let mut sizes = vec![];
        let buffer = sized_query(&config, |_, size| {
            let offered = unsafe { *size };
            sizes.push(offered);
            match offered {
                s if s < 4096 => {
                    unsafe { *size = 4096 };
                    ERROR_BUFFER_OVERFLOW
                }
                _ => NO_ERROR,
            }
        })
        .unwrap()
        .unwrap();

        assert_eq!(sizes, [1024, 2048, 4096]);
        assert_eq!(buffer.len() * 8, 4096);
    }

    #[test]
    fn test_sized_query_is_bounded() {
        let config = Config::default();
        let mut calls = 0;
        let err = sized_query(&config, |_, _| {
            calls += 1;
            ERROR_INSUFFICIENT_BUFFER
        })
        .unwrap_err();

        assert_eq!(os_code(&err), Some(ERROR_BUFFER_OVERFLOW));
        // 1 KiB .. 128 KiB
        assert_eq!(calls, 8);
    }

    #[test]
    fn test_sized_query_no_data() {
        let config = Config::default();
        assert!(sized_query(&config, |_, _| ERROR_NO_DATA).unwrap().is_none());
        assert!(matches!(
            sized_query(&config, |_, _| 5),
            Err(Error::Os(e)) if e.raw_os_error() == Some(5)
        ));
    }

    #[test]
    fn test_table_rows() {
        let row = IpAddrRow {
            dwAddr: in_addr(Ipv4Addr::new(10, 0, 0, 5)),
            dwIndex: 7,
            dwMask: in_addr(Ipv4Addr::new(255, 255, 255, 0)),
            ..Default::default()
        };

        let mut buffer = vec![0u64; 8];
        unsafe {
            let base = buffer.as_mut_ptr() as *mut u8;
            *(base as *mut u32) = 1;
            *(base.add(4) as *mut IpAddrRow) = row;
        }
        assert_eq!(unsafe { table_rows::<IpAddrRow>(&buffer) }, vec![row]);

        // A count larger than the buffer is clamped.
        unsafe { *(buffer.as_mut_ptr() as *mut u32) = 100 };
        assert_eq!(unsafe { table_rows::<IpAddrRow>(&buffer) }.len(), 2);
    }
}
