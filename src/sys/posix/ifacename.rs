use crate::Error;
use delegate::delegate;
use std::ffi::CString;
use std::iter::zip;

/// Kernel interface name: at most `IFNAMSIZ - 1` bytes plus the NUL.
#[repr(transparent)]
#[derive(Copy, Clone, Debug)]
pub(crate) struct InterfaceName([libc::c_char; libc::IFNAMSIZ]);

impl Default for InterfaceName {
    fn default() -> Self {
        Self([0; libc::IFNAMSIZ])
    }
}

impl TryFrom<&str> for InterfaceName {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        // A name that cannot exist in the kernel table is reported as absent.
        if value.is_empty() || value.len() >= libc::IFNAMSIZ {
            return Err(Error::InterfaceNotFound(value.to_string()));
        }
        let cname = CString::new(value).map_err(|_| Error::InvalidParameter)?;

        let mut result = Self::default();
        for (x, y) in zip(result.0.iter_mut(), cname.as_bytes_with_nul()) {
            *x = *y as libc::c_char;
        }
        Ok(result)
    }
}

impl InterfaceName {
    delegate! {
        to self.0 {
            pub(crate) fn as_ptr(&self) -> *const libc::c_char;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let name = InterfaceName::try_from("eth0").unwrap();
        let stored = unsafe { std::ffi::CStr::from_ptr(name.as_ptr()) };
        assert_eq!(stored.to_str().unwrap(), "eth0");
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(matches!(
            InterfaceName::try_from("a-name-longer-than-ifnamsiz"),
            Err(Error::InterfaceNotFound(_))
        ));
        assert!(matches!(
            InterfaceName::try_from(""),
            Err(Error::InterfaceNotFound(_))
        ));
        assert!(matches!(
            InterfaceName::try_from("et\0h"),
            Err(Error::InvalidParameter)
        ));
    }
}
