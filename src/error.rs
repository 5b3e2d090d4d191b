use std::io;
use thiserror::Error as ThisError;
#[cfg(target_os = "windows")]
use widestring::error::Utf16Error;

#[non_exhaustive]
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("invalid parameter")]
    InvalidParameter,
    #[error("invalid format: {0:?}")]
    InvalidFormat(String),
    #[error("unexpected metadata")]
    UnexpectedMetadata,
    #[error("interface {0:?} not found")]
    InterfaceNotFound(String),
    #[error("{0} not found")]
    EntryNotFound(String),
    #[error("not supported: {0}")]
    Unsupported(&'static str),
    #[error("OS error: {0}")]
    Os(io::Error),
    #[error("message bus error: {0}")]
    Bus(String),
    #[error("{program} exited with {code:?}: {output}")]
    Command {
        program: String,
        code: Option<i32>,
        output: String,
    },
}

impl Error {
    /// True for both a missing interface and a missing address/DNS entry.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::InterfaceNotFound(_) | Self::EntryNotFound(_))
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Os(e)
    }
}

#[cfg(target_os = "linux")]
impl From<nix::Error> for Error {
    fn from(e: nix::Error) -> Self {
        Self::Os(io::Error::from(e))
    }
}

#[cfg(target_os = "linux")]
impl From<zbus::Error> for Error {
    fn from(e: zbus::Error) -> Self {
        Self::Bus(e.to_string())
    }
}

#[cfg(target_os = "linux")]
impl From<zbus::fdo::Error> for Error {
    fn from(e: zbus::fdo::Error) -> Self {
        Self::Bus(e.to_string())
    }
}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for Error {
    fn from(e: windows::core::Error) -> Self {
        Self::Os(io::Error::from_raw_os_error(e.code().0))
    }
}

#[cfg(target_os = "windows")]
impl From<Utf16Error> for Error {
    fn from(_: Utf16Error) -> Self {
        Self::UnexpectedMetadata
    }
}
