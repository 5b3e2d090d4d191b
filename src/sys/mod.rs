cfg_if::cfg_if! {
    if #[cfg(target_os = "windows")] {
        mod win32;
        pub use win32::*;
    } else if #[cfg(target_os = "linux")] {
        mod linux;
        pub use linux::*;
    } else {
        mod unsupported;
        pub use unsupported::*;
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        pub(crate) mod posix;
    }
}
