//! Socket enumeration with platform-specific implementations.

pub mod collect;

#[cfg(target_os = "macos")]
mod darwin;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "windows")]
mod windows;

use crate::domain::PortRecord;
use crate::error::Result;

#[cfg(target_os = "macos")]
pub use darwin::DarwinScanner;
#[cfg(target_os = "linux")]
pub use linux::{LinuxScanner, DEFAULT_PROC_ROOT};
#[cfg(target_os = "windows")]
pub use windows::WindowsScanner;

/// Trait for platform-specific socket enumeration.
pub trait Scanner: Send + Sync {
    /// List every TCP and UDP socket the OS reports, IPv4 and IPv6.
    ///
    /// Records come back in the provider's reporting order, unfiltered.
    /// Sockets that vanish or cannot be inspected mid-scan are skipped.
    fn scan(&self) -> Result<Vec<PortRecord>>;
}

/// The main socket scanner that uses platform-specific implementations.
pub struct PortScanner {
    #[cfg(target_os = "macos")]
    inner: darwin::DarwinScanner,

    #[cfg(target_os = "linux")]
    inner: linux::LinuxScanner,

    #[cfg(target_os = "windows")]
    inner: windows::WindowsScanner,
}

impl PortScanner {
    /// Create a new scanner for the current platform.
    pub fn new() -> Self {
        Self {
            #[cfg(target_os = "macos")]
            inner: darwin::DarwinScanner::new(),

            #[cfg(target_os = "linux")]
            inner: linux::LinuxScanner::new(),

            #[cfg(target_os = "windows")]
            inner: windows::WindowsScanner::new(),
        }
    }

    /// List the sockets of the current platform.
    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
    pub fn scan(&self) -> Result<Vec<PortRecord>> {
        self.inner.scan()
    }

    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    pub fn scan(&self) -> Result<Vec<PortRecord>> {
        Err(crate::error::Error::UnsupportedPlatform(
            std::env::consts::OS.to_string(),
        ))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// List every socket on this host with its owning process.
///
/// Fails only when enumeration cannot start at all (for example the proc
/// root is unreadable or the PID list query is rejected).
pub fn list_ports() -> Result<Vec<PortRecord>> {
    PortScanner::new().scan()
}
