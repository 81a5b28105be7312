//! Ports Core Library
//!
//! Cross-platform enumeration of the host's open TCP and UDP sockets, IPv4
//! and IPv6, each paired with the process that owns it.
//!
//! # Architecture
//! - `domain`: the normalized socket record, protocol tags and filters
//! - `scanner`: one provider per OS behind the [`Scanner`] trait
//! - `decode`: OS-independent decoders for the text and binary layouts the
//!   providers receive
//! - `query`: the size-then-fill buffer convention shared by binary queries
//!
//! # Platform Support
//! - Linux: reads `/proc/net/{tcp,tcp6,udp,udp6}` and correlates socket
//!   inodes with `/proc/<pid>/fd`
//! - macOS: walks every process with `libproc` (`proc_pidfdinfo`)
//! - Windows: reads the IP Helper owner-PID tables
//!
//! # Example
//! ```no_run
//! use ports_core::{filter_ports, list_ports, PortFilter};
//!
//! let records = list_ports()?;
//! for record in filter_ports(&records, &PortFilter::new().with_listening_only(true)) {
//!     println!("{record}");
//! }
//! # Ok::<(), ports_core::Error>(())
//! ```

pub mod decode;
pub mod domain;
pub mod error;
pub mod query;
pub mod scanner;

pub use domain::{filter_ports, PortFilter, PortRecord, Protocol, UNKNOWN_OWNER};
pub use error::{Error, Result};
pub use scanner::{list_ports, PortScanner, Scanner};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
