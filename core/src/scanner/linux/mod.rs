//! Linux socket enumeration from the proc pseudo-filesystem.
//!
//! Runs in two passes: first every process's descriptors are scanned to
//! learn which process holds which socket inode, then the four
//! `/proc/net/*` tables are parsed and each row is joined with its owner.

mod correlate;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::decode::procnet;
use crate::decode::state::procfs_tcp_state;
use crate::domain::{PortRecord, Protocol, UNKNOWN_OWNER};
use crate::error::Result;

use correlate::SocketOwners;

use super::Scanner;

/// Where the proc pseudo-filesystem is normally mounted.
pub const DEFAULT_PROC_ROOT: &str = "/proc";

/// Socket tables, relative to the proc root, in reporting order.
const TABLES: [(&str, Protocol); 4] = [
    ("net/tcp", Protocol::Tcp),
    ("net/tcp6", Protocol::Tcp6),
    ("net/udp", Protocol::Udp),
    ("net/udp6", Protocol::Udp6),
];

/// Linux-specific socket scanner.
#[derive(Debug, Clone)]
pub struct LinuxScanner {
    root: PathBuf,
}

impl LinuxScanner {
    /// Create a scanner reading from `/proc`.
    pub fn new() -> Self {
        Self::with_root(DEFAULT_PROC_ROOT)
    }

    /// Create a scanner reading from another proc root (for testing).
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parse one socket table.
    ///
    /// A table that does not exist (e.g., IPv6 disabled in the kernel) or
    /// cannot be read contributes no rows.
    fn read_table(&self, relative: &str, protocol: Protocol, owners: &SocketOwners) -> Vec<PortRecord> {
        let path = self.root.join(relative);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Skipping socket table");
                return Vec::new();
            }
        };

        let records: Vec<PortRecord> = procnet::parse_table(&content)
            .map(|row| {
                let owner = owners.owner(&row.socket_id).unwrap_or(UNKNOWN_OWNER);

                // UDP rows carry a state code too; `PortRecord::new` drops it.
                PortRecord::new(protocol, row.local, row.remote, procfs_tcp_state(&row.state_code))
                    .with_owner(owner)
                    .with_socket_id(row.socket_id)
            })
            .collect();

        trace!(table = relative, rows = records.len(), "Parsed socket table");
        records
    }
}

impl Default for LinuxScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner for LinuxScanner {
    fn scan(&self) -> Result<Vec<PortRecord>> {
        let owners = SocketOwners::collect(&self.root)?;
        debug!(sockets = owners.len(), "Correlated socket owners");

        Ok(TABLES
            .iter()
            .flat_map(|(relative, protocol)| self.read_table(relative, *protocol, &owners))
            .collect())
    }
}
