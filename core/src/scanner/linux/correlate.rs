//! Socket inode to owning process correlation.
//!
//! Every open descriptor of a process shows up under `<root>/<pid>/fd/` as a
//! symlink. Sockets link to `socket:[<inode>]`, and that inode is the last
//! column of the `/proc/net/*` tables.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::trace;

use crate::error::Result;

fn socket_link_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^socket:\[(\d+)\]$").expect("socket link pattern is valid"))
}

/// Extract the inode from a descriptor link target like `socket:[12345]`.
pub fn socket_inode(link: &str) -> Option<&str> {
    socket_link_pattern()
        .captures(link)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Map from socket inode to `"<pid>/<process-name>"`.
#[derive(Debug, Default)]
pub struct SocketOwners {
    by_inode: HashMap<String, String>,
}

impl SocketOwners {
    /// Scan every process directory under `root`.
    ///
    /// Only failing to list `root` itself is an error. Processes whose
    /// descriptors cannot be read are skipped.
    pub fn collect(root: &Path) -> Result<Self> {
        let mut owners = Self::default();

        for entry in fs::read_dir(root)?.flatten() {
            let name = entry.file_name();
            let Some(pid) = name.to_str().filter(|s| s.bytes().all(|b| b.is_ascii_digit())) else {
                continue;
            };
            owners.scan_process(&entry.path(), pid);
        }

        Ok(owners)
    }

    fn scan_process(&mut self, dir: &Path, pid: &str) {
        let fds = match fs::read_dir(dir.join("fd")) {
            Ok(fds) => fds,
            Err(e) => {
                // Permission denied, or the process exited mid-scan.
                trace!(pid, error = %e, "Skipping process descriptors");
                return;
            }
        };

        let name = fs::read_to_string(dir.join("comm"))
            .map(|comm| comm.trim().to_string())
            .unwrap_or_default();
        let owner = format!("{pid}/{name}");

        for fd in fds.flatten() {
            let Ok(target) = fs::read_link(fd.path()) else {
                continue;
            };
            if let Some(inode) = socket_inode(&target.to_string_lossy()) {
                self.by_inode.insert(inode.to_string(), owner.clone());
            }
        }
    }

    /// Owner of the socket with this inode, if any process holds it.
    pub fn owner(&self, socket_id: &str) -> Option<&str> {
        self.by_inode.get(socket_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_inode.len()
    }
}
