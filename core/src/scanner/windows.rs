//! Windows socket enumeration through the IP Helper API.
//!
//! `GetExtendedTcpTable` and `GetExtendedUdpTable` return each socket with
//! its owning PID directly, so no descriptor walk is needed. Process names
//! are resolved afterwards, once per PID.

use std::collections::HashMap;
use std::ffi::c_void;
use std::path::Path;

use tracing::debug;
use windows::core::PWSTR;
use windows::Win32::Foundation::{CloseHandle, ERROR_INSUFFICIENT_BUFFER, FALSE, NO_ERROR};
use windows::Win32::NetworkManagement::IpHelper::{
    GetExtendedTcpTable, GetExtendedUdpTable, TCP_TABLE_OWNER_PID_ALL, UDP_TABLE_OWNER_PID,
};
use windows::Win32::System::Threading::{
    OpenProcess, QueryFullProcessImageNameW, PROCESS_NAME_WIN32, PROCESS_QUERY_LIMITED_INFORMATION,
};

use crate::decode::iphlp::TableKind;
use crate::domain::PortRecord;
use crate::error::Result;
use crate::query::{size_then_fill, Fill, QueryError};

use super::{collect, Scanner};

/// `AF_INET`, `ws2def.h`.
const AF_INET: u32 = 2;
/// `AF_INET6`, `ws2def.h`.
const AF_INET6: u32 = 23;

/// Longest image path `QueryFullProcessImageNameW` is given room for.
const IMAGE_PATH_CAPACITY: usize = 1024;

/// Interpret an IP Helper status for the size-then-fill loop.
///
/// `size` is the byte count the call wrote back.
fn iphlp_fill(status: u32, size: u32) -> Fill {
    if status == NO_ERROR.0 {
        Fill::Done(size as usize)
    } else if status == ERROR_INSUFFICIENT_BUFFER.0 {
        Fill::Grow(size as usize)
    } else {
        Fill::Failed(status as i64)
    }
}

fn buffer_ptr(buf: &mut [u8]) -> Option<*mut c_void> {
    if buf.is_empty() {
        None
    } else {
        Some(buf.as_mut_ptr().cast())
    }
}

/// Windows-specific socket scanner.
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsScanner;

impl WindowsScanner {
    /// Create a new Windows scanner.
    pub fn new() -> Self {
        Self
    }

    /// Fetch one owner-PID table as raw bytes.
    fn fetch_table(&self, kind: TableKind) -> std::result::Result<Vec<u8>, QueryError> {
        let family = if kind.is_ipv6() { AF_INET6 } else { AF_INET };

        size_then_fill(|buf| {
            let mut size = buf.len() as u32;
            let status = unsafe {
                if kind.is_tcp() {
                    GetExtendedTcpTable(
                        buffer_ptr(buf),
                        &mut size,
                        FALSE,
                        family,
                        TCP_TABLE_OWNER_PID_ALL,
                        0,
                    )
                } else {
                    GetExtendedUdpTable(
                        buffer_ptr(buf),
                        &mut size,
                        FALSE,
                        family,
                        UDP_TABLE_OWNER_PID,
                        0,
                    )
                }
            };
            iphlp_fill(status, size)
        })
    }
}

/// Full image path of a process, if it can be opened.
fn image_path(pid: u32) -> Option<String> {
    let handle = unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, FALSE, pid) }.ok()?;

    let mut path = vec![0u16; IMAGE_PATH_CAPACITY];
    let mut len = path.len() as u32;
    let queried = unsafe {
        QueryFullProcessImageNameW(
            handle,
            PROCESS_NAME_WIN32,
            PWSTR(path.as_mut_ptr()),
            &mut len,
        )
    };
    let _ = unsafe { CloseHandle(handle) };

    queried.ok()?;
    path.truncate(len as usize);
    Some(String::from_utf16_lossy(&path))
}

/// Owner strings resolved during one scan.
#[derive(Debug, Default)]
struct OwnerCache {
    by_pid: HashMap<u32, String>,
}

impl OwnerCache {
    /// `"<pid>/<image basename>"`, or `"<pid>"` when the process cannot be
    /// opened (system processes, exited processes, access denied).
    fn owner(&mut self, pid: u32) -> &str {
        self.by_pid.entry(pid).or_insert_with(|| {
            let name = image_path(pid).and_then(|path| {
                Path::new(&path)
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            });
            match name {
                Some(name) => format!("{pid}/{name}"),
                None => pid.to_string(),
            }
        })
    }
}

impl Scanner for WindowsScanner {
    fn scan(&self) -> Result<Vec<PortRecord>> {
        let mut owners = OwnerCache::default();
        let records = collect::owner_tables(
            |kind| self.fetch_table(kind),
            |pid| owners.owner(pid).to_string(),
        );

        debug!(sockets = records.len(), processes = owners.by_pid.len(), "Listed sockets");
        Ok(records)
    }
}
