//! macOS socket enumeration through `libproc`.
//!
//! There is no system-wide socket table to read, so every process is walked
//! in turn: list its descriptors, keep the sockets, and ask the kernel for a
//! `socket_fdinfo` per socket.

use std::ffi::CStr;
use std::io;

use libc::{c_int, c_void};
use tracing::{debug, trace};

use crate::decode::xnu::{self, SOCKET_INFO_CAPACITY};
use crate::domain::PortRecord;
use crate::error::{Error, Result};
use crate::query::{size_then_fill, Fill, QueryError};

use super::{collect, Scanner};

/// `PROC_ALL_PIDS`, `libproc.h`.
const PROC_ALL_PIDS: u32 = 1;
/// `PROC_PIDLISTFDS`, `sys/proc_info.h`.
const PROC_PIDLISTFDS: c_int = 1;
/// `PROC_PIDFDSOCKETINFO`, `sys/proc_info.h`.
const PROC_PIDFDSOCKETINFO: c_int = 3;

/// Room for `proc_name`; names are at most `2 * MAXCOMLEN` bytes.
const NAME_CAPACITY: usize = 256;

fn last_errno() -> i64 {
    io::Error::last_os_error().raw_os_error().unwrap_or(0) as i64
}

/// Interpret a `libproc` return value for the size-then-fill loop.
///
/// With an empty buffer the kernel returns a size estimate. A filled
/// buffer means the data may have been cut off, so it is doubled.
fn libproc_fill(buf_len: usize, returned: c_int) -> Fill {
    if returned <= 0 {
        return Fill::Failed(last_errno());
    }
    let returned = returned as usize;
    if buf_len == 0 {
        Fill::Grow(returned)
    } else if returned >= buf_len {
        Fill::Grow(buf_len * 2)
    } else {
        Fill::Done(returned)
    }
}

fn buffer_ptr(buf: &mut [u8]) -> *mut c_void {
    if buf.is_empty() {
        std::ptr::null_mut()
    } else {
        buf.as_mut_ptr().cast()
    }
}

/// macOS-specific socket scanner.
#[derive(Debug, Default, Clone, Copy)]
pub struct DarwinScanner;

impl DarwinScanner {
    /// Create a new macOS scanner.
    pub fn new() -> Self {
        Self
    }

    fn list_pids(&self) -> std::result::Result<Vec<i32>, QueryError> {
        let buf = size_then_fill(|buf| {
            let returned = unsafe {
                libc::proc_listpids(PROC_ALL_PIDS, 0, buffer_ptr(buf), buf.len() as c_int)
            };
            libproc_fill(buf.len(), returned)
        })?;
        Ok(xnu::parse_pid_list(&buf))
    }

    fn list_fds(&self, pid: i32) -> std::result::Result<Vec<xnu::FdEntry>, QueryError> {
        let buf = size_then_fill(|buf| {
            let returned = unsafe {
                libc::proc_pidinfo(
                    pid,
                    PROC_PIDLISTFDS,
                    0,
                    buffer_ptr(buf),
                    buf.len() as c_int,
                )
            };
            libproc_fill(buf.len(), returned)
        })?;
        Ok(xnu::parse_fd_list(&buf))
    }

    /// Fetch the raw `socket_fdinfo` for one descriptor.
    fn socket_info(&self, pid: i32, fd: i32) -> std::result::Result<Vec<u8>, QueryError> {
        let mut buf = vec![0u8; SOCKET_INFO_CAPACITY];
        let returned = unsafe {
            libc::proc_pidfdinfo(
                pid,
                fd,
                PROC_PIDFDSOCKETINFO,
                buf.as_mut_ptr().cast(),
                buf.len() as c_int,
            )
        };
        if returned <= 0 {
            return Err(QueryError::Failed { code: last_errno() });
        }
        buf.truncate((returned as usize).min(SOCKET_INFO_CAPACITY));
        Ok(buf)
    }

    /// `"<pid>/<name>"`, or just `"<pid>"` when the name is unavailable.
    fn owner(&self, pid: i32) -> String {
        let mut name = [0u8; NAME_CAPACITY];
        let returned =
            unsafe { libc::proc_name(pid, name.as_mut_ptr().cast(), name.len() as u32) };
        if returned <= 0 {
            return pid.to_string();
        }
        match CStr::from_bytes_until_nul(&name) {
            Ok(name) if !name.to_bytes().is_empty() => {
                format!("{pid}/{}", name.to_string_lossy())
            }
            _ => pid.to_string(),
        }
    }
}

impl Scanner for DarwinScanner {
    fn scan(&self) -> Result<Vec<PortRecord>> {
        let pids = self
            .list_pids()
            .map_err(|e| Error::query("proc_listpids", e))?;
        debug!(processes = pids.len(), "Listed processes");

        let mut records = Vec::new();
        for pid in pids {
            records.extend(collect::process_sockets(
                pid,
                || self.list_fds(pid),
                |fd| self.socket_info(pid, fd),
                || self.owner(pid),
            ));
        }

        trace!(sockets = records.len(), "Decoded sockets");
        Ok(records)
    }
}
