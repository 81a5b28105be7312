//! Record assembly for providers that query the OS through binary calls.
//!
//! The OS calls are passed in as closures, so which failures are skipped
//! and which records survive does not depend on the FFI and is compiled on
//! every target.

use tracing::debug;

use crate::decode::iphlp::{self, TableKind};
use crate::decode::xnu::{self, FdEntry, SocketKind};
use crate::domain::{PortRecord, Protocol};
use crate::query::QueryError;

/// Build records from the four IP Helper owner-PID tables.
///
/// `fetch` returns the raw bytes of one table and `owner` renders the owner
/// of a PID. A table that cannot be fetched or decoded contributes no
/// records; the others still do.
pub fn owner_tables<F, O>(mut fetch: F, mut owner: O) -> Vec<PortRecord>
where
    F: FnMut(TableKind) -> Result<Vec<u8>, QueryError>,
    O: FnMut(u32) -> String,
{
    let mut records = Vec::new();

    for kind in TableKind::ALL {
        let buf = match fetch(kind) {
            Ok(buf) => buf,
            Err(e) => {
                debug!(table = ?kind, error = %e, "Skipping socket table");
                continue;
            }
        };

        let rows = match iphlp::parse_table(&buf, kind) {
            Ok(rows) => rows,
            Err(e) => {
                debug!(table = ?kind, error = %e, "Dropping undecodable socket table");
                continue;
            }
        };

        let protocol = Protocol::new(kind.is_tcp(), kind.is_ipv6());
        records.extend(rows.into_iter().map(|row| {
            PortRecord::new(protocol, row.local, row.remote, row.state).with_owner(owner(row.pid))
        }));
    }

    records
}

/// Build the records for the sockets of one process.
///
/// `list_fds` lists the descriptors of `pid`, `socket_info` fetches the raw
/// `socket_fdinfo` of one descriptor, and `owner` renders the process
/// owner. `owner` is only called if the process has at least one socket.
///
/// A failing descriptor list drops the process. A failing or undecodable
/// descriptor drops that descriptor only.
pub fn process_sockets<L, S, O>(
    pid: i32,
    list_fds: L,
    mut socket_info: S,
    mut owner: O,
) -> Vec<PortRecord>
where
    L: FnOnce() -> Result<Vec<FdEntry>, QueryError>,
    S: FnMut(i32) -> Result<Vec<u8>, QueryError>,
    O: FnMut() -> String,
{
    let fds = match list_fds() {
        Ok(fds) => fds,
        Err(e) => {
            // Permission denied, or the process exited mid-scan.
            debug!(pid, error = %e, "Skipping process descriptors");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    let mut name: Option<String> = None;

    for entry in fds.iter().filter(|entry| entry.is_socket()) {
        let info = match socket_info(entry.fd) {
            Ok(info) => info,
            Err(e) => {
                debug!(pid, fd = entry.fd, error = %e, "Skipping socket descriptor");
                continue;
            }
        };

        let socket = match xnu::parse_socket_info(&info) {
            Ok(Some(socket)) => socket,
            Ok(None) => continue,
            Err(e) => {
                debug!(pid, fd = entry.fd, error = %e, "Dropping undecodable socket");
                continue;
            }
        };

        let name = name.get_or_insert_with(&mut owner);
        let protocol = Protocol::new(socket.kind == SocketKind::Tcp, socket.ipv6);
        records.push(
            PortRecord::new(protocol, socket.local, socket.remote, socket.state)
                .with_owner(name.as_str())
                .with_socket_id(format!("{pid}:{}", entry.fd)),
        );
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::xnu::{
        AF_INET, AF_INET6, FAMILY_OFFSET, FDTYPE_SOCKET, KIND_OFFSET, PROTO_OFFSET,
        SOCKET_INFO_CAPACITY, SOCKINFO_TCP, SOCKINFO_UDP, TCP_STATE_OFFSET,
    };

    // ------------------------------------------------------------------
    // IP Helper tables
    // ------------------------------------------------------------------

    fn port_field(port: u16) -> [u8; 4] {
        let be = port.to_be_bytes();
        [be[0], be[1], 0, 0]
    }

    fn table(rows: &[Vec<u8>]) -> Vec<u8> {
        let mut buf = (rows.len() as u32).to_le_bytes().to_vec();
        for row in rows {
            buf.extend_from_slice(row);
        }
        buf
    }

    fn tcp4_listen(port: u16, pid: u32) -> Vec<u8> {
        let mut row = Vec::new();
        row.extend_from_slice(&2u32.to_le_bytes());
        row.extend_from_slice(&[0, 0, 0, 0]);
        row.extend_from_slice(&port_field(port));
        row.extend_from_slice(&[0, 0, 0, 0]);
        row.extend_from_slice(&port_field(0));
        row.extend_from_slice(&pid.to_le_bytes());
        row
    }

    fn udp4(port: u16, pid: u32) -> Vec<u8> {
        let mut row = Vec::new();
        row.extend_from_slice(&[0, 0, 0, 0]);
        row.extend_from_slice(&port_field(port));
        row.extend_from_slice(&pid.to_le_bytes());
        row
    }

    fn udp6(port: u16, pid: u32) -> Vec<u8> {
        let mut row = Vec::new();
        row.extend_from_slice(&std::net::Ipv6Addr::LOCALHOST.octets());
        row.extend_from_slice(&0u32.to_le_bytes());
        row.extend_from_slice(&port_field(port));
        row.extend_from_slice(&pid.to_le_bytes());
        row
    }

    fn healthy_table(kind: TableKind) -> Vec<u8> {
        match kind {
            TableKind::Tcp4 => table(&[tcp4_listen(135, 1020)]),
            TableKind::Tcp6 => table(&[]),
            TableKind::Udp4 => table(&[udp4(5353, 812)]),
            TableKind::Udp6 => table(&[udp6(53, 812)]),
        }
    }

    #[test]
    fn test_failed_table_is_skipped() {
        let mut fetched = Vec::new();
        let records = owner_tables(
            |kind| {
                fetched.push(kind);
                if kind == TableKind::Tcp4 {
                    return Err(QueryError::Failed { code: 87 });
                }
                Ok(healthy_table(kind))
            },
            |pid| pid.to_string(),
        );

        assert_eq!(fetched, TableKind::ALL.to_vec());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].protocol, Protocol::Udp);
        assert_eq!(records[0].local, "0.0.0.0:5353");
        assert_eq!(records[0].owner, "812");
        assert_eq!(records[1].protocol, Protocol::Udp6);
        assert_eq!(records[1].local, "[::1]:53");
    }

    #[test]
    fn test_truncated_table_is_skipped() {
        let records = owner_tables(
            |kind| match kind {
                TableKind::Udp4 => Ok(vec![1, 0]),
                _ => Ok(healthy_table(kind)),
            },
            |pid| format!("{pid}/svchost.exe"),
        );

        let protocols: Vec<Protocol> = records.iter().map(|r| r.protocol).collect();
        assert_eq!(protocols, vec![Protocol::Tcp, Protocol::Udp6]);
        assert_eq!(records[0].state, "LISTEN");
        assert_eq!(records[0].owner, "1020/svchost.exe");
    }

    #[test]
    fn test_every_table_failing_yields_nothing() {
        let records = owner_tables(
            |_| Err(QueryError::Unstable { attempts: 4 }),
            |pid| pid.to_string(),
        );
        assert!(records.is_empty());
    }

    // ------------------------------------------------------------------
    // libproc process walk
    // ------------------------------------------------------------------

    fn socket_buffer(family: u32, kind: u32, local_port: u16) -> Vec<u8> {
        let mut buf = vec![0u8; SOCKET_INFO_CAPACITY];
        buf[FAMILY_OFFSET..FAMILY_OFFSET + 4].copy_from_slice(&family.to_le_bytes());
        buf[KIND_OFFSET..KIND_OFFSET + 4].copy_from_slice(&kind.to_le_bytes());
        // Local port sits right after the foreign port in `in_sockinfo`.
        buf[PROTO_OFFSET + 2..PROTO_OFFSET + 4].copy_from_slice(&local_port.to_be_bytes());
        buf
    }

    fn fd(fd: i32, fd_type: u32) -> FdEntry {
        FdEntry { fd, fd_type }
    }

    #[test]
    fn test_failing_descriptors_do_not_drop_siblings() {
        let fds = vec![
            fd(0, 1),
            fd(3, FDTYPE_SOCKET),
            fd(4, FDTYPE_SOCKET),
            fd(5, FDTYPE_SOCKET),
            fd(6, FDTYPE_SOCKET),
        ];
        let mut queried = Vec::new();

        let records = process_sockets(
            312,
            || Ok(fds),
            |fd| {
                queried.push(fd);
                match fd {
                    3 => {
                        let mut buf = socket_buffer(AF_INET, SOCKINFO_TCP, 8080);
                        buf[TCP_STATE_OFFSET..TCP_STATE_OFFSET + 4]
                            .copy_from_slice(&1u32.to_le_bytes());
                        Ok(buf)
                    }
                    // The socket was closed between listing and querying.
                    4 => Err(QueryError::Failed { code: 9 }),
                    // Too short to hold the socket family.
                    5 => Ok(vec![0u8; 100]),
                    _ => Ok(socket_buffer(AF_INET6, SOCKINFO_UDP, 5353)),
                }
            },
            || "312/mDNSResponder".to_string(),
        );

        assert_eq!(queried, vec![3, 4, 5, 6]);
        assert_eq!(records.len(), 2);

        assert_eq!(records[0].protocol, Protocol::Tcp);
        assert_eq!(records[0].local, "0.0.0.0:8080");
        assert_eq!(records[0].state, "LISTEN");
        assert_eq!(records[0].socket_id, "312:3");

        assert_eq!(records[1].protocol, Protocol::Udp6);
        assert_eq!(records[1].local, "[::]:5353");
        assert_eq!(records[1].remote, "*:*");
        assert_eq!(records[1].owner, "312/mDNSResponder");
        assert_eq!(records[1].socket_id, "312:6");
    }

    #[test]
    fn test_failing_descriptor_list_drops_process() {
        let mut info_calls = 0;
        let mut owner_calls = 0;

        let records = process_sockets(
            1,
            || Err(QueryError::Failed { code: 1 }),
            |_| {
                info_calls += 1;
                Ok(Vec::new())
            },
            || {
                owner_calls += 1;
                "1/launchd".to_string()
            },
        );

        assert!(records.is_empty());
        assert_eq!(info_calls, 0);
        assert_eq!(owner_calls, 0);
    }

    #[test]
    fn test_owner_resolved_once_per_process() {
        let mut owner_calls = 0;
        let records = process_sockets(
            77,
            || Ok(vec![fd(3, FDTYPE_SOCKET), fd(4, FDTYPE_SOCKET)]),
            |_| Ok(socket_buffer(AF_INET, SOCKINFO_UDP, 123)),
            || {
                owner_calls += 1;
                "77".to_string()
            },
        );

        assert_eq!(records.len(), 2);
        assert_eq!(owner_calls, 1);
        assert!(records.iter().all(|r| r.owner == "77"));
    }

    #[test]
    fn test_non_inet_sockets_skip_owner_lookup() {
        let mut owner_calls = 0;
        let records = process_sockets(
            90,
            || Ok(vec![fd(3, FDTYPE_SOCKET)]),
            // AF_UNIX
            |_| Ok(socket_buffer(1, SOCKINFO_TCP, 0)),
            || {
                owner_calls += 1;
                "90".to_string()
            },
        );

        assert!(records.is_empty());
        assert_eq!(owner_calls, 0);
    }
}
