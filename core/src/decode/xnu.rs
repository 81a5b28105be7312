//! Buffers returned by the XNU `proc_info` family of queries.
//!
//! Offsets come from `bsd/sys/proc_info.h` in the XNU sources for 64-bit
//! macOS. The header is not a stable ABI: `struct socket_fdinfo` has grown
//! across releases, so these constants describe one observed layout and a
//! different kernel may need different values.

use std::net::IpAddr;

use super::state::{xnu_tcp_state, STATELESS};
use super::{endpoint, ByteReader, DecodeError, UNKNOWN_ENDPOINT};

/// `sizeof(struct proc_fdinfo)`: `int32_t proc_fd; uint32_t proc_fdtype`.
pub const FDINFO_SIZE: usize = 8;

/// `PROX_FDTYPE_SOCKET`.
pub const FDTYPE_SOCKET: u32 = 2;

/// Capacity handed to `proc_pidfdinfo(PROC_PIDFDSOCKETINFO)`.
///
/// `struct socket_fdinfo` is 1200-1500 bytes depending on the release.
pub const SOCKET_INFO_CAPACITY: usize = 2048;

/// `psi.soi_family`: after the 32-byte `proc_fileinfo`, the 64-byte
/// `vinfo_stat`, `soi_so`, `soi_pcb`, `soi_type` and `soi_protocol`.
pub const FAMILY_OFFSET: usize = 120;

/// `psi.soi_kind`.
pub const KIND_OFFSET: usize = 192;

/// Start of the `soi_proto` union (`in_sockinfo` / `tcp_sockinfo`).
pub const PROTO_OFFSET: usize = 196;

/// Bytes of `in_sockinfo` covered by the address decode.
pub const IN_SOCKINFO_SIZE: usize = 104;

/// `tcpsi_state`, directly after `tcpsi_ini`.
pub const TCP_STATE_OFFSET: usize = PROTO_OFFSET + IN_SOCKINFO_SIZE;

/// Offsets within `in_sockinfo`.
const FOREIGN_PORT: usize = 0;
const LOCAL_PORT: usize = 2;
const LOCAL_ADDR: usize = 4;
const FOREIGN_ADDR: usize = 20;

/// `AF_INET`, `bsd/sys/socket.h`.
pub const AF_INET: u32 = 2;
/// `AF_INET6`, `bsd/sys/socket.h`.
pub const AF_INET6: u32 = 30;

/// `SOCKINFO_TCP`.
pub const SOCKINFO_TCP: u32 = 2;
/// `SOCKINFO_UDP`.
pub const SOCKINFO_UDP: u32 = 3;

/// One entry of a `PROC_PIDLISTFDS` result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdEntry {
    pub fd: i32,
    pub fd_type: u32,
}

impl FdEntry {
    pub fn is_socket(&self) -> bool {
        self.fd_type == FDTYPE_SOCKET
    }
}

/// Transport decoded from `soi_kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    Tcp,
    Udp,
}

/// A socket decoded from a `socket_fdinfo` buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XnuSocket {
    pub kind: SocketKind,
    pub ipv6: bool,
    pub local: String,
    pub remote: String,
    pub state: String,
}

/// Decode a `PROC_ALL_PIDS` result: little-endian `pid_t` values.
///
/// The kernel may leave zeroed slots at the end of the buffer; those are
/// dropped.
pub fn parse_pid_list(buf: &[u8]) -> Vec<i32> {
    let reader = ByteReader::new(buf);
    (0..buf.len() / 4)
        .filter_map(|i| reader.i32_le(i * 4).ok())
        .filter(|&pid| pid > 0)
        .collect()
}

/// Decode a `PROC_PIDLISTFDS` result.
pub fn parse_fd_list(buf: &[u8]) -> Vec<FdEntry> {
    let reader = ByteReader::new(buf);
    (0..buf.len() / FDINFO_SIZE)
        .filter_map(|i| {
            let base = i * FDINFO_SIZE;
            Some(FdEntry {
                fd: reader.i32_le(base).ok()?,
                fd_type: reader.u32_le(base + 4).ok()?,
            })
        })
        .collect()
}

/// Decode a `socket_fdinfo` buffer.
///
/// Returns `Ok(None)` for sockets that are not IPv4/IPv6 TCP/UDP, and an
/// error if the buffer is too short for the fields the socket needs.
pub fn parse_socket_info(buf: &[u8]) -> Result<Option<XnuSocket>, DecodeError> {
    let reader = ByteReader::new(buf);

    let ipv6 = match reader.u32_le(FAMILY_OFFSET)? {
        AF_INET => false,
        AF_INET6 => true,
        _ => return Ok(None),
    };

    let kind = match reader.u32_le(KIND_OFFSET)? {
        SOCKINFO_TCP => SocketKind::Tcp,
        SOCKINFO_UDP => SocketKind::Udp,
        _ => return Ok(None),
    };

    let ins = reader.sub(PROTO_OFFSET, IN_SOCKINFO_SIZE)?;
    let (local_ip, foreign_ip): (IpAddr, IpAddr) = if ipv6 {
        (ins.ipv6(LOCAL_ADDR)?.into(), ins.ipv6(FOREIGN_ADDR)?.into())
    } else {
        (ins.ipv4(LOCAL_ADDR)?.into(), ins.ipv4(FOREIGN_ADDR)?.into())
    };
    let local = endpoint(local_ip, ins.u16_be(LOCAL_PORT)?);

    let socket = match kind {
        SocketKind::Tcp => XnuSocket {
            kind,
            ipv6,
            local,
            remote: endpoint(foreign_ip, ins.u16_be(FOREIGN_PORT)?),
            state: xnu_tcp_state(reader.u32_le(TCP_STATE_OFFSET)?),
        },
        SocketKind::Udp => XnuSocket {
            kind,
            ipv6,
            local,
            remote: UNKNOWN_ENDPOINT.to_string(),
            state: STATELESS.to_string(),
        },
    };

    Ok(Some(socket))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn socket_buffer(family: u32, kind: u32) -> Vec<u8> {
        let mut buf = vec![0u8; SOCKET_INFO_CAPACITY];
        buf[FAMILY_OFFSET..FAMILY_OFFSET + 4].copy_from_slice(&family.to_le_bytes());
        buf[KIND_OFFSET..KIND_OFFSET + 4].copy_from_slice(&kind.to_le_bytes());
        buf
    }

    fn set_ports(buf: &mut [u8], local: u16, foreign: u16) {
        let base = PROTO_OFFSET;
        buf[base + FOREIGN_PORT..base + FOREIGN_PORT + 2].copy_from_slice(&foreign.to_be_bytes());
        buf[base + LOCAL_PORT..base + LOCAL_PORT + 2].copy_from_slice(&local.to_be_bytes());
    }

    fn set_state(buf: &mut [u8], state: u32) {
        buf[TCP_STATE_OFFSET..TCP_STATE_OFFSET + 4].copy_from_slice(&state.to_le_bytes());
    }

    #[test]
    fn test_tcp_ipv4_listen() {
        let mut buf = socket_buffer(AF_INET, SOCKINFO_TCP);
        set_ports(&mut buf, 8080, 0);
        buf[PROTO_OFFSET + LOCAL_ADDR..PROTO_OFFSET + LOCAL_ADDR + 4]
            .copy_from_slice(&[127, 0, 0, 1]);
        set_state(&mut buf, 1);

        let socket = parse_socket_info(&buf).unwrap().unwrap();
        assert_eq!(socket.kind, SocketKind::Tcp);
        assert!(!socket.ipv6);
        assert_eq!(socket.local, "127.0.0.1:8080");
        assert_eq!(socket.remote, "0.0.0.0:0");
        assert_eq!(socket.state, "LISTEN");
    }

    #[test]
    fn test_tcp_state_is_always_a_name_in_range() {
        let names = [
            "CLOSED",
            "LISTEN",
            "SYN_SENT",
            "SYN_RCVD",
            "ESTABLISHED",
            "CLOSE_WAIT",
            "FIN_WAIT_1",
            "CLOSING",
            "LAST_ACK",
            "FIN_WAIT_2",
            "TIME_WAIT",
        ];
        for (value, name) in names.iter().enumerate() {
            let mut buf = socket_buffer(AF_INET, SOCKINFO_TCP);
            set_state(&mut buf, value as u32);

            let socket = parse_socket_info(&buf).unwrap().unwrap();
            assert_eq!(socket.state, *name);
        }
    }

    #[test]
    fn test_tcp_ipv6_established() {
        let mut buf = socket_buffer(AF_INET6, SOCKINFO_TCP);
        set_ports(&mut buf, 443, 51000);
        let local: std::net::Ipv6Addr = "::1".parse().unwrap();
        let foreign: std::net::Ipv6Addr = "2001:db8::7".parse().unwrap();
        buf[PROTO_OFFSET + LOCAL_ADDR..PROTO_OFFSET + LOCAL_ADDR + 16]
            .copy_from_slice(&local.octets());
        buf[PROTO_OFFSET + FOREIGN_ADDR..PROTO_OFFSET + FOREIGN_ADDR + 16]
            .copy_from_slice(&foreign.octets());
        set_state(&mut buf, 4);

        let socket = parse_socket_info(&buf).unwrap().unwrap();
        assert!(socket.ipv6);
        assert_eq!(socket.local, "[::1]:443");
        assert_eq!(socket.remote, "[2001:db8::7]:51000");
        assert_eq!(socket.state, "ESTABLISHED");
    }

    #[test]
    fn test_udp_has_no_peer_or_state() {
        let mut buf = socket_buffer(AF_INET, SOCKINFO_UDP);
        set_ports(&mut buf, 5353, 0);

        let socket = parse_socket_info(&buf).unwrap().unwrap();
        assert_eq!(socket.kind, SocketKind::Udp);
        assert_eq!(socket.local, "0.0.0.0:5353");
        assert_eq!(socket.remote, UNKNOWN_ENDPOINT);
        assert_eq!(socket.state, STATELESS);
    }

    #[test]
    fn test_unknown_family_or_kind_is_dropped() {
        // AF_UNIX
        let buf = socket_buffer(1, SOCKINFO_TCP);
        assert_eq!(parse_socket_info(&buf).unwrap(), None);

        // SOCKINFO_UN
        let buf = socket_buffer(AF_INET, 6);
        assert_eq!(parse_socket_info(&buf).unwrap(), None);
    }

    #[test]
    fn test_short_buffer_is_an_error() {
        assert!(parse_socket_info(&[0u8; 100]).is_err());

        // Long enough for the UDP fields but not the TCP state.
        let mut buf = socket_buffer(AF_INET, SOCKINFO_TCP);
        buf.truncate(TCP_STATE_OFFSET + 2);
        assert!(matches!(
            parse_socket_info(&buf),
            Err(DecodeError::OutOfBounds { offset: TCP_STATE_OFFSET, .. })
        ));

        buf[KIND_OFFSET..KIND_OFFSET + 4].copy_from_slice(&SOCKINFO_UDP.to_le_bytes());
        assert!(parse_socket_info(&buf).unwrap().is_some());
    }

    #[test]
    fn test_parse_pid_list() {
        let mut buf = Vec::new();
        for pid in [1i32, 312, 4077, 0, 0] {
            buf.extend_from_slice(&pid.to_le_bytes());
        }
        buf.push(0xFF);

        assert_eq!(parse_pid_list(&buf), vec![1, 312, 4077]);
    }

    #[test]
    fn test_parse_fd_list() {
        let mut buf = Vec::new();
        for (fd, fd_type) in [(0i32, 1u32), (3, FDTYPE_SOCKET), (7, 6)] {
            buf.extend_from_slice(&fd.to_le_bytes());
            buf.extend_from_slice(&fd_type.to_le_bytes());
        }

        let fds = parse_fd_list(&buf);
        assert_eq!(fds.len(), 3);
        let sockets: Vec<i32> = fds.iter().filter(|f| f.is_socket()).map(|f| f.fd).collect();
        assert_eq!(sockets, vec![3]);
    }
}
