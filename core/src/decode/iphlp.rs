//! Owner-PID tables returned by `GetExtendedTcpTable` / `GetExtendedUdpTable`.
//!
//! Every table is a `DWORD dwNumEntries` followed by a packed row array.
//! Row layouts are from `tcpmib.h` and `udpmib.h`; all `DWORD`s are
//! little-endian, addresses are stored in network order and ports sit in the
//! low 16 bits of a `DWORD` in network order.

use std::net::IpAddr;

use super::state::{mib_tcp_state, STATELESS};
use super::{endpoint, endpoint_v6, packed_port, ByteReader, DecodeError, UNKNOWN_ENDPOINT};

/// Offset of the first row, after `dwNumEntries`.
pub const ROWS_OFFSET: usize = 4;

/// `MIB_TCPROW_OWNER_PID`.
mod tcp4 {
    pub const SIZE: usize = 24;
    pub const STATE: usize = 0;
    pub const LOCAL_ADDR: usize = 4;
    pub const LOCAL_PORT: usize = 8;
    pub const REMOTE_ADDR: usize = 12;
    pub const REMOTE_PORT: usize = 16;
    pub const PID: usize = 20;
}

/// `MIB_TCP6ROW_OWNER_PID`.
mod tcp6 {
    pub const SIZE: usize = 56;
    pub const LOCAL_ADDR: usize = 0;
    pub const LOCAL_SCOPE: usize = 16;
    pub const LOCAL_PORT: usize = 20;
    pub const REMOTE_ADDR: usize = 24;
    pub const REMOTE_SCOPE: usize = 40;
    pub const REMOTE_PORT: usize = 44;
    pub const STATE: usize = 48;
    pub const PID: usize = 52;
}

/// `MIB_UDPROW_OWNER_PID`.
mod udp4 {
    pub const SIZE: usize = 12;
    pub const LOCAL_ADDR: usize = 0;
    pub const LOCAL_PORT: usize = 4;
    pub const PID: usize = 8;
}

/// `MIB_UDP6ROW_OWNER_PID`.
mod udp6 {
    pub const SIZE: usize = 28;
    pub const LOCAL_ADDR: usize = 0;
    pub const LOCAL_SCOPE: usize = 16;
    pub const LOCAL_PORT: usize = 20;
    pub const PID: usize = 24;
}

/// One of the four table shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Tcp4,
    Tcp6,
    Udp4,
    Udp6,
}

impl TableKind {
    pub const ALL: [TableKind; 4] = [
        TableKind::Tcp4,
        TableKind::Tcp6,
        TableKind::Udp4,
        TableKind::Udp6,
    ];

    pub fn row_size(self) -> usize {
        match self {
            TableKind::Tcp4 => tcp4::SIZE,
            TableKind::Tcp6 => tcp6::SIZE,
            TableKind::Udp4 => udp4::SIZE,
            TableKind::Udp6 => udp6::SIZE,
        }
    }

    pub fn is_tcp(self) -> bool {
        matches!(self, TableKind::Tcp4 | TableKind::Tcp6)
    }

    pub fn is_ipv6(self) -> bool {
        matches!(self, TableKind::Tcp6 | TableKind::Udp6)
    }
}

/// A decoded table row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerRow {
    pub local: String,
    pub remote: String,
    pub state: String,
    pub pid: u32,
}

/// Decode a whole table.
///
/// A row count larger than the buffer can hold is clamped to the complete
/// rows present.
pub fn parse_table(buf: &[u8], kind: TableKind) -> Result<Vec<OwnerRow>, DecodeError> {
    let reader = ByteReader::new(buf);
    let declared = reader.u32_le(0)? as usize;
    let available = buf.len().saturating_sub(ROWS_OFFSET) / kind.row_size();
    let count = declared.min(available);

    (0..count)
        .map(|i| {
            let row = reader.sub(ROWS_OFFSET + i * kind.row_size(), kind.row_size())?;
            parse_row(row, kind)
        })
        .collect()
}

fn parse_row(row: ByteReader<'_>, kind: TableKind) -> Result<OwnerRow, DecodeError> {
    match kind {
        TableKind::Tcp4 => {
            let local: IpAddr = row.ipv4(tcp4::LOCAL_ADDR)?.into();
            let remote: IpAddr = row.ipv4(tcp4::REMOTE_ADDR)?.into();
            Ok(OwnerRow {
                local: endpoint(local, packed_port(row.u32_le(tcp4::LOCAL_PORT)?)),
                remote: endpoint(remote, packed_port(row.u32_le(tcp4::REMOTE_PORT)?)),
                state: mib_tcp_state(row.u32_le(tcp4::STATE)?),
                pid: row.u32_le(tcp4::PID)?,
            })
        }
        TableKind::Tcp6 => Ok(OwnerRow {
            local: endpoint_v6(
                row.ipv6(tcp6::LOCAL_ADDR)?,
                packed_port(row.u32_le(tcp6::LOCAL_PORT)?),
                row.u32_le(tcp6::LOCAL_SCOPE)?,
            ),
            remote: endpoint_v6(
                row.ipv6(tcp6::REMOTE_ADDR)?,
                packed_port(row.u32_le(tcp6::REMOTE_PORT)?),
                row.u32_le(tcp6::REMOTE_SCOPE)?,
            ),
            state: mib_tcp_state(row.u32_le(tcp6::STATE)?),
            pid: row.u32_le(tcp6::PID)?,
        }),
        TableKind::Udp4 => {
            let local: IpAddr = row.ipv4(udp4::LOCAL_ADDR)?.into();
            Ok(OwnerRow {
                local: endpoint(local, packed_port(row.u32_le(udp4::LOCAL_PORT)?)),
                remote: UNKNOWN_ENDPOINT.to_string(),
                state: STATELESS.to_string(),
                pid: row.u32_le(udp4::PID)?,
            })
        }
        TableKind::Udp6 => Ok(OwnerRow {
            local: endpoint_v6(
                row.ipv6(udp6::LOCAL_ADDR)?,
                packed_port(row.u32_le(udp6::LOCAL_PORT)?),
                row.u32_le(udp6::LOCAL_SCOPE)?,
            ),
            remote: UNKNOWN_ENDPOINT.to_string(),
            state: STATELESS.to_string(),
            pid: row.u32_le(udp6::PID)?,
        }),
    }
}
