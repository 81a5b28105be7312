//! Rows of the Linux `/proc/net/{tcp,tcp6,udp,udp6}` tables.
//!
//! Expected format (header line, then one socket per line):
//! ```text
//!   sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode
//!    0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 41252 1 ...
//! ```
//! Addresses are the kernel's in-memory words printed as hex, so they come
//! out in host (little-endian) order; ports are printed as plain numbers.

use std::net::{Ipv4Addr, Ipv6Addr};

use super::{endpoint, hex_bytes, hex_u16, DecodeError, UNKNOWN_ENDPOINT};

/// Lines with fewer fields than this are not socket rows.
pub const MIN_FIELDS: usize = 10;

const LOCAL_FIELD: usize = 1;
const REMOTE_FIELD: usize = 2;
const STATE_FIELD: usize = 3;
const INODE_FIELD: usize = 9;

/// One socket row, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcNetRow {
    /// Decoded local endpoint, or `*:*` if it could not be decoded.
    pub local: String,
    /// Decoded remote endpoint, or `*:*` if it could not be decoded.
    pub remote: String,
    /// Hex state code exactly as printed by the kernel.
    pub state_code: String,
    /// Socket inode, kept as text for correlation.
    pub socket_id: String,
}

/// Parse every socket row of a table, skipping the header line.
pub fn parse_table(content: &str) -> impl Iterator<Item = ProcNetRow> + '_ {
    content.lines().skip(1).filter_map(parse_row)
}

/// Parse one whitespace-delimited socket row.
pub fn parse_row(line: &str) -> Option<ProcNetRow> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    Some(ProcNetRow {
        local: endpoint_or_unknown(fields[LOCAL_FIELD]),
        remote: endpoint_or_unknown(fields[REMOTE_FIELD]),
        state_code: fields[STATE_FIELD].to_string(),
        socket_id: fields[INODE_FIELD].to_string(),
    })
}

/// Decode a hex `ADDR:PORT` field into `ip:port`.
///
/// IPv4 addresses are four bytes in little-endian order. IPv6 addresses are
/// four 32-bit words, each little-endian on its own. Ports are big-endian.
pub fn decode_endpoint(field: &str) -> Result<String, DecodeError> {
    let (addr_hex, port_hex) = field
        .split_once(':')
        .ok_or_else(|| DecodeError::Malformed(field.to_string()))?;

    let mut addr = hex_bytes(addr_hex)?;
    let port = hex_u16(port_hex)?;

    match addr.len() {
        4 => {
            addr.reverse();
            let octets: [u8; 4] = [addr[0], addr[1], addr[2], addr[3]];
            Ok(endpoint(Ipv4Addr::from(octets).into(), port))
        }
        16 => {
            let mut octets = [0u8; 16];
            for (word, out) in addr.chunks_exact(4).zip(octets.chunks_exact_mut(4)) {
                out.copy_from_slice(&[word[3], word[2], word[1], word[0]]);
            }
            Ok(endpoint(Ipv6Addr::from(octets).into(), port))
        }
        _ => Err(DecodeError::Malformed(field.to_string())),
    }
}

fn endpoint_or_unknown(field: &str) -> String {
    decode_endpoint(field).unwrap_or_else(|e| {
        tracing::trace!(field, error = %e, "Undecodable endpoint");
        UNKNOWN_ENDPOINT.to_string()
    })
}
