//! Connection-state lookup tables.
//!
//! Each OS numbers TCP states differently and the names below follow what
//! that platform's own tools print. Codes outside a table are rendered
//! literally so nothing is ever hidden.

/// State rendered for sockets that have no connection state (UDP).
pub const STATELESS: &str = "-";

/// `/proc/net/tcp` state codes `01..0B`, in table order.
///
/// This is not the kernel's `tcp_states.h` numbering, where `01` is
/// ESTABLISHED and `0A` is LISTEN.
const PROCFS_STATES: [&str; 11] = [
    "LISTEN",
    "SYN_SENT",
    "SYN_RECV",
    "ESTAB",
    "FIN_WAIT1",
    "FIN_WAIT2",
    "CLOSE_WAIT",
    "LAST_ACK",
    "CLOSING",
    "TIME_WAIT",
    "CLOSE",
];

/// `tcpsi_state` values, XNU `bsd/netinet/tcp_fsm.h` (0-based).
const XNU_STATES: [&str; 11] = [
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

/// `MIB_TCP_STATE` values, `tcpmib.h` (1-based).
const MIB_STATES: [&str; 12] = [
    "CLOSED",
    "LISTEN",
    "SYN_SENT",
    "SYN_RCVD",
    "ESTAB",
    "FIN_WAIT1",
    "FIN_WAIT2",
    "CLOSE_WAIT",
    "CLOSING",
    "LAST_ACK",
    "TIME_WAIT",
    "DELETE_TCB",
];

/// Decode a two-digit hex state field from `/proc/net/tcp[6]`.
///
/// Codes outside `01..0B` are returned unchanged.
pub fn procfs_tcp_state(code: &str) -> String {
    let is_hex_pair = code.len() == 2 && code.bytes().all(|b| b.is_ascii_hexdigit());

    is_hex_pair
        .then(|| u8::from_str_radix(code, 16).ok())
        .flatten()
        .and_then(|value| usize::from(value).checked_sub(1))
        .and_then(|index| PROCFS_STATES.get(index))
        .map_or_else(|| code.to_string(), |name| name.to_string())
}

/// Decode an XNU `tcpsi_state` value.
pub fn xnu_tcp_state(value: u32) -> String {
    usize::try_from(value)
        .ok()
        .and_then(|index| XNU_STATES.get(index))
        .map_or_else(|| value.to_string(), |name| name.to_string())
}

/// Decode a `MIB_TCP_STATE` value from an IP Helper row.
pub fn mib_tcp_state(value: u32) -> String {
    usize::try_from(value)
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| MIB_STATES.get(index))
        .map_or_else(|| value.to_string(), |name| name.to_string())
}
