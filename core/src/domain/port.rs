//! Socket record and filter domain models.

use serde::{Deserialize, Serialize};

use crate::decode::state::STATELESS;

/// Owner rendered when no process could be correlated with a socket.
pub const UNKNOWN_OWNER: &str = "-";

// ============================================================================
// Protocol
// ============================================================================

/// Transport and address family of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Tcp,
    Tcp6,
    Udp,
    Udp6,
}

impl Protocol {
    /// All protocol tags, in the order the providers report them.
    pub const ALL: [Protocol; 4] = [Protocol::Tcp, Protocol::Tcp6, Protocol::Udp, Protocol::Udp6];

    /// Pick the tag for a transport and address family.
    pub fn new(tcp: bool, ipv6: bool) -> Self {
        match (tcp, ipv6) {
            (true, false) => Protocol::Tcp,
            (true, true) => Protocol::Tcp6,
            (false, false) => Protocol::Udp,
            (false, true) => Protocol::Udp6,
        }
    }

    /// Display name (e.g., "TCP6").
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Tcp6 => "TCP6",
            Protocol::Udp => "UDP",
            Protocol::Udp6 => "UDP6",
        }
    }

    pub fn is_tcp(&self) -> bool {
        matches!(self, Protocol::Tcp | Protocol::Tcp6)
    }

    pub fn is_udp(&self) -> bool {
        matches!(self, Protocol::Udp | Protocol::Udp6)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PortRecord
// ============================================================================

/// One open socket, normalized across platforms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortRecord {
    /// Transport and address family.
    pub protocol: Protocol,
    /// Local endpoint as `ip:port` (IPv6 bracketed).
    pub local: String,
    /// Remote endpoint as `ip:port`, or `*:*` when the OS does not report one.
    pub remote: String,
    /// Connection state name, or `-` for UDP.
    pub state: String,
    /// Owning process as `pid/name` or `pid`, or `-` when unknown.
    pub owner: String,
    /// Kernel socket identifier, only used to correlate owners.
    #[serde(skip)]
    pub(crate) socket_id: String,
}

impl PortRecord {
    /// Create a TCP or TCP6 record.
    pub fn tcp(
        ipv6: bool,
        local: impl Into<String>,
        remote: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        Self {
            protocol: Protocol::new(true, ipv6),
            local: local.into(),
            remote: remote.into(),
            state: state.into(),
            owner: UNKNOWN_OWNER.to_string(),
            socket_id: String::new(),
        }
    }

    /// Create a UDP or UDP6 record. UDP sockets carry no state.
    pub fn udp(ipv6: bool, local: impl Into<String>, remote: impl Into<String>) -> Self {
        Self {
            protocol: Protocol::new(false, ipv6),
            local: local.into(),
            remote: remote.into(),
            state: STATELESS.to_string(),
            owner: UNKNOWN_OWNER.to_string(),
            socket_id: String::new(),
        }
    }

    /// Create a record for `protocol`, dropping `state` for UDP.
    pub fn new(
        protocol: Protocol,
        local: impl Into<String>,
        remote: impl Into<String>,
        state: impl Into<String>,
    ) -> Self {
        let ipv6 = matches!(protocol, Protocol::Tcp6 | Protocol::Udp6);
        if protocol.is_tcp() {
            Self::tcp(ipv6, local, remote, state)
        } else {
            Self::udp(ipv6, local, remote)
        }
    }

    /// Set the owning process.
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = owner.into();
        self
    }

    pub(crate) fn with_socket_id(mut self, socket_id: impl Into<String>) -> Self {
        self.socket_id = socket_id.into();
        self
    }

    /// Whether the socket is passively waiting for connections.
    pub fn is_listening(&self) -> bool {
        self.state.eq_ignore_ascii_case("LISTEN") || self.state.eq_ignore_ascii_case("LISTENING")
    }
}

impl std::fmt::Display for PortRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} -> {} {} ({})",
            self.protocol, self.local, self.remote, self.state, self.owner
        )
    }
}

// ============================================================================
// PortFilter
// ============================================================================

/// Filter criteria for socket listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortFilter {
    /// Include TCP and TCP6 sockets.
    #[serde(default = "default_true")]
    pub tcp: bool,
    /// Include UDP and UDP6 sockets.
    #[serde(default = "default_true")]
    pub udp: bool,
    /// Only keep sockets in a listening state.
    #[serde(default)]
    pub listening_only: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PortFilter {
    fn default() -> Self {
        Self {
            tcp: true,
            udp: true,
            listening_only: false,
        }
    }
}

impl PortFilter {
    /// Create a new filter that keeps everything.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tcp(mut self, enabled: bool) -> Self {
        self.tcp = enabled;
        self
    }

    pub fn with_udp(mut self, enabled: bool) -> Self {
        self.udp = enabled;
        self
    }

    pub fn with_listening_only(mut self, enabled: bool) -> Self {
        self.listening_only = enabled;
        self
    }

    /// Check if a record matches all filter criteria.
    pub fn matches(&self, record: &PortRecord) -> bool {
        if record.protocol.is_tcp() && !self.tcp {
            return false;
        }
        if record.protocol.is_udp() && !self.udp {
            return false;
        }
        if self.listening_only && !record.is_listening() {
            return false;
        }
        true
    }
}

/// Apply a filter to a list of records, preserving order.
pub fn filter_ports<'a>(records: &'a [PortRecord], filter: &PortFilter) -> Vec<&'a PortRecord> {
    records.iter().filter(|r| filter.matches(r)).collect()
}

// ============================================================================
// Tests
// ============================================================================
