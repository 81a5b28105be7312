//! Domain layer - Platform-independent data models.
//!
//! These types have no I/O dependencies and can be tested in isolation.

mod port;

// Re-export all domain types
pub use port::{filter_ports, PortFilter, PortRecord, Protocol, UNKNOWN_OWNER};
