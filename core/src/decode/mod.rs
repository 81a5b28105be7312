//! Decoder primitives shared by the platform providers.
//!
//! Nothing in here touches the OS. Binary layouts are read through
//! [`ByteReader`], which refuses to read past the end of a buffer, and text
//! layouts are parsed field by field. The per-platform layout decoders are
//! compiled on every target so they can be tested with synthetic buffers.

pub mod iphlp;
pub mod procnet;
pub mod state;
pub mod xnu;

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

use thiserror::Error;

/// Rendering of an endpoint the OS does not report.
pub const UNKNOWN_ENDPOINT: &str = "*:*";

/// Errors produced while decoding OS-provided buffers and fields.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// A fixed-offset read would run past the end of the buffer.
    #[error("read of {width} bytes at offset {offset} exceeds buffer of {len} bytes")]
    OutOfBounds {
        offset: usize,
        width: usize,
        len: usize,
    },

    /// A field that should be hexadecimal is not.
    #[error("invalid hex field: {0:?}")]
    InvalidHex(String),

    /// A field does not have the expected shape.
    #[error("malformed field: {0:?}")]
    Malformed(String),
}

/// Bounds-checked reader over a byte buffer.
///
/// Every accessor takes an absolute offset and fails with
/// [`DecodeError::OutOfBounds`] rather than reading past the buffer.
#[derive(Debug, Clone, Copy)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Borrow `width` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, width: usize) -> Result<&'a [u8], DecodeError> {
        offset
            .checked_add(width)
            .and_then(|end| self.buf.get(offset..end))
            .ok_or(DecodeError::OutOfBounds {
                offset,
                width,
                len: self.buf.len(),
            })
    }

    /// A reader over the `width` bytes starting at `offset`.
    ///
    /// Offsets passed to the returned reader are relative to `offset`.
    pub fn sub(&self, offset: usize, width: usize) -> Result<ByteReader<'a>, DecodeError> {
        self.slice(offset, width).map(ByteReader::new)
    }

    /// Copy a fixed-size array starting at `offset`.
    pub fn array<const N: usize>(&self, offset: usize) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.slice(offset, N)?);
        Ok(out)
    }

    pub fn u16_be(&self, offset: usize) -> Result<u16, DecodeError> {
        self.array(offset).map(u16::from_be_bytes)
    }

    pub fn u32_le(&self, offset: usize) -> Result<u32, DecodeError> {
        self.array(offset).map(u32::from_le_bytes)
    }

    pub fn i32_le(&self, offset: usize) -> Result<i32, DecodeError> {
        self.array(offset).map(i32::from_le_bytes)
    }

    /// Four address bytes stored in network order.
    pub fn ipv4(&self, offset: usize) -> Result<Ipv4Addr, DecodeError> {
        self.array::<4>(offset).map(Ipv4Addr::from)
    }

    /// Sixteen address bytes stored in network order.
    pub fn ipv6(&self, offset: usize) -> Result<Ipv6Addr, DecodeError> {
        self.array::<16>(offset).map(Ipv6Addr::from)
    }
}

/// Port stored in the low 16 bits of a packed 32-bit field, network order.
///
/// `field` must have been read little-endian; the upper 16 bits are
/// undefined and ignored.
pub fn packed_port(field: u32) -> u16 {
    ((field & 0xFFFF) as u16).swap_bytes()
}

/// Render an endpoint as `ip:port`, bracketing IPv6 addresses.
pub fn endpoint(ip: IpAddr, port: u16) -> String {
    SocketAddr::new(ip, port).to_string()
}

/// Render an IPv6 endpoint, keeping a non-zero scope id as `%scope`.
pub fn endpoint_v6(ip: Ipv6Addr, port: u16, scope_id: u32) -> String {
    SocketAddrV6::new(ip, port, 0, scope_id).to_string()
}

/// Decode an even-length hexadecimal string into bytes.
pub fn hex_bytes(field: &str) -> Result<Vec<u8>, DecodeError> {
    let invalid = || DecodeError::InvalidHex(field.to_string());

    if field.len() % 2 != 0 || !field.is_ascii() {
        return Err(invalid());
    }

    (0..field.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&field[i..i + 2], 16).map_err(|_| invalid()))
        .collect()
}

/// Decode a hexadecimal 16-bit value such as a procfs port field.
pub fn hex_u16(field: &str) -> Result<u16, DecodeError> {
    u16::from_str_radix(field, 16).map_err(|_| DecodeError::InvalidHex(field.to_string()))
}
