//! Error types for the ports-core library.

use thiserror::Error;

use crate::query::QueryError;

/// Result type alias for enumeration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that stop an enumeration before it produces any records.
///
/// Failures that only affect a single process, descriptor or table are
/// absorbed by the providers and never surface here.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while reading the pseudo-filesystem root.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A top-level OS query was rejected.
    #[error("{call} failed: {source}")]
    Query {
        call: &'static str,
        #[source]
        source: QueryError,
    },

    /// Platform not supported.
    #[error("Platform not supported: {0}")]
    UnsupportedPlatform(String),
}

impl Error {
    /// Wrap a failed size-then-fill query with the name of the OS call.
    pub fn query(call: &'static str, source: QueryError) -> Self {
        Self::Query { call, source }
    }
}
