//! The size-then-fill query convention.
//!
//! Most kernel and system-API queries that return variable-length data are
//! called twice: once with an empty buffer to learn the required size and
//! once with a buffer of that size to receive the data. The data can grow
//! between the two calls, so the second call may report that the buffer is
//! still too small. [`size_then_fill`] owns that loop for every call site.

use thiserror::Error;

/// How many times the buffer is re-sized before giving up.
pub const MAX_ATTEMPTS: usize = 4;

/// Outcome of a single call to a size-then-fill query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    /// The buffer was large enough; this many leading bytes are valid.
    Done(usize),
    /// The buffer is too small; this many bytes are required.
    Grow(usize),
    /// The query failed with an OS status or errno value.
    Failed(i64),
}

/// Errors returned by [`size_then_fill`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    /// The OS rejected the query.
    #[error("query failed with status {code}")]
    Failed { code: i64 },

    /// The required size kept changing between calls.
    #[error("data size did not settle after {attempts} attempts")]
    Unstable { attempts: usize },
}

/// Run a size-then-fill query.
///
/// `query` is called first with an empty slice (the "null buffer" probe) and
/// then with a zeroed buffer of whatever size it asks for. A fresh buffer is
/// allocated every time the query reports [`Fill::Grow`], up to
/// [`MAX_ATTEMPTS`] times.
pub fn size_then_fill<F>(mut query: F) -> Result<Vec<u8>, QueryError>
where
    F: FnMut(&mut [u8]) -> Fill,
{
    let mut buf = Vec::new();

    for _ in 0..=MAX_ATTEMPTS {
        match query(&mut buf) {
            Fill::Done(len) => {
                buf.truncate(len);
                return Ok(buf);
            }
            Fill::Grow(required) => {
                // Never hand the query the same size twice.
                let size = required.max(buf.len() + 1);
                buf = vec![0u8; size];
            }
            Fill::Failed(code) => return Err(QueryError::Failed { code }),
        }
    }

    Err(QueryError::Unstable {
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_then_fill() {
        let data = [1u8, 2, 3, 4, 5, 6];
        let mut calls = Vec::new();

        let buf = size_then_fill(|buf| {
            calls.push(buf.len());
            if buf.len() < data.len() {
                return Fill::Grow(data.len());
            }
            buf[..data.len()].copy_from_slice(&data);
            Fill::Done(data.len())
        })
        .unwrap();

        assert_eq!(buf, data);
        assert_eq!(calls, vec![0, 6]);
    }

    #[test]
    fn test_data_grows_between_calls() {
        let mut needed = 8;
        let mut calls = 0;

        let buf = size_then_fill(|buf| {
            calls += 1;
            if buf.len() < needed {
                let reported = needed;
                if calls == 1 {
                    // Another socket appears before the fill call.
                    needed = 16;
                }
                return Fill::Grow(reported);
            }
            Fill::Done(needed)
        })
        .unwrap();

        assert_eq!(buf.len(), 16);
        assert_eq!(calls, 3);
    }

    #[test]
    fn test_done_truncates_to_reported_length() {
        let buf = size_then_fill(|buf| {
            if buf.is_empty() {
                Fill::Grow(64)
            } else {
                Fill::Done(10)
            }
        })
        .unwrap();

        assert_eq!(buf.len(), 10);
    }

    #[test]
    fn test_failure_is_reported() {
        let result = size_then_fill(|_| Fill::Failed(87));
        assert_eq!(result, Err(QueryError::Failed { code: 87 }));
    }

    #[test]
    fn test_gives_up_when_size_never_settles() {
        let mut calls = 0;
        let result = size_then_fill(|buf| {
            calls += 1;
            Fill::Grow(buf.len() + 4)
        });

        assert_eq!(
            result,
            Err(QueryError::Unstable {
                attempts: MAX_ATTEMPTS
            })
        );
        assert_eq!(calls, MAX_ATTEMPTS + 1);
    }

    #[test]
    fn test_empty_result() {
        let buf = size_then_fill(|_| Fill::Done(0)).unwrap();
        assert!(buf.is_empty());
    }
}
