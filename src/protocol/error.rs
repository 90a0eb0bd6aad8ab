//! Error types for request parsing and server operation.
//!
//! [`ParseError`] covers protocol violations in an incoming request; the
//! connection machinery recovers from these locally by answering with a 400
//! and never surfaces them to the embedding application. [`ServerError`] is
//! the other way around: it covers configuration and system failures that
//! are reported from construction or from
//! [`serve`](crate::Server::serve) and are always fatal to the caller.

use std::io;
use thiserror::Error;

/// Protocol violation detected while parsing a request.
#[derive(Error, Debug)]
pub enum ParseError {
    /// A header colon was not followed by a space.
    #[error("expected space after colon at byte {position}, got 0x{found:02x}")]
    MissingHeaderSpace { position: usize, found: u8 },

    /// The request line plus header block exceed the configured maximum.
    #[error("header block size {size} exceeds the maximum of {max} bytes")]
    HeaderTooLarge { size: usize, max: usize },
}

impl ParseError {
    /// Creates a new MissingHeaderSpace error.
    pub fn missing_header_space(position: usize, found: u8) -> Self {
        Self::MissingHeaderSpace { position, found }
    }

    /// Creates a new HeaderTooLarge error.
    pub fn header_too_large(size: usize, max: usize) -> Self {
        Self::HeaderTooLarge { size, max }
    }
}

/// Fatal failure surfaced from construction or from serving.
#[derive(Error, Debug)]
pub enum ServerError {
    /// A malformed bind address or socket path.
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },

    /// A system call failed; `op` names the failed operation.
    #[error("{op} failed: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: io::Error,
    },
}

impl ServerError {
    /// Creates a new InvalidAddress error.
    pub fn invalid_address<S: ToString>(reason: S) -> Self {
        Self::InvalidAddress { reason: reason.to_string() }
    }

    /// Creates a new I/O error tagged with the operation that failed.
    pub fn io(op: &'static str, source: io::Error) -> Self {
        Self::Io { op, source }
    }
}
