// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy for the message bus.
//!
//! Construction-time errors (`Configuration`, `Validation`, `InvalidState`)
//! propagate to the caller. Per-frame errors (`Protocol`, `SchemaMismatch`,
//! `Decode`) are produced by the wire codec and swallowed at the subscriber
//! boundary, where they only surface through metrics and diagnostics.
//! `Transport` is reported synchronously by `Publisher::publish` and is fatal
//! to a subscriber's receive loop.

use crate::transport::MulticastEndpoint;
use std::fmt;
use std::io;

/// Errors returned by mcbus operations.
///
/// # Example
///
/// ```rust
/// use mcbus::{endpoint_for, Error, NamespaceConfig};
///
/// let namespace = NamespaceConfig::default().with_prefix("ff02::".parse().unwrap(), 64);
/// match endpoint_for("Ping", &namespace) {
///     Err(Error::Configuration(msg)) => println!("bad namespace: {}", msg),
///     Err(e) => println!("other error: {}", e),
///     Ok(endpoint) => println!("Ping -> {}", endpoint),
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Setup errors
    // ========================================================================
    /// Namespace or address setup is invalid, or the address range is exhausted.
    Configuration(String),
    /// Field values do not satisfy the message schema (or the frame is too large).
    Validation(String),
    /// Operation not allowed in the current lifecycle state.
    InvalidState(String),

    // ========================================================================
    // Per-frame errors
    // ========================================================================
    /// Bad magic constant or unsupported wire-format version.
    Protocol { reason: String },
    /// Frame fingerprint disagrees with the locally registered message type.
    SchemaMismatch {
        type_name: String,
        expected: u64,
        received: u64,
    },
    /// Truncated or malformed frame payload.
    Decode {
        endpoint: Option<MulticastEndpoint>,
        raw_len: usize,
        expected_len: usize,
        reason: String,
    },

    // ========================================================================
    // Socket errors
    // ========================================================================
    /// Socket-level failure with the operation that triggered it.
    Transport {
        context: &'static str,
        source: io::Error,
    },
    /// Operation on a connection that is not (or no longer) open.
    NotOpen,
}

impl Error {
    /// Wrap an I/O error with the socket operation that produced it.
    pub fn transport(context: &'static str, source: io::Error) -> Self {
        Error::Transport { context, source }
    }

    /// Attach the receiving endpoint to a decode error that lacks one.
    #[must_use]
    pub fn with_endpoint(self, endpoint: MulticastEndpoint) -> Self {
        match self {
            Error::Decode {
                endpoint: None,
                raw_len,
                expected_len,
                reason,
            } => Error::Decode {
                endpoint: Some(endpoint),
                raw_len,
                expected_len,
                reason,
            },
            other => other,
        }
    }

    /// True for errors that only invalidate a single received frame.
    pub fn is_per_frame(&self) -> bool {
        matches!(
            self,
            Error::Protocol { .. } | Error::SchemaMismatch { .. } | Error::Decode { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            Error::Validation(msg) => write!(f, "Validation error: {}", msg),
            Error::InvalidState(msg) => write!(f, "Invalid state: {}", msg),
            Error::Protocol { reason } => write!(f, "Protocol error: {}", reason),
            Error::SchemaMismatch {
                type_name,
                expected,
                received,
            } => write!(
                f,
                "Schema mismatch for '{}': expected fingerprint {:016x}, received {:016x}",
                type_name, expected, received
            ),
            Error::Decode {
                endpoint,
                raw_len,
                expected_len,
                reason,
            } => {
                write!(
                    f,
                    "Decode error: {} (raw_len={}, expected_len={}",
                    reason, raw_len, expected_len
                )?;
                if let Some(endpoint) = endpoint {
                    write!(f, ", endpoint={}", endpoint)?;
                }
                write!(f, ")")
            }
            Error::Transport { context, source } => {
                write!(f, "Transport error during {}: {}", context, source)
            }
            Error::NotOpen => write!(f, "Transport error: connection is not open"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Transport {
            context: "io",
            source: e,
        }
    }
}

/// Convenient alias for API results using the public `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
