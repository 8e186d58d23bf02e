// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Diagnostic events emitted by a subscriber's receive loop.
//!
//! Per-frame errors never leave the receive loop as `Err`; they are counted
//! in `SubscriberMetrics` and published here. The channel is bounded and
//! lossy: when it is full the oldest event is discarded.

use crate::engine::metrics::SubscriberMetrics;
use crate::error::Error;
use crate::transport::MulticastEndpoint;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::net::SocketAddr;
use std::sync::atomic::Ordering;

/// Something noteworthy observed by a receive loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Bad magic or unsupported wire version.
    ProtocolRejected { source: SocketAddr, reason: String },
    /// Fingerprint of a received frame differs from the local type.
    SchemaMismatch {
        source: SocketAddr,
        type_name: String,
        expected: u64,
        received: u64,
    },
    /// Truncated or malformed frame.
    DecodeFailed {
        source: SocketAddr,
        endpoint: Option<MulticastEndpoint>,
        raw_len: usize,
        expected_len: usize,
        reason: String,
    },
    /// Sequence numbers skipped between two frames of one publisher.
    SequenceGap {
        source: SocketAddr,
        expected: u64,
        received: u64,
        missing: u64,
    },
    /// Frame whose sequence number did not advance (reordered or duplicated).
    SequenceReorder {
        source: SocketAddr,
        last: u64,
        received: u64,
    },
    /// One or more handlers panicked while processing a message.
    HandlerPanicked { sequence: u64, panics: usize },
    /// Hard receive failure; the loop has stopped.
    TransportFailed { reason: String },
}

impl Diagnostic {
    /// Map a per-frame error to its diagnostic.
    pub(crate) fn from_frame_error(error: &Error, source: SocketAddr) -> Self {
        match error {
            Error::Protocol { reason } => Self::ProtocolRejected {
                source,
                reason: reason.clone(),
            },
            Error::SchemaMismatch {
                type_name,
                expected,
                received,
            } => Self::SchemaMismatch {
                source,
                type_name: type_name.clone(),
                expected: *expected,
                received: *received,
            },
            Error::Decode {
                endpoint,
                raw_len,
                expected_len,
                reason,
            } => Self::DecodeFailed {
                source,
                endpoint: *endpoint,
                raw_len: *raw_len,
                expected_len: *expected_len,
                reason: reason.clone(),
            },
            other => Self::DecodeFailed {
                source,
                endpoint: None,
                raw_len: 0,
                expected_len: 0,
                reason: other.to_string(),
            },
        }
    }
}

/// Bounded, drop-oldest diagnostics channel.
#[derive(Debug)]
pub(crate) struct DiagnosticsChannel {
    tx: Sender<Diagnostic>,
    rx: Receiver<Diagnostic>,
}

impl DiagnosticsChannel {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity.max(1));
        Self { tx, rx }
    }

    /// A receiver for consumers; all receivers share one queue.
    pub(crate) fn subscribe(&self) -> Receiver<Diagnostic> {
        self.rx.clone()
    }

    pub(crate) fn emit(&self, diagnostic: Diagnostic, metrics: &SubscriberMetrics) {
        let mut pending = diagnostic;
        // Two attempts: make room by discarding the oldest event once.
        for _ in 0..2 {
            match self.tx.try_send(pending) {
                Ok(()) => return,
                Err(TrySendError::Full(returned)) => {
                    pending = returned;
                    if self.rx.try_recv().is_ok() {
                        metrics.diagnostics_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
        metrics.diagnostics_dropped.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv6Addr, SocketAddrV6};

    fn source() -> SocketAddr {
        SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 1, 0, 0))
    }

    #[test]
    fn test_drop_oldest_when_full() {
        let metrics = SubscriberMetrics::new();
        let channel = DiagnosticsChannel::new(2);
        let rx = channel.subscribe();

        for sequence in 0..3 {
            channel.emit(Diagnostic::HandlerPanicked { sequence, panics: 1 }, &metrics);
        }

        let got: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            got,
            [
                Diagnostic::HandlerPanicked { sequence: 1, panics: 1 },
                Diagnostic::HandlerPanicked { sequence: 2, panics: 1 },
            ]
        );
        assert_eq!(metrics.snapshot().diagnostics_dropped, 1);
    }

    #[test]
    fn test_from_frame_error() {
        let err = Error::SchemaMismatch {
            type_name: "Ping".into(),
            expected: 1,
            received: 2,
        };
        assert!(matches!(
            Diagnostic::from_frame_error(&err, source()),
            Diagnostic::SchemaMismatch { expected: 1, received: 2, .. }
        ));

        let err = Error::Protocol {
            reason: "bad magic".into(),
        };
        assert!(matches!(
            Diagnostic::from_frame_error(&err, source()),
            Diagnostic::ProtocolRejected { .. }
        ));
    }
}
