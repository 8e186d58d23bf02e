// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Relaxed-atomic counters for publishers and subscribers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Receive-side counters of one subscriber.
#[derive(Debug, Default)]
pub struct SubscriberMetrics {
    pub frames_received: AtomicU64,
    pub bytes_received: AtomicU64,
    pub messages_delivered: AtomicU64,
    /// Bad magic or unsupported version.
    pub protocol_errors: AtomicU64,
    pub schema_mismatches: AtomicU64,
    pub decode_errors: AtomicU64,
    pub handler_panics: AtomicU64,
    /// Total sequence numbers skipped (sum over all gaps).
    pub sequence_gaps: AtomicU64,
    /// Frames whose sequence number did not advance.
    pub sequence_reorders: AtomicU64,
    /// Diagnostics discarded because the channel was full.
    pub diagnostics_dropped: AtomicU64,
}

/// Point-in-time copy of `SubscriberMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriberMetricsSnapshot {
    pub frames_received: u64,
    pub bytes_received: u64,
    pub messages_delivered: u64,
    pub protocol_errors: u64,
    pub schema_mismatches: u64,
    pub decode_errors: u64,
    pub handler_panics: u64,
    pub sequence_gaps: u64,
    pub sequence_reorders: u64,
    pub diagnostics_dropped: u64,
}

impl SubscriberMetricsSnapshot {
    /// Frames dropped for any per-frame error.
    pub fn rejected(&self) -> u64 {
        self.protocol_errors + self.schema_mismatches + self.decode_errors
    }
}

impl SubscriberMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the current counters without synchronisation penalties.
    #[must_use]
    pub fn snapshot(&self) -> SubscriberMetricsSnapshot {
        SubscriberMetricsSnapshot {
            frames_received: self.frames_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            messages_delivered: self.messages_delivered.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            schema_mismatches: self.schema_mismatches.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            handler_panics: self.handler_panics.load(Ordering::Relaxed),
            sequence_gaps: self.sequence_gaps.load(Ordering::Relaxed),
            sequence_reorders: self.sequence_reorders.load(Ordering::Relaxed),
            diagnostics_dropped: self.diagnostics_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Send-side counters of one publisher.
#[derive(Debug, Default)]
pub struct PublisherMetrics {
    pub frames_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub send_errors: AtomicU64,
    pub validation_errors: AtomicU64,
}

/// Point-in-time copy of `PublisherMetrics`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherMetricsSnapshot {
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub send_errors: u64,
    pub validation_errors: u64,
}

impl PublisherMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn snapshot(&self) -> PublisherMetricsSnapshot {
        PublisherMetricsSnapshot {
            frames_sent: self.frames_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            validation_errors: self.validation_errors.load(Ordering::Relaxed),
        }
    }
}
