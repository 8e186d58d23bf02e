// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-publisher sequence tracking (gap and reorder detection).

use std::collections::HashMap;
use std::net::SocketAddr;

/// Outcome of observing one sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceEvent {
    /// First frame seen from this source.
    First,
    InOrder,
    /// `missing` numbers were skipped before `received`.
    Gap {
        expected: u64,
        received: u64,
        missing: u64,
    },
    /// Number did not advance past `last`.
    Reorder { last: u64, received: u64 },
    /// The source started over (a new publisher on a reused address); the
    /// tracker now follows `received`.
    Restart { last: u64, received: u64 },
}

/// Backward jumps longer than this are a restart, not a late frame.
pub const REORDER_WINDOW: u64 = 1024;

/// Last sequence number per source address. Wrap-around at 2^64 is treated
/// as advancing (distance computed modulo 2^64). A step back to 1, or further
/// back than `REORDER_WINDOW`, resets the source.
#[derive(Debug, Default)]
pub struct SequenceTracker {
    last: HashMap<SocketAddr, u64>,
}

impl SequenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, source: SocketAddr, received: u64) -> SequenceEvent {
        let Some(last) = self.last.get(&source).copied() else {
            self.last.insert(source, received);
            return SequenceEvent::First;
        };

        let distance = received.wrapping_sub(last);
        if distance == 0 {
            return SequenceEvent::Reorder { last, received };
        }
        if distance > u64::MAX / 2 {
            let back = last.wrapping_sub(received);
            if received == 1 || back > REORDER_WINDOW {
                self.last.insert(source, received);
                return SequenceEvent::Restart { last, received };
            }
            return SequenceEvent::Reorder { last, received };
        }
        self.last.insert(source, received);
        if distance == 1 {
            SequenceEvent::InOrder
        } else {
            SequenceEvent::Gap {
                expected: last.wrapping_add(1),
                received,
                missing: distance - 1,
            }
        }
    }

    /// Number of distinct sources seen.
    pub fn sources(&self) -> usize {
        self.last.len()
    }
}
