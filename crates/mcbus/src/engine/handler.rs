// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message handlers and per-subscriber handler lists.

use crate::schema::FieldValues;
use arc_swap::ArcSwap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Metadata delivered alongside each decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleInfo {
    /// Publisher sequence number from the frame header.
    pub sequence: u64,
    /// Send timestamp from the frame header (us since Unix epoch).
    pub sent_at_us: u64,
    /// When the receive loop got the datagram.
    pub received_at: SystemTime,
    /// Sender's socket address.
    pub source: SocketAddr,
    pub fingerprint: u64,
}

impl SampleInfo {
    /// One-way latency; `None` when the clocks disagree (negative latency).
    pub fn latency(&self) -> Option<Duration> {
        let sent = UNIX_EPOCH + Duration::from_micros(self.sent_at_us);
        self.received_at.duration_since(sent).ok()
    }
}

/// Receives decoded messages on a subscriber's receive thread.
///
/// Handlers run sequentially, in registration order, and must not block
/// indefinitely: the next datagram is not read until every handler returned.
pub trait Handler: Send + Sync {
    fn on_message(&self, type_name: &str, values: &FieldValues, info: &SampleInfo);
}

/// `Handler` backed by a closure.
pub struct CallbackHandler<F> {
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(&str, &FieldValues, &SampleInfo) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> Handler for CallbackHandler<F>
where
    F: Fn(&str, &FieldValues, &SampleInfo) + Send + Sync,
{
    fn on_message(&self, type_name: &str, values: &FieldValues, info: &SampleInfo) {
        (self.callback)(type_name, values, info);
    }
}

impl<F> fmt::Debug for CallbackHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandler").finish_non_exhaustive()
    }
}

/// Token returned by handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

type Entry = (HandlerId, Arc<dyn Handler>);

/// Copy-on-write handler list: the receive thread reads a snapshot without
/// locking while registration swaps in a new list.
pub(crate) struct HandlerList {
    entries: ArcSwap<Vec<Entry>>,
    next_id: AtomicU64,
}

impl HandlerList {
    pub(crate) fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn add(&self, handler: Arc<dyn Handler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push((id, Arc::clone(&handler)));
            next
        });
        id
    }

    pub(crate) fn remove(&self, id: HandlerId) -> bool {
        let previous = self.entries.rcu(|current| {
            current
                .iter()
                .filter(|(entry_id, _)| *entry_id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        previous.iter().any(|(entry_id, _)| *entry_id == id)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// Deliver to every handler with panic isolation.
    ///
    /// Returns the number of handlers that panicked.
    pub(crate) fn deliver(&self, type_name: &str, values: &FieldValues, info: &SampleInfo) -> usize {
        let snapshot = self.entries.load_full();
        let mut panics = 0;

        for (id, handler) in snapshot.iter() {
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler.on_message(type_name, values, info);
            }));

            if result.is_err() {
                panics += 1;
                log::warn!(
                    "[RX] handler {:?} panicked on '{}' seq={}",
                    id,
                    type_name,
                    info.sequence
                );
            }
        }

        panics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::net::{Ipv6Addr, SocketAddrV6};

    fn info(sequence: u64) -> SampleInfo {
        SampleInfo {
            sequence,
            sent_at_us: 1_000,
            received_at: UNIX_EPOCH + Duration::from_micros(1_250),
            source: SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::LOCALHOST, 5000, 0, 0)),
            fingerprint: 7,
        }
    }

    #[test]
    fn test_latency() {
        assert_eq!(info(1).latency(), Some(Duration::from_micros(250)));
        let mut skewed = info(1);
        skewed.sent_at_us = 2_000;
        assert_eq!(skewed.latency(), None);
    }

    #[test]
    fn test_registration_order() {
        let list = HandlerList::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for tag in 0..3 {
            let order = Arc::clone(&order);
            list.add(Arc::new(CallbackHandler::new(move |_: &str, _: &FieldValues, _: &SampleInfo| {
                order.lock().push(tag);
            })));
        }
        assert_eq!(list.deliver("T", &FieldValues::new(), &info(1)), 0);
        assert_eq!(*order.lock(), [0, 1, 2]);
    }

    #[test]
    fn test_panic_isolation() {
        let list = HandlerList::new();
        let calls = Arc::new(AtomicU64::new(0));

        list.add(Arc::new(CallbackHandler::new(|_: &str, _: &FieldValues, _: &SampleInfo| {
            panic!("boom");
        })));
        let counter = Arc::clone(&calls);
        list.add(Arc::new(CallbackHandler::new(move |_: &str, _: &FieldValues, _: &SampleInfo| {
            counter.fetch_add(1, Ordering::Relaxed);
        })));

        assert_eq!(list.deliver("T", &FieldValues::new(), &info(1)), 1);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_remove() {
        let list = HandlerList::new();
        let a = list.add(Arc::new(CallbackHandler::new(|_: &str, _: &FieldValues, _: &SampleInfo| {})));
        let b = list.add(Arc::new(CallbackHandler::new(|_: &str, _: &FieldValues, _: &SampleInfo| {})));
        assert_ne!(a, b);
        assert_eq!(list.len(), 2);
        assert!(list.remove(a));
        assert!(!list.remove(a));
        assert_eq!(list.len(), 1);
    }
}
