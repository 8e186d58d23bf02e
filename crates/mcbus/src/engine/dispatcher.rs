// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Dispatcher: starts and stops a set of subscribers as one unit.
//!
//! Each subscriber keeps its own receive thread; the dispatcher only owns the
//! set and its start/stop sequencing. Start and stop are serialized by a
//! lifecycle lock; the set lock is only held to snapshot members, never while
//! a receive thread is joined, so handlers may call back into the dispatcher.

use crate::bus::{Subscriber, SubscriberState};
use crate::error::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key of a subscriber inside a `Dispatcher`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberKey(u64);

#[derive(Default)]
struct DispatcherInner {
    subscribers: BTreeMap<SubscriberKey, Arc<Subscriber>>,
    next_key: u64,
}

/// Lifecycle owner for a group of subscribers.
#[derive(Default)]
pub struct Dispatcher {
    inner: Mutex<DispatcherInner>,
    lifecycle: Mutex<()>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Keys are handed out in insertion order.
    pub fn add(&self, subscriber: Arc<Subscriber>) -> SubscriberKey {
        let mut inner = self.inner.lock();
        inner.next_key += 1;
        let key = SubscriberKey(inner.next_key);
        log::debug!(
            "[DISPATCH] add {:?} type={} endpoint={}",
            key,
            subscriber.type_name(),
            subscriber.endpoint()
        );
        inner.subscribers.insert(key, subscriber);
        key
    }

    /// Remove a subscriber without closing it.
    pub fn remove(&self, key: SubscriberKey) -> Option<Arc<Subscriber>> {
        self.inner.lock().subscribers.remove(&key)
    }

    pub fn get(&self, key: SubscriberKey) -> Option<Arc<Subscriber>> {
        self.inner.lock().subscribers.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().subscribers.is_empty()
    }

    fn members(&self) -> Vec<(SubscriberKey, Arc<Subscriber>)> {
        self.inner
            .lock()
            .subscribers
            .iter()
            .map(|(key, sub)| (*key, Arc::clone(sub)))
            .collect()
    }

    /// Open every subscriber still in `Created`. Returns how many were opened.
    ///
    /// All or nothing: if one fails to open, the ones opened by this call are
    /// closed again and the error is returned.
    ///
    /// # Errors
    ///
    /// The first error returned by `Subscriber::open`.
    pub fn start_all(&self) -> Result<usize> {
        let _lifecycle = self.lifecycle.lock();
        let members = self.members();
        let mut started: Vec<Arc<Subscriber>> = Vec::new();

        for (key, subscriber) in &members {
            if subscriber.state() != SubscriberState::Created {
                continue;
            }
            if let Err(e) = subscriber.open() {
                log::error!(
                    "[DISPATCH] start of {:?} '{}' failed, rolling back {} subscriber(s): {}",
                    key,
                    subscriber.type_name(),
                    started.len(),
                    e
                );
                for opened in &started {
                    if let Err(close_err) = opened.close() {
                        log::warn!("[DISPATCH] rollback close failed: {}", close_err);
                    }
                }
                return Err(e);
            }
            started.push(Arc::clone(subscriber));
        }

        log::info!(
            "[DISPATCH] started {} of {} subscriber(s)",
            started.len(),
            members.len()
        );
        Ok(started.len())
    }

    /// Close every subscriber and join its receive thread.
    ///
    /// Every subscriber is closed even if an earlier one fails. When this
    /// returns, no handler of any member is running. Must not be called from
    /// a member's own handler: closing joins the thread running it.
    ///
    /// # Errors
    ///
    /// The first close error encountered.
    pub fn stop_all(&self) -> Result<()> {
        let _lifecycle = self.lifecycle.lock();
        let members = self.members();
        let mut first_error = None;

        for (key, subscriber) in &members {
            if let Err(e) = subscriber.close() {
                log::warn!("[DISPATCH] stop of {:?} failed: {}", key, e);
                first_error.get_or_insert(e);
            }
        }

        log::info!("[DISPATCH] stopped {} subscriber(s)", members.len());
        first_error.map_or(Ok(()), Err)
    }

    /// Key, type name and state of every member, in key order.
    pub fn states(&self) -> Vec<(SubscriberKey, String, SubscriberState)> {
        self.inner
            .lock()
            .subscribers
            .iter()
            .map(|(key, sub)| (*key, sub.type_name().to_string(), sub.state()))
            .collect()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("subscribers", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BusConfig;
    use crate::schema::{MessageTypeBuilder, PrimitiveKind};
    use crate::transport::{LoopbackNetwork, TransportMode};
    use std::time::Duration;

    fn subscriber(name: &str, net: &LoopbackNetwork) -> Arc<Subscriber> {
        let ty = MessageTypeBuilder::new(name)
            .field("value", PrimitiveKind::U32)
            .build()
            .expect("valid type");
        let mut config = BusConfig::default().with_mode(TransportMode::Loopback(net.clone()));
        config.transport.receive_timeout = Duration::from_millis(10);
        Arc::new(Subscriber::new(ty, &config).expect("subscriber"))
    }

    #[test]
    fn test_start_and_stop() {
        let net = LoopbackNetwork::new();
        let dispatcher = Dispatcher::new();
        let a = dispatcher.add(subscriber("Alpha", &net));
        let b = dispatcher.add(subscriber("Beta", &net));
        assert!(a < b);

        assert_eq!(dispatcher.start_all().expect("start"), 2);
        assert_eq!(dispatcher.start_all().expect("restart is a no-op"), 0);
        assert!(dispatcher
            .states()
            .iter()
            .all(|(_, _, state)| *state == SubscriberState::Open));

        dispatcher.stop_all().expect("stop");
        assert!(dispatcher
            .states()
            .iter()
            .all(|(_, _, state)| *state == SubscriberState::Closed));
        assert_eq!(net.subscriber_count(), 0);
    }

    #[test]
    fn test_handler_may_query_dispatcher_during_stop() {
        use crate::bus::Publisher;
        use crate::engine::SampleInfo;
        use crate::schema::{field_values, FieldValue, FieldValues};
        use std::sync::atomic::{AtomicUsize, Ordering};

        let net = LoopbackNetwork::new();
        let dispatcher = Arc::new(Dispatcher::new());
        let member = subscriber("Alpha", &net);
        let (entered_tx, entered_rx) = crossbeam::channel::bounded(1);
        let seen_len = Arc::new(AtomicUsize::new(0));

        let handle = Arc::clone(&dispatcher);
        let sink = Arc::clone(&seen_len);
        member.register_fn(move |_: &str, _: &FieldValues, _: &SampleInfo| {
            let _ = entered_tx.try_send(());
            std::thread::sleep(Duration::from_millis(100));
            sink.store(handle.len(), Ordering::SeqCst);
        });
        dispatcher.add(Arc::clone(&member));
        dispatcher.start_all().expect("start");

        let mut config = BusConfig::default().with_mode(TransportMode::Loopback(net.clone()));
        config.transport.receive_timeout = Duration::from_millis(10);
        let publisher = Publisher::open(Arc::clone(member.message_type()), &config).expect("publisher");
        publisher
            .publish(&field_values([("value", FieldValue::U32(1))]))
            .expect("publish");
        entered_rx
            .recv_timeout(Duration::from_secs(3))
            .expect("handler entered");

        // The stop joins the handler thread while that handler takes the set lock.
        let (done_tx, done_rx) = crossbeam::channel::bounded(1);
        let stopper = Arc::clone(&dispatcher);
        std::thread::spawn(move || {
            let _ = done_tx.send(stopper.stop_all());
        });
        let result = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("stop_all returned");
        assert!(result.is_ok());
        assert_eq!(seen_len.load(Ordering::SeqCst), 1);
        assert_eq!(member.state(), SubscriberState::Closed);
    }

    #[test]
    fn test_remove_does_not_close() {
        let net = LoopbackNetwork::new();
        let dispatcher = Dispatcher::new();
        let key = dispatcher.add(subscriber("Alpha", &net));
        dispatcher.start_all().expect("start");

        let removed = dispatcher.remove(key).expect("member");
        assert!(dispatcher.is_empty());
        assert_eq!(removed.state(), SubscriberState::Open);
        removed.close().expect("close");
    }
}
