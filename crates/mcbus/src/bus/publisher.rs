// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher: one outbound endpoint per message type.

use crate::config::BusConfig;
use crate::engine::{PublisherMetrics, PublisherMetricsSnapshot};
use crate::error::{Error, Result};
use crate::schema::{FieldValues, Message, MessageType};
use crate::transport::{endpoint_for, open_transport, MulticastEndpoint, Role, Transport};
use crate::wire::{encode_frame, now_micros};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;

struct PublisherInner {
    transport: Box<dyn Transport>,
    next_sequence: u64,
}

/// Sends validated, framed messages of one type to its multicast endpoint.
///
/// `publish` may be called from several threads; calls are serialized so
/// sequence numbers are assigned in send order.
pub struct Publisher {
    message_type: Arc<MessageType>,
    endpoint: MulticastEndpoint,
    inner: Mutex<PublisherInner>,
    metrics: PublisherMetrics,
}

impl Publisher {
    /// Open a publisher at the endpoint allocated for the type's name.
    ///
    /// # Errors
    ///
    /// - `Error::Configuration` when the namespace is invalid
    /// - `Error::Transport` when the socket cannot be set up
    pub fn open(message_type: Arc<MessageType>, config: &BusConfig) -> Result<Self> {
        let endpoint = endpoint_for(message_type.name(), &config.namespace)?;
        Self::open_at(message_type, endpoint, config)
    }

    /// Open a publisher at an explicit endpoint.
    ///
    /// # Errors
    ///
    /// `Error::Transport` when the socket cannot be set up.
    pub fn open_at(
        message_type: Arc<MessageType>,
        endpoint: MulticastEndpoint,
        config: &BusConfig,
    ) -> Result<Self> {
        let transport = open_transport(&config.mode, endpoint, Role::Publisher, &config.transport)?;
        log::info!(
            "[PUB] publisher '{}' open on {} fingerprint={:#018x}",
            message_type.name(),
            endpoint,
            message_type.fingerprint()
        );
        Ok(Self {
            message_type,
            endpoint,
            inner: Mutex::new(PublisherInner {
                transport,
                next_sequence: 1,
            }),
            metrics: PublisherMetrics::new(),
        })
    }

    /// Validate, frame and send one message. Returns the sequence number used.
    ///
    /// A failed call does not consume a sequence number.
    ///
    /// # Errors
    ///
    /// - `Error::NotOpen` after `close`
    /// - `Error::Validation` when `values` do not match the type, or the frame
    ///   would exceed the datagram limit
    /// - `Error::Transport` when the send fails
    pub fn publish(&self, values: &FieldValues) -> Result<u64> {
        let mut inner = self.inner.lock();
        if !inner.transport.is_open() {
            return Err(Error::NotOpen);
        }

        let sequence = inner.next_sequence;
        let frame = match encode_frame(&self.message_type, values, sequence, now_micros()) {
            Ok(frame) => frame,
            Err(e) => {
                self.metrics.validation_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e);
            }
        };

        if let Err(e) = inner.transport.send(&frame) {
            self.metrics.send_errors.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "[PUB] send failed type={} seq={}: {}",
                self.message_type.name(),
                sequence,
                e
            );
            return Err(e);
        }

        inner.next_sequence = sequence.wrapping_add(1);
        self.metrics.frames_sent.fetch_add(1, Ordering::Relaxed);
        self.metrics
            .bytes_sent
            .fetch_add(frame.len() as u64, Ordering::Relaxed);
        log::debug!(
            "[PUB] sent type={} seq={} len={}",
            self.message_type.name(),
            sequence,
            frame.len()
        );
        Ok(sequence)
    }

    /// Publish a `Message` built for this publisher's type.
    ///
    /// # Errors
    ///
    /// `Error::Validation` when the message belongs to another type, plus
    /// everything `publish` returns.
    pub fn publish_message(&self, message: &Message) -> Result<u64> {
        let ty = message.message_type();
        if ty.fingerprint() != self.message_type.fingerprint() {
            self.metrics.validation_errors.fetch_add(1, Ordering::Relaxed);
            return Err(Error::Validation(format!(
                "message of type '{}' given to publisher of '{}'",
                ty.name(),
                self.message_type.name()
            )));
        }
        self.publish(message.values())
    }

    /// Release the socket. Idempotent.
    ///
    /// # Errors
    ///
    /// `Error::Transport` when the OS reports a failure while closing.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if !inner.transport.is_open() {
            return Ok(());
        }
        let result = inner.transport.close();
        log::info!("[PUB] publisher '{}' closed", self.message_type.name());
        result
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().transport.is_open()
    }

    pub fn endpoint(&self) -> MulticastEndpoint {
        self.endpoint
    }

    pub fn message_type(&self) -> &Arc<MessageType> {
        &self.message_type
    }

    /// Sequence number the next successful `publish` will use.
    pub fn next_sequence(&self) -> u64 {
        self.inner.lock().next_sequence
    }

    #[must_use]
    pub fn metrics(&self) -> PublisherMetricsSnapshot {
        self.metrics.snapshot()
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::debug!("[PUB] close on drop failed: {}", e);
        }
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("type", &self.message_type.name())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{field_values, FieldValue, MessageTypeBuilder, PrimitiveKind};
    use crate::transport::{LoopbackNetwork, LoopbackTransport, TransportMode};
    use crate::wire::decode_frame_for;
    use std::time::Duration;

    fn ping() -> Arc<MessageType> {
        MessageTypeBuilder::new("Ping")
            .field("seq", PrimitiveKind::U32)
            .field("ts", PrimitiveKind::U64)
            .build()
            .expect("valid type")
    }

    fn values(seq: u32) -> FieldValues {
        field_values([
            ("seq", FieldValue::U32(seq)),
            ("ts", FieldValue::U64(u64::from(seq) * 1000)),
        ])
    }

    #[test]
    fn test_sequence_numbers_start_at_one() {
        let net = LoopbackNetwork::new();
        let config = BusConfig::default().with_mode(TransportMode::Loopback(net.clone()));
        let ty = ping();
        let publisher = Publisher::open(Arc::clone(&ty), &config).expect("publisher");
        let mut rx = LoopbackTransport::open(&net, publisher.endpoint(), Role::Subscriber)
            .expect("subscriber transport");

        assert_eq!(publisher.publish(&values(1)).expect("publish"), 1);
        assert_eq!(publisher.publish(&values(2)).expect("publish"), 2);
        assert_eq!(publisher.next_sequence(), 3);

        let mut buf = vec![0u8; 1024];
        let got = rx
            .receive(&mut buf, Duration::from_secs(1))
            .expect("receive")
            .expect("frame");
        let frame = decode_frame_for(&ty, &buf[..got.len]).expect("decode");
        assert_eq!(frame.header.sequence, 1);
        assert_eq!(frame.values.get("seq"), Some(&FieldValue::U32(1)));
        assert_eq!(publisher.metrics().frames_sent, 2);
    }

    #[test]
    fn test_validation_failure_keeps_sequence() {
        let net = LoopbackNetwork::new();
        let config = BusConfig::default().with_mode(TransportMode::Loopback(net));
        let publisher = Publisher::open(ping(), &config).expect("publisher");

        let bad = field_values([("seq", FieldValue::String("one".into()))]);
        assert!(matches!(publisher.publish(&bad), Err(Error::Validation(_))));
        assert_eq!(publisher.next_sequence(), 1);
        assert_eq!(publisher.metrics().validation_errors, 1);
        assert_eq!(publisher.publish(&values(1)).expect("publish"), 1);
    }

    #[test]
    fn test_publish_after_close() {
        let net = LoopbackNetwork::new();
        let config = BusConfig::default().with_mode(TransportMode::Loopback(net));
        let publisher = Publisher::open(ping(), &config).expect("publisher");
        publisher.close().expect("close");
        publisher.close().expect("second close");
        assert!(!publisher.is_open());
        assert!(matches!(publisher.publish(&values(1)), Err(Error::NotOpen)));
    }

    #[test]
    fn test_publish_message_of_other_type() {
        let net = LoopbackNetwork::new();
        let config = BusConfig::default().with_mode(TransportMode::Loopback(net));
        let publisher = Publisher::open(ping(), &config).expect("publisher");
        let other = MessageTypeBuilder::new("Pong")
            .field("seq", PrimitiveKind::U32)
            .build()
            .expect("valid type");
        let message = Message::new(&other).with("seq", 1u32).expect("set");
        assert!(matches!(
            publisher.publish_message(&message),
            Err(Error::Validation(_))
        ));
    }
}
