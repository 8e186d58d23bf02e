// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Publisher -> subscriber delivery over the loopback network and real UDP
//! multicast.

mod common;

use common::{loopback_config, multicast_available, ping, ping_type, udp_config, wait_until};
use crossbeam::channel;
use mcbus::schema::{MessageTypeBuilder, PrimitiveKind};
use mcbus::{
    BusConfig, Diagnostic, FieldValue, FieldValues, LoopbackNetwork, Publisher, SampleInfo,
    Subscriber, SubscriberState,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(3);

type Delivery = (u64, u32, u64);

fn collecting_subscriber(
    config: &BusConfig,
) -> (Subscriber, channel::Receiver<Delivery>) {
    let subscriber = Subscriber::new(ping_type(), config).expect("subscriber");
    let (tx, rx) = channel::unbounded();
    subscriber.register_fn(move |type_name: &str, values: &FieldValues, info: &SampleInfo| {
        assert_eq!(type_name, "Ping");
        let seq = values.get("seq").and_then(FieldValue::as_u32).unwrap_or_default();
        let ts = values.get("ts").and_then(FieldValue::as_u64).unwrap_or_default();
        let _ = tx.send((info.sequence, seq, ts));
    });
    (subscriber, rx)
}

fn run_ping_scenario(config: &BusConfig) {
    let (subscriber, rx) = collecting_subscriber(config);
    subscriber.open().expect("open subscriber");

    let publisher = Publisher::open(ping_type(), config).expect("open publisher");
    assert_eq!(publisher.endpoint(), subscriber.endpoint());

    assert_eq!(publisher.publish(&ping(1, 1000)).expect("publish"), 1);
    assert_eq!(publisher.publish(&ping(2, 2000)).expect("publish"), 2);

    assert_eq!(rx.recv_timeout(TIMEOUT).ok(), Some((1, 1, 1000)));
    assert_eq!(rx.recv_timeout(TIMEOUT).ok(), Some((2, 2, 2000)));

    subscriber.close().expect("close subscriber");
    publisher.close().expect("close publisher");
    assert_eq!(subscriber.state(), SubscriberState::Closed);

    let metrics = subscriber.metrics();
    assert_eq!(metrics.messages_delivered, 2);
    assert_eq!(metrics.sequence_gaps, 0);
    assert_eq!(metrics.rejected(), 0);
}

#[test]
fn test_ping_over_loopback() {
    let net = LoopbackNetwork::new();
    run_ping_scenario(&loopback_config(&net));
}

#[test]
fn test_ping_over_udp_multicast() {
    if !multicast_available(26_101) {
        eprintln!("skipping: IPv6 multicast loop unavailable on this host");
        return;
    }
    run_ping_scenario(&udp_config(26_102));
}

#[test]
fn test_every_subscriber_gets_a_copy() {
    let net = LoopbackNetwork::new();
    let config = loopback_config(&net);
    let (first, rx_first) = collecting_subscriber(&config);
    let (second, rx_second) = collecting_subscriber(&config);
    first.open().expect("open");
    second.open().expect("open");

    let publisher = Publisher::open(ping_type(), &config).expect("publisher");
    publisher.publish(&ping(7, 70)).expect("publish");

    assert_eq!(rx_first.recv_timeout(TIMEOUT).ok(), Some((1, 7, 70)));
    assert_eq!(rx_second.recv_timeout(TIMEOUT).ok(), Some((1, 7, 70)));
}

#[test]
fn test_types_do_not_cross_endpoints() {
    let net = LoopbackNetwork::new();
    let config = loopback_config(&net);
    let (subscriber, rx) = collecting_subscriber(&config);
    subscriber.open().expect("open");

    let other = MessageTypeBuilder::new("Pong")
        .field("seq", PrimitiveKind::U32)
        .field("ts", PrimitiveKind::U64)
        .build()
        .expect("valid type");
    let publisher = Publisher::open(other, &config).expect("publisher");
    assert_ne!(publisher.endpoint(), subscriber.endpoint());
    publisher.publish(&ping(1, 1)).expect("publish");

    assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(subscriber.metrics().frames_received, 0);
}

#[test]
fn test_types_sharing_a_port_stay_apart_over_udp() {
    if !multicast_available(26_111) {
        eprintln!("skipping: IPv6 multicast loop unavailable on this host");
        return;
    }
    let mut config = udp_config(26_112);
    config.namespace.port_span = 1;

    let (subscriber, rx) = collecting_subscriber(&config);
    subscriber.open().expect("open");

    let pong = MessageTypeBuilder::new("Pong")
        .field("seq", PrimitiveKind::U32)
        .field("ts", PrimitiveKind::U64)
        .build()
        .expect("valid type");
    let pong_subscriber = Subscriber::new(Arc::clone(&pong), &config).expect("subscriber");
    pong_subscriber.open().expect("open");

    let publisher = Publisher::open(pong, &config).expect("publisher");
    assert_eq!(publisher.endpoint().port, subscriber.endpoint().port);
    assert_ne!(publisher.endpoint().group, subscriber.endpoint().group);
    for seq in 1..=5 {
        publisher.publish(&ping(seq, 0)).expect("publish");
    }

    assert!(wait_until(TIMEOUT, || pong_subscriber.metrics().messages_delivered == 5));
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
    let metrics = subscriber.metrics();
    assert_eq!(metrics.frames_received, 0);
    assert_eq!(metrics.schema_mismatches, 0);
}

#[test]
fn test_handler_panic_does_not_stop_delivery() {
    let net = LoopbackNetwork::new();
    let config = loopback_config(&net);
    let subscriber = Subscriber::new(ping_type(), &config).expect("subscriber");
    let diagnostics = subscriber.diagnostics();

    subscriber.register_fn(|_: &str, values: &FieldValues, _: &SampleInfo| {
        if values.get("seq").and_then(FieldValue::as_u32) == Some(1) {
            panic!("handler failure on first message");
        }
    });
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    subscriber.register_fn(move |_: &str, _: &FieldValues, info: &SampleInfo| {
        sink.lock().push(info.sequence);
    });
    subscriber.open().expect("open");

    let publisher = Publisher::open(ping_type(), &config).expect("publisher");
    publisher.publish(&ping(1, 10)).expect("publish");
    publisher.publish(&ping(2, 20)).expect("publish");

    assert!(wait_until(TIMEOUT, || seen.lock().len() == 2));
    assert_eq!(*seen.lock(), [1, 2]);
    assert_eq!(subscriber.state(), SubscriberState::Open);
    assert_eq!(subscriber.metrics().handler_panics, 1);
    assert!(diagnostics
        .try_iter()
        .any(|d| matches!(d, Diagnostic::HandlerPanicked { sequence: 1, panics: 1 })));
}

#[test]
fn test_unregistered_handler_stops_receiving() {
    let net = LoopbackNetwork::new();
    let config = loopback_config(&net);
    let subscriber = Subscriber::new(ping_type(), &config).expect("subscriber");

    let removed_calls = Arc::new(Mutex::new(0u32));
    let counter = Arc::clone(&removed_calls);
    let removed = subscriber.register_fn(move |_: &str, _: &FieldValues, _: &SampleInfo| {
        *counter.lock() += 1;
    });
    let (tx, rx) = channel::unbounded();
    subscriber.register_fn(move |_: &str, _: &FieldValues, info: &SampleInfo| {
        let _ = tx.send(info.sequence);
    });
    subscriber.open().expect("open");

    let publisher = Publisher::open(ping_type(), &config).expect("publisher");
    publisher.publish(&ping(1, 1)).expect("publish");
    assert_eq!(rx.recv_timeout(TIMEOUT).ok(), Some(1));

    assert!(subscriber.unregister_handler(removed));
    assert_eq!(subscriber.handler_count(), 1);
    publisher.publish(&ping(2, 2)).expect("publish");
    assert_eq!(rx.recv_timeout(TIMEOUT).ok(), Some(2));

    assert_eq!(*removed_calls.lock(), 1);
}

#[test]
fn test_network_failure_surfaces_as_failed_state() {
    let net = LoopbackNetwork::new();
    let config = loopback_config(&net);
    let subscriber = Subscriber::new(ping_type(), &config).expect("subscriber");
    subscriber.open().expect("open");

    net.shutdown();
    assert!(wait_until(TIMEOUT, || subscriber.state() == SubscriberState::Failed));
    assert!(subscriber
        .diagnostics()
        .try_iter()
        .any(|d| matches!(d, Diagnostic::TransportFailed { .. })));

    subscriber.close().expect("close releases the socket");
    assert_eq!(subscriber.state(), SubscriberState::Failed);
}
