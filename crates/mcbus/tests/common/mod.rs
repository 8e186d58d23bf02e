// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared helpers for integration tests.

#![allow(dead_code)]

use mcbus::schema::{MessageTypeBuilder, PrimitiveKind};
use mcbus::transport::{open_transport, Role};
use mcbus::{
    field_values, BusConfig, FieldValue, FieldValues, LoopbackNetwork, MessageType,
    MulticastEndpoint, NamespaceConfig, TransportConfig, TransportMode,
};
use std::net::Ipv6Addr;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub fn ping_type() -> Arc<MessageType> {
    MessageTypeBuilder::new("Ping")
        .field("seq", PrimitiveKind::U32)
        .field("ts", PrimitiveKind::U64)
        .build()
        .expect("valid Ping type")
}

pub fn ping(seq: u32, ts: u64) -> FieldValues {
    field_values([("seq", FieldValue::U32(seq)), ("ts", FieldValue::U64(ts))])
}

/// Loopback config with a short receive timeout so close() returns quickly.
pub fn loopback_config(network: &LoopbackNetwork) -> BusConfig {
    BusConfig::default()
        .with_mode(TransportMode::Loopback(network.clone()))
        .with_transport(TransportConfig::default().with_receive_timeout(Duration::from_millis(10)))
}

/// UDP config on a site-local test prefix with multicast loop enabled;
/// `port` keeps concurrently running tests apart.
pub fn udp_config(port: u16) -> BusConfig {
    let namespace = NamespaceConfig::default()
        .with_prefix(Ipv6Addr::new(0xff15, 0, 0, 0x6d63, 0, 0, 0, 0), 64)
        .with_port_base(port);
    BusConfig::default()
        .with_namespace(namespace)
        .with_transport(
            TransportConfig::default()
                .with_multicast_loop(true)
                .with_receive_timeout(Duration::from_millis(20)),
        )
}

/// Whether a multicast datagram sent on this host comes back to a local
/// subscriber. CI sandboxes often have no IPv6 or no multicast route.
pub fn multicast_available(port: u16) -> bool {
    let config = udp_config(port);
    let endpoint = MulticastEndpoint::new(Ipv6Addr::new(0xff15, 0, 0, 0x6d63, 0, 0, 0, 0xfe), port);

    let Ok(mut rx) = open_transport(&TransportMode::Udp, endpoint, Role::Subscriber, &config.transport)
    else {
        return false;
    };
    let Ok(mut tx) = open_transport(&TransportMode::Udp, endpoint, Role::Publisher, &config.transport)
    else {
        return false;
    };
    if tx.send(b"probe").is_err() {
        return false;
    }

    let mut buf = [0u8; 64];
    matches!(rx.receive(&mut buf, Duration::from_millis(500)), Ok(Some(_)))
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
