// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # mcbus - broker-less publish/subscribe over IPv6 multicast
//!
//! Every message type gets its own multicast group and port, derived from the
//! type name inside a configurable namespace. Publishers send one
//! self-describing frame per datagram; subscribers join the group, check the
//! schema fingerprint, decode and hand the message to their handlers. There is
//! no broker and no discovery protocol.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mcbus::schema::{MessageTypeBuilder, PrimitiveKind};
//! use mcbus::{field_values, BusConfig, FieldValue, Publisher, Subscriber};
//!
//! fn main() -> mcbus::Result<()> {
//!     let ping = MessageTypeBuilder::new("Ping")
//!         .field("seq", PrimitiveKind::U32)
//!         .field("ts", PrimitiveKind::U64)
//!         .build()?;
//!     let config = BusConfig::from_env()?;
//!
//!     let subscriber = Subscriber::new(ping.clone(), &config)?;
//!     subscriber.register_fn(|type_name, values, info| {
//!         println!("{} #{}: {:?}", type_name, info.sequence, values);
//!     });
//!     subscriber.open()?;
//!
//!     let publisher = Publisher::open(ping, &config)?;
//!     publisher.publish(&field_values([
//!         ("seq", FieldValue::U32(1)),
//!         ("ts", FieldValue::U64(1000)),
//!     ]))?;
//!
//!     subscriber.close()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +--------------------------------------------------------------+
//! |  bus        Publisher (send path)   Subscriber (rx thread)   |
//! +--------------------------------------------------------------+
//! |  engine     handlers | sequence tracking | diagnostics |     |
//! |             metrics  | Dispatcher                            |
//! +--------------------------------------------------------------+
//! |  wire       33-byte header + schema-driven payload codec     |
//! +--------------------------------------------------------------+
//! |  transport  name -> (group, port) allocation                 |
//! |             UDP/IPv6 multicast (socket2 + mio) | loopback    |
//! +--------------------------------------------------------------+
//! |  schema     MessageType, FieldValue, fingerprints, registry  |
//! +--------------------------------------------------------------+
//! ```
//!
//! ## Delivery semantics
//!
//! Best effort. Frames may be lost, duplicated or reordered by the network;
//! subscribers report gaps and reorders through [`Diagnostic`] but never
//! retransmit. Frames whose schema fingerprint differs from the local type are
//! dropped, as are truncated or malformed frames.

/// Namespace, transport and environment configuration.
pub mod config;
/// Error type shared by every layer.
pub mod error;
/// Runtime message types, values and the type registry.
pub mod schema;
/// Frame header and payload codec.
pub mod wire;
/// Endpoint allocation and datagram transports.
pub mod transport;
/// Handlers, diagnostics, sequence tracking, metrics and the dispatcher.
pub mod engine;
/// Publisher and subscriber.
pub mod bus;

pub use bus::{Publisher, Subscriber, SubscriberState};
pub use config::{BusConfig, MulticastScope, NamespaceConfig, TransportConfig};
pub use engine::{
    CallbackHandler, Diagnostic, Dispatcher, Handler, HandlerId, PublisherMetricsSnapshot,
    SampleInfo, SubscriberKey, SubscriberMetricsSnapshot,
};
pub use error::{Error, Result};
pub use schema::{
    field_values, FieldValue, FieldValues, Message, MessageRegistry, MessageType,
    MessageTypeBuilder,
};
pub use transport::{endpoint_for, AddressAllocator, LoopbackNetwork, MulticastEndpoint, TransportMode};

#[cfg(feature = "config-file")]
pub use config::{YamlBusDocument, YamlLoader};
