// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message schemas
//!
//! Runtime description of the message types carried on the bus.
//!
//! # Features
//!
//! - **MessageType**: ordered, typed fields and a 64-bit schema fingerprint
//! - **Builder API**: fluent interface for building message types
//! - **FieldValue / FieldValues**: untyped values checked against a schema
//! - **Message**: values bound to their type
//! - **MessageRegistry**: lookup by name
//!
//! # Example
//!
//! ```rust
//! use mcbus::schema::{Message, MessageTypeBuilder, PrimitiveKind};
//!
//! let ping = MessageTypeBuilder::new("Ping")
//!     .field("seq", PrimitiveKind::U32)
//!     .field("ts", PrimitiveKind::U64)
//!     .build()
//!     .unwrap();
//!
//! let msg = Message::new(&ping).with("seq", 1u32).unwrap().with("ts", 1000u64).unwrap();
//! assert!(msg.validate().is_ok());
//! assert_eq!(ping.canonical_schema(), "Ping{seq:u32,ts:u64}");
//! ```

mod builder;
mod message;
mod message_type;
mod registry;
mod value;

pub use builder::MessageTypeBuilder;
pub use message::Message;
pub use message_type::{FieldDescriptor, FieldKind, MessageType, PrimitiveKind};
pub use registry::MessageRegistry;
pub use value::{field_values, FieldValue, FieldValues};
