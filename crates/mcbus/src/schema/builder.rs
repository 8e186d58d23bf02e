// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Fluent builder API for MessageType.

use crate::error::Result;
use crate::schema::{FieldDescriptor, FieldKind, MessageType, PrimitiveKind};
use std::sync::Arc;

/// Builder for creating MessageType instances.
#[derive(Debug)]
pub struct MessageTypeBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageTypeBuilder {
    /// Create a new builder for a message type.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a primitive field.
    pub fn field(self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        self.field_with_kind(name, FieldKind::Primitive(kind))
    }

    /// Add a field of any kind.
    pub fn field_with_kind(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor::new(name, kind));
        self
    }

    /// Add an optional primitive field.
    pub fn optional_field(self, name: impl Into<String>, kind: PrimitiveKind) -> Self {
        self.optional_field_with_kind(name, FieldKind::Primitive(kind))
    }

    pub fn optional_field_with_kind(mut self, name: impl Into<String>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor::new(name, kind).optional());
        self
    }

    /// Add a string field.
    pub fn string_field(self, name: impl Into<String>) -> Self {
        self.field(name, PrimitiveKind::String { max_length: None })
    }

    pub fn bounded_string_field(self, name: impl Into<String>, max_length: usize) -> Self {
        self.field(
            name,
            PrimitiveKind::String {
                max_length: Some(max_length),
            },
        )
    }

    /// Add an opaque bytes field.
    pub fn bytes_field(self, name: impl Into<String>) -> Self {
        self.field(name, PrimitiveKind::Bytes { max_length: None })
    }

    pub fn bounded_bytes_field(self, name: impl Into<String>, max_length: usize) -> Self {
        self.field(
            name,
            PrimitiveKind::Bytes {
                max_length: Some(max_length),
            },
        )
    }

    /// Add a sequence field.
    pub fn sequence_field(self, name: impl Into<String>, element: impl Into<FieldKind>) -> Self {
        self.field_with_kind(name, FieldKind::sequence(element.into(), None))
    }

    /// Add a bounded sequence field.
    pub fn bounded_sequence_field(
        self,
        name: impl Into<String>,
        element: impl Into<FieldKind>,
        max_length: usize,
    ) -> Self {
        self.field_with_kind(name, FieldKind::sequence(element.into(), Some(max_length)))
    }

    /// Add an array field.
    pub fn array_field(
        self,
        name: impl Into<String>,
        element: impl Into<FieldKind>,
        length: usize,
    ) -> Self {
        self.field_with_kind(name, FieldKind::array(element.into(), length))
    }

    /// Add a nested message field.
    pub fn nested_field(self, name: impl Into<String>, nested: Arc<MessageType>) -> Self {
        self.field_with_kind(name, FieldKind::Nested(nested))
    }

    /// Build the MessageType.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` for invalid or duplicated names.
    pub fn build(self) -> Result<Arc<MessageType>> {
        MessageType::new(self.name, self.fields).map(Arc::new)
    }
}
