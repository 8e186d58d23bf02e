// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message container: field values bound to their message type.

use crate::error::{Error, Result};
use crate::schema::{FieldValue, FieldValues, MessageType};
use std::sync::Arc;

/// Field values together with the `MessageType` they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    message_type: Arc<MessageType>,
    values: FieldValues,
}

impl Message {
    /// Empty message (every field unset).
    pub fn new(message_type: &Arc<MessageType>) -> Self {
        Self {
            message_type: Arc::clone(message_type),
            values: FieldValues::new(),
        }
    }

    /// Wrap existing values after validating them.
    ///
    /// # Errors
    ///
    /// `Error::Validation` when the values do not satisfy the schema.
    pub fn from_values(message_type: &Arc<MessageType>, values: FieldValues) -> Result<Self> {
        message_type.validate(&values)?;
        Ok(Self {
            message_type: Arc::clone(message_type),
            values,
        })
    }

    pub fn message_type(&self) -> &Arc<MessageType> {
        &self.message_type
    }

    pub fn type_name(&self) -> &str {
        self.message_type.name()
    }

    /// Set a field value by name.
    ///
    /// Only the field's existence is checked here; kinds and bounds are
    /// checked by `validate` (and again at publish time).
    ///
    /// # Errors
    ///
    /// `Error::Validation` when the type has no such field.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        if self.message_type.field(name).is_none() {
            return Err(Error::Validation(format!(
                "{}: unknown field '{}'",
                self.message_type.name(),
                name
            )));
        }
        self.values.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Builder-style `set`.
    ///
    /// # Errors
    ///
    /// `Error::Validation` when the type has no such field.
    pub fn with(mut self, name: &str, value: impl Into<FieldValue>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn values(&self) -> &FieldValues {
        &self.values
    }

    pub fn into_values(self) -> FieldValues {
        self.values
    }

    /// Check the current values against the schema.
    ///
    /// # Errors
    ///
    /// `Error::Validation` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.message_type.validate(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MessageTypeBuilder, PrimitiveKind};

    fn ping() -> Arc<MessageType> {
        MessageTypeBuilder::new("Ping")
            .field("seq", PrimitiveKind::U32)
            .field("ts", PrimitiveKind::U64)
            .build()
            .expect("valid type")
    }

    #[test]
    fn test_set_and_get() {
        let ty = ping();
        let mut msg = Message::new(&ty);
        msg.set("seq", 7u32).expect("known field");
        assert!(msg.validate().is_err());

        msg.set("ts", 700u64).expect("known field");
        assert!(msg.validate().is_ok());
        assert_eq!(msg.get("seq").and_then(FieldValue::as_u32), Some(7));
        assert_eq!(msg.type_name(), "Ping");
    }

    #[test]
    fn test_unknown_field() {
        let mut msg = Message::new(&ping());
        assert!(matches!(msg.set("nope", 1u8), Err(Error::Validation(_))));
    }

    #[test]
    fn test_from_values_validates() {
        let ty = ping();
        let mut values = FieldValues::new();
        values.insert("seq".into(), FieldValue::U32(1));
        assert!(Message::from_values(&ty, values.clone()).is_err());

        values.insert("ts".into(), FieldValue::U64(1));
        let msg = Message::from_values(&ty, values).expect("valid");
        assert_eq!(msg.into_values().len(), 2);
    }
}
