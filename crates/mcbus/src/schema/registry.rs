// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Name -> MessageType registry.

use crate::error::{Error, Result};
use crate::schema::MessageType;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

/// Process-local lookup of message types by name.
///
/// Registration is idempotent for an identical schema; registering a
/// different schema under an existing name is refused.
#[derive(Debug, Default)]
pub struct MessageRegistry {
    types: DashMap<String, Arc<MessageType>>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a message type and return the registered instance.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` when the name is taken by a different schema.
    pub fn register(&self, message_type: Arc<MessageType>) -> Result<Arc<MessageType>> {
        match self.types.entry(message_type.name().to_string()) {
            Entry::Occupied(existing) => {
                let existing = existing.get();
                if existing.fingerprint() == message_type.fingerprint() {
                    Ok(Arc::clone(existing))
                } else {
                    Err(Error::Configuration(format!(
                        "message type '{}' already registered with fingerprint {:016x} (new {:016x})",
                        message_type.name(),
                        existing.fingerprint(),
                        message_type.fingerprint()
                    )))
                }
            }
            Entry::Vacant(slot) => {
                log::debug!(
                    "[REGISTRY] registered {} fingerprint={:016x}",
                    message_type.name(),
                    message_type.fingerprint()
                );
                Ok(Arc::clone(slot.insert(message_type).value()))
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<MessageType>> {
        self.types.get(name).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MessageTypeBuilder, PrimitiveKind};

    fn ty(name: &str, kind: PrimitiveKind) -> Arc<MessageType> {
        MessageTypeBuilder::new(name)
            .field("v", kind)
            .build()
            .expect("valid type")
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = MessageRegistry::new();
        assert!(registry.is_empty());

        registry.register(ty("B", PrimitiveKind::U8)).expect("register");
        registry.register(ty("A", PrimitiveKind::U8)).expect("register");

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names(), ["A", "B"]);
        assert!(registry.contains("A"));
        assert_eq!(registry.get("B").map(|t| t.name().to_string()).as_deref(), Some("B"));
        assert!(registry.get("C").is_none());
    }

    #[test]
    fn test_register_idempotent() {
        let registry = MessageRegistry::new();
        let first = registry.register(ty("A", PrimitiveKind::U8)).expect("register");
        let second = registry.register(ty("A", PrimitiveKind::U8)).expect("same schema");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_register_conflict() {
        let registry = MessageRegistry::new();
        registry.register(ty("A", PrimitiveKind::U8)).expect("register");
        let err = registry
            .register(ty("A", PrimitiveKind::U16))
            .expect_err("conflicting schema");
        assert!(matches!(err, Error::Configuration(_)));
    }
}
