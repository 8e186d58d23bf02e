// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Field value types.

use std::collections::HashMap;

/// Field name -> value map of one message (or one nested message).
pub type FieldValues = HashMap<String, FieldValue>;

/// A value that can hold any field kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    // Primitives
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),

    // Composites
    Sequence(Vec<FieldValue>),
    Array(Vec<FieldValue>),
    Message(FieldValues),

    /// Absent optional field.
    Null,
}

macro_rules! impl_accessor {
    ($name:ident, $variant:ident, $type:ty) => {
        pub fn $name(&self) -> Option<$type> {
            match self {
                Self::$variant(v) => Some(*v),
                _ => None,
            }
        }
    };
}

macro_rules! impl_from {
    ($type:ty, $variant:ident) => {
        impl From<$type> for FieldValue {
            fn from(v: $type) -> Self {
                Self::$variant(v)
            }
        }
    };
}

impl FieldValue {
    /// Build a `Sequence` from anything convertible.
    pub fn sequence<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldValue>,
    {
        Self::Sequence(items.into_iter().map(Into::into).collect())
    }

    /// Build an `Array` from anything convertible.
    pub fn array<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<FieldValue>,
    {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    impl_accessor!(as_bool, Bool, bool);
    impl_accessor!(as_u8, U8, u8);
    impl_accessor!(as_u16, U16, u16);
    impl_accessor!(as_u32, U32, u32);
    impl_accessor!(as_u64, U64, u64);
    impl_accessor!(as_i8, I8, i8);
    impl_accessor!(as_i16, I16, i16);
    impl_accessor!(as_i32, I32, i32);
    impl_accessor!(as_i64, I64, i64);
    impl_accessor!(as_f32, F32, f32);
    impl_accessor!(as_f64, F64, f64);

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// Elements of a sequence or array.
    pub fn as_sequence(&self) -> Option<&[FieldValue]> {
        match self {
            Self::Sequence(v) | Self::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Field values of a nested message.
    pub fn as_message(&self) -> Option<&FieldValues> {
        match self {
            Self::Message(v) => Some(v),
            _ => None,
        }
    }

    /// Short kind name used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::U8(_) => "u8",
            Self::U16(_) => "u16",
            Self::U32(_) => "u32",
            Self::U64(_) => "u64",
            Self::I8(_) => "i8",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Sequence(_) => "sequence",
            Self::Array(_) => "array",
            Self::Message(_) => "message",
            Self::Null => "null",
        }
    }
}

impl_from!(bool, Bool);
impl_from!(u8, U8);
impl_from!(u16, U16);
impl_from!(u32, U32);
impl_from!(u64, U64);
impl_from!(i8, I8);
impl_from!(i16, I16);
impl_from!(i32, I32);
impl_from!(i64, I64);
impl_from!(f32, F32);
impl_from!(f64, F64);
impl_from!(String, String);
impl_from!(Vec<u8>, Bytes);
impl_from!(FieldValues, Message);

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<&[u8]> for FieldValue {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Collect `(name, value)` pairs into `FieldValues`.
///
/// ```rust
/// use mcbus::{field_values, FieldValue};
///
/// let values = field_values([("seq", FieldValue::U32(1)), ("ts", FieldValue::U64(1000))]);
/// assert_eq!(values.len(), 2);
/// ```
pub fn field_values<I, K, V>(pairs: I) -> FieldValues
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<FieldValue>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
