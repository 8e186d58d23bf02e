// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Message type descriptors and schema fingerprints.

use crate::error::{Error, Result};
use crate::schema::{FieldValue, FieldValues};
use md5::{Digest, Md5};
use std::fmt::Write as _;
use std::sync::Arc;

/// Primitive field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    /// UTF-8 text, `u32` length prefix. Bound is in bytes.
    String { max_length: Option<usize> },
    /// Opaque bytes, `u32` length prefix.
    Bytes { max_length: Option<usize> },
}

impl PrimitiveKind {
    /// Encoded size in bytes (`None` for length-prefixed kinds).
    pub fn size(&self) -> Option<usize> {
        match self {
            Self::Bool | Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 => Some(8),
            Self::String { .. } | Self::Bytes { .. } => None,
        }
    }

    fn write_canonical(&self, out: &mut String) {
        let (name, bound) = match self {
            Self::Bool => ("bool", None),
            Self::U8 => ("u8", None),
            Self::U16 => ("u16", None),
            Self::U32 => ("u32", None),
            Self::U64 => ("u64", None),
            Self::I8 => ("i8", None),
            Self::I16 => ("i16", None),
            Self::I32 => ("i32", None),
            Self::I64 => ("i64", None),
            Self::F32 => ("f32", None),
            Self::F64 => ("f64", None),
            Self::String { max_length } => ("string", *max_length),
            Self::Bytes { max_length } => ("bytes", *max_length),
        };
        out.push_str(name);
        if let Some(max) = bound {
            let _ = write!(out, "<{}>", max);
        }
    }
}

/// Kind of a message field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Primitive(PrimitiveKind),
    /// Variable length, `u32` count prefix.
    Sequence {
        element: Box<FieldKind>,
        max_length: Option<usize>,
    },
    /// Fixed length, no prefix.
    Array { element: Box<FieldKind>, length: usize },
    /// Another message type, encoded inline.
    Nested(Arc<MessageType>),
}

impl FieldKind {
    pub fn sequence(element: FieldKind, max_length: Option<usize>) -> Self {
        Self::Sequence {
            element: Box::new(element),
            max_length,
        }
    }

    pub fn array(element: FieldKind, length: usize) -> Self {
        Self::Array {
            element: Box::new(element),
            length,
        }
    }

    /// Minimum encoded size of a value of this kind.
    pub fn min_size(&self) -> usize {
        match self {
            Self::Primitive(p) => p.size().unwrap_or(4),
            Self::Sequence { .. } => 4,
            Self::Array { element, length } => element.min_size().saturating_mul(*length),
            Self::Nested(ty) => ty.min_size(),
        }
    }

    fn write_canonical(&self, out: &mut String) {
        match self {
            Self::Primitive(p) => p.write_canonical(out),
            Self::Sequence {
                element,
                max_length,
            } => {
                out.push_str("seq<");
                element.write_canonical(out);
                if let Some(max) = max_length {
                    let _ = write!(out, ",{}", max);
                }
                out.push('>');
            }
            Self::Array { element, length } => {
                element.write_canonical(out);
                let _ = write!(out, "[{}]", length);
            }
            Self::Nested(ty) => ty.write_canonical(out),
        }
    }
}

impl From<PrimitiveKind> for FieldKind {
    fn from(kind: PrimitiveKind) -> Self {
        Self::Primitive(kind)
    }
}

/// Named field of a message type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
    /// Absent values are allowed and encoded as a single `0` presence byte.
    pub optional: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: impl Into<FieldKind>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            optional: false,
        }
    }

    /// Mark field as optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// Schema of one message type: a unique name and an ordered field list.
///
/// Immutable once built. The fingerprint is derived from the canonical schema
/// string, so every process that builds the same schema agrees on it.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageType {
    name: String,
    fields: Vec<FieldDescriptor>,
    fingerprint: u64,
}

impl MessageType {
    /// Build a message type, checking names and computing the fingerprint.
    ///
    /// # Errors
    ///
    /// `Error::Configuration` for an empty or malformed type name, an invalid
    /// field name, or duplicated field names.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() || name.chars().any(|c| c.is_whitespace() || "{},".contains(c)) {
            return Err(Error::Configuration(format!(
                "invalid message type name '{}'",
                name
            )));
        }
        for (idx, field) in fields.iter().enumerate() {
            let valid = !field.name.is_empty()
                && field
                    .name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(Error::Configuration(format!(
                    "{}: invalid field name '{}'",
                    name, field.name
                )));
            }
            if fields[..idx].iter().any(|f| f.name == field.name) {
                return Err(Error::Configuration(format!(
                    "{}: duplicate field '{}'",
                    name, field.name
                )));
            }
        }

        let mut ty = Self {
            name,
            fields,
            fingerprint: 0,
        };
        ty.fingerprint = fingerprint_of(&ty.canonical_schema());
        Ok(ty)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Get field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// 64-bit schema fingerprint carried in every frame header.
    pub fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    /// Canonical schema string, e.g. `Ping{seq:u32,ts:u64}`.
    pub fn canonical_schema(&self) -> String {
        let mut out = String::new();
        self.write_canonical(&mut out);
        out
    }

    /// Minimum payload size (all optionals absent, all sequences empty).
    pub fn min_size(&self) -> usize {
        self.fields
            .iter()
            .map(|f| if f.optional { 1 } else { f.kind.min_size() })
            .sum()
    }

    fn write_canonical(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push('{');
        for (idx, field) in self.fields.iter().enumerate() {
            if idx > 0 {
                out.push(',');
            }
            out.push_str(&field.name);
            if field.optional {
                out.push('?');
            }
            out.push(':');
            field.kind.write_canonical(out);
        }
        out.push('}');
    }

    /// Check field values against this schema.
    ///
    /// Required fields must be present, optional fields may be absent or
    /// `Null`, every value must agree with its declared kind and bounds, and
    /// unknown fields are rejected.
    ///
    /// # Errors
    ///
    /// `Error::Validation` naming the offending field path.
    pub fn validate(&self, values: &FieldValues) -> Result<()> {
        self.validate_at(values, &self.name)
    }

    fn validate_at(&self, values: &FieldValues, path: &str) -> Result<()> {
        if let Some(unknown) = values.keys().find(|k| self.field(k).is_none()) {
            return Err(Error::Validation(format!(
                "{}: unknown field '{}'",
                path, unknown
            )));
        }
        for field in &self.fields {
            let field_path = format!("{}.{}", path, field.name);
            match values.get(&field.name) {
                None | Some(FieldValue::Null) if field.optional => {}
                None | Some(FieldValue::Null) => {
                    return Err(Error::Validation(format!(
                        "{}: required field missing",
                        field_path
                    )));
                }
                Some(value) => check_value(&field.kind, value, &field_path)?,
            }
        }
        Ok(())
    }
}

fn check_value(kind: &FieldKind, value: &FieldValue, path: &str) -> Result<()> {
    match (kind, value) {
        (FieldKind::Primitive(p), value) => check_primitive(p, value, path),
        (
            FieldKind::Sequence {
                element,
                max_length,
            },
            FieldValue::Sequence(items),
        ) => {
            if let Some(max) = max_length {
                if items.len() > *max {
                    return Err(Error::Validation(format!(
                        "{}: sequence length {} exceeds maximum {}",
                        path,
                        items.len(),
                        max
                    )));
                }
            }
            check_elements(element, items, path)
        }
        (FieldKind::Array { element, length }, FieldValue::Array(items)) => {
            if items.len() != *length {
                return Err(Error::Validation(format!(
                    "{}: array length {} != declared {}",
                    path,
                    items.len(),
                    length
                )));
            }
            check_elements(element, items, path)
        }
        (FieldKind::Nested(ty), FieldValue::Message(inner)) => ty.validate_at(inner, path),
        (kind, value) => Err(mismatch(kind, value, path)),
    }
}

fn check_elements(element: &FieldKind, items: &[FieldValue], path: &str) -> Result<()> {
    for (idx, item) in items.iter().enumerate() {
        check_value(element, item, &format!("{}[{}]", path, idx))?;
    }
    Ok(())
}

fn check_primitive(kind: &PrimitiveKind, value: &FieldValue, path: &str) -> Result<()> {
    let ok = match (kind, value) {
        (PrimitiveKind::Bool, FieldValue::Bool(_))
        | (PrimitiveKind::U8, FieldValue::U8(_))
        | (PrimitiveKind::U16, FieldValue::U16(_))
        | (PrimitiveKind::U32, FieldValue::U32(_))
        | (PrimitiveKind::U64, FieldValue::U64(_))
        | (PrimitiveKind::I8, FieldValue::I8(_))
        | (PrimitiveKind::I16, FieldValue::I16(_))
        | (PrimitiveKind::I32, FieldValue::I32(_))
        | (PrimitiveKind::I64, FieldValue::I64(_))
        | (PrimitiveKind::F32, FieldValue::F32(_))
        | (PrimitiveKind::F64, FieldValue::F64(_)) => true,
        (PrimitiveKind::String { max_length }, FieldValue::String(s)) => {
            check_bound(*max_length, s.len(), path)?;
            true
        }
        (PrimitiveKind::Bytes { max_length }, FieldValue::Bytes(b)) => {
            check_bound(*max_length, b.len(), path)?;
            true
        }
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(mismatch(&FieldKind::Primitive(*kind), value, path))
    }
}

fn check_bound(max_length: Option<usize>, len: usize, path: &str) -> Result<()> {
    match max_length {
        Some(max) if len > max => Err(Error::Validation(format!(
            "{}: length {} exceeds maximum {}",
            path, len, max
        ))),
        _ => Ok(()),
    }
}

fn mismatch(kind: &FieldKind, value: &FieldValue, path: &str) -> Error {
    let mut expected = String::new();
    kind.write_canonical(&mut expected);
    Error::Validation(format!(
        "{}: expected {}, got {}",
        path,
        expected,
        value.kind_name()
    ))
}

/// First 8 bytes (little-endian) of the MD5 digest of the canonical schema.
pub(crate) fn fingerprint_of(canonical: &str) -> u64 {
    let digest = Md5::digest(canonical.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{field_values, MessageTypeBuilder};

    fn ping() -> Arc<MessageType> {
        MessageTypeBuilder::new("Ping")
            .field("seq", PrimitiveKind::U32)
            .field("ts", PrimitiveKind::U64)
            .build()
            .expect("valid type")
    }

    #[test]
    fn test_canonical_schema() {
        assert_eq!(ping().canonical_schema(), "Ping{seq:u32,ts:u64}");

        let point = MessageTypeBuilder::new("Point")
            .field("x", PrimitiveKind::F64)
            .field("y", PrimitiveKind::F64)
            .build()
            .expect("valid type");
        let path = MessageTypeBuilder::new("Path")
            .bounded_string_field("label", 32)
            .optional_field("note", PrimitiveKind::String { max_length: None })
            .sequence_field("points", FieldKind::Nested(point))
            .array_field("crc", PrimitiveKind::U8, 4)
            .build()
            .expect("valid type");
        assert_eq!(
            path.canonical_schema(),
            "Path{label:string<32>,note?:string,points:seq<Point{x:f64,y:f64}>,crc:u8[4]}"
        );
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        assert_eq!(ping().fingerprint(), ping().fingerprint());
        assert_eq!(ping().fingerprint(), fingerprint_of("Ping{seq:u32,ts:u64}"));
        assert_ne!(ping().fingerprint(), 0);
    }

    #[test]
    fn test_fingerprint_tracks_schema() {
        let other = MessageTypeBuilder::new("Ping")
            .field("seq", PrimitiveKind::U64)
            .field("ts", PrimitiveKind::U64)
            .build()
            .expect("valid type");
        assert_ne!(ping().fingerprint(), other.fingerprint());

        let renamed = MessageTypeBuilder::new("Pong")
            .field("seq", PrimitiveKind::U32)
            .field("ts", PrimitiveKind::U64)
            .build()
            .expect("valid type");
        assert_ne!(ping().fingerprint(), renamed.fingerprint());
    }

    #[test]
    fn test_invalid_names() {
        assert!(MessageType::new("", vec![]).is_err());
        assert!(MessageType::new("Bad Name", vec![]).is_err());
        assert!(MessageType::new(
            "Dup",
            vec![
                FieldDescriptor::new("a", PrimitiveKind::U8),
                FieldDescriptor::new("a", PrimitiveKind::U16),
            ]
        )
        .is_err());
        assert!(MessageType::new("Field", vec![FieldDescriptor::new("a:b", PrimitiveKind::U8)]).is_err());
        assert!(MessageType::new("sensors.Empty", vec![]).is_ok());
    }

    #[test]
    fn test_validate_accepts_valid_values() {
        let values = field_values([("seq", FieldValue::U32(1)), ("ts", FieldValue::U64(1000))]);
        assert!(ping().validate(&values).is_ok());
    }

    #[test]
    fn test_validate_rejections() {
        let ty = ping();

        let missing = field_values([("seq", FieldValue::U32(1))]);
        assert!(matches!(ty.validate(&missing), Err(Error::Validation(_))));

        let wrong_type = field_values([("seq", FieldValue::U64(1)), ("ts", FieldValue::U64(1))]);
        let err = ty.validate(&wrong_type).expect_err("type mismatch");
        assert!(err.to_string().contains("Ping.seq"));

        let unknown = field_values([
            ("seq", FieldValue::U32(1)),
            ("ts", FieldValue::U64(1)),
            ("extra", FieldValue::Bool(true)),
        ]);
        assert!(ty.validate(&unknown).is_err());
    }

    #[test]
    fn test_validate_bounds_and_optionals() {
        let ty = MessageTypeBuilder::new("Log")
            .bounded_string_field("text", 4)
            .optional_field("level", PrimitiveKind::U8)
            .bounded_sequence_field("tags", PrimitiveKind::U16, 2)
            .array_field("id", PrimitiveKind::U8, 2)
            .build()
            .expect("valid type");

        let ok = field_values([
            ("text", FieldValue::from("abcd")),
            ("tags", FieldValue::sequence([1u16, 2])),
            ("id", FieldValue::array([7u8, 8])),
        ]);
        assert!(ty.validate(&ok).is_ok());

        let mut long_text = ok.clone();
        long_text.insert("text".into(), FieldValue::from("abcde"));
        assert!(ty.validate(&long_text).is_err());

        let mut long_seq = ok.clone();
        long_seq.insert("tags".into(), FieldValue::sequence([1u16, 2, 3]));
        assert!(ty.validate(&long_seq).is_err());

        let mut short_array = ok.clone();
        short_array.insert("id".into(), FieldValue::array([7u8]));
        assert!(ty.validate(&short_array).is_err());

        let mut null_optional = ok;
        null_optional.insert("level".into(), FieldValue::Null);
        assert!(ty.validate(&null_optional).is_ok());
    }
}
