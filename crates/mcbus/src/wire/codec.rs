// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Schema-driven payload codec and frame helpers.
//!
//! Fields are written in declaration order with no padding. `String`, `Bytes`
//! and `Sequence` carry a `u32` length prefix, `Array` does not, nested
//! messages are inlined, and optional fields are preceded by a presence byte.

use crate::config::{HEADER_LEN, MAX_DATAGRAM_SIZE};
use crate::error::{Error, Result};
use crate::schema::{FieldKind, FieldValue, FieldValues, MessageType, PrimitiveKind};
use crate::wire::cursor::{WireError, WireReader, WireResult, WireWriter};
use crate::wire::header::FrameHeader;

/// Frame decoded against a known message type.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub header: FrameHeader,
    pub values: FieldValues,
}

// ===== Payload =====

/// Encode field values as a payload (no header).
///
/// # Errors
///
/// `Error::Validation` when the values do not satisfy the schema.
pub fn encode_payload(message_type: &MessageType, values: &FieldValues) -> Result<Vec<u8>> {
    message_type.validate(values)?;
    let mut w = WireWriter::with_capacity(message_type.min_size());
    write_message(&mut w, message_type, values)?;
    Ok(w.into_inner())
}

/// Decode a payload (no header); every byte must be consumed.
///
/// # Errors
///
/// `Error::Decode` for truncated, malformed or over-long payloads.
pub fn decode_payload(message_type: &MessageType, payload: &[u8]) -> Result<FieldValues> {
    let mut r = WireReader::new(payload);
    read_message(&mut r, message_type)
        .and_then(|values| r.finish().map(|()| values))
        .map_err(|e| decode_error(&e, payload.len(), 0))
}

fn write_message(w: &mut WireWriter, ty: &MessageType, values: &FieldValues) -> Result<()> {
    for field in ty.fields() {
        let value = values.get(&field.name).filter(|v| !v.is_null());
        if field.optional {
            w.write_bool(value.is_some());
        }
        match value {
            Some(value) => write_value(w, &field.kind, value)?,
            None if field.optional => {}
            None => {
                return Err(Error::Validation(format!(
                    "{}.{}: required field missing",
                    ty.name(),
                    field.name
                )))
            }
        }
    }
    Ok(())
}

fn write_value(w: &mut WireWriter, kind: &FieldKind, value: &FieldValue) -> Result<()> {
    match (kind, value) {
        (FieldKind::Primitive(p), value) => write_primitive(w, p, value),
        (FieldKind::Sequence { element, .. }, FieldValue::Sequence(items)) => {
            if element.min_size() == 0 && items.len() > MAX_DATAGRAM_SIZE {
                return Err(Error::Validation(format!(
                    "sequence of {} zero-size elements exceeds {}",
                    items.len(),
                    MAX_DATAGRAM_SIZE
                )));
            }
            w.write_len(items.len()).map_err(length_error)?;
            items.iter().try_for_each(|item| write_value(w, element, item))
        }
        (FieldKind::Array { element, .. }, FieldValue::Array(items)) => {
            items.iter().try_for_each(|item| write_value(w, element, item))
        }
        (FieldKind::Nested(ty), FieldValue::Message(inner)) => write_message(w, ty, inner),
        (_, value) => Err(Error::Validation(format!(
            "cannot encode {} value",
            value.kind_name()
        ))),
    }
}

fn write_primitive(w: &mut WireWriter, kind: &PrimitiveKind, value: &FieldValue) -> Result<()> {
    match (kind, value) {
        (PrimitiveKind::Bool, FieldValue::Bool(v)) => w.write_bool(*v),
        (PrimitiveKind::U8, FieldValue::U8(v)) => w.write_u8(*v),
        (PrimitiveKind::U16, FieldValue::U16(v)) => w.write_u16(*v),
        (PrimitiveKind::U32, FieldValue::U32(v)) => w.write_u32(*v),
        (PrimitiveKind::U64, FieldValue::U64(v)) => w.write_u64(*v),
        (PrimitiveKind::I8, FieldValue::I8(v)) => w.write_i8(*v),
        (PrimitiveKind::I16, FieldValue::I16(v)) => w.write_i16(*v),
        (PrimitiveKind::I32, FieldValue::I32(v)) => w.write_i32(*v),
        (PrimitiveKind::I64, FieldValue::I64(v)) => w.write_i64(*v),
        (PrimitiveKind::F32, FieldValue::F32(v)) => w.write_f32(*v),
        (PrimitiveKind::F64, FieldValue::F64(v)) => w.write_f64(*v),
        (PrimitiveKind::String { .. }, FieldValue::String(s)) => {
            w.write_prefixed(s.as_bytes()).map_err(length_error)?;
        }
        (PrimitiveKind::Bytes { .. }, FieldValue::Bytes(b)) => {
            w.write_prefixed(b).map_err(length_error)?;
        }
        (_, value) => {
            return Err(Error::Validation(format!(
                "cannot encode {} value as {:?}",
                value.kind_name(),
                kind
            )))
        }
    }
    Ok(())
}

fn read_message(r: &mut WireReader<'_>, ty: &MessageType) -> WireResult<FieldValues> {
    let mut values = FieldValues::with_capacity(ty.fields().len());
    for field in ty.fields() {
        if field.optional && !r.read_presence()? {
            values.insert(field.name.clone(), FieldValue::Null);
            continue;
        }
        values.insert(field.name.clone(), read_value(r, &field.kind)?);
    }
    Ok(values)
}

fn read_value(r: &mut WireReader<'_>, kind: &FieldKind) -> WireResult<FieldValue> {
    let value = match kind {
        FieldKind::Primitive(p) => read_primitive(r, p)?,
        FieldKind::Sequence {
            element,
            max_length,
        } => {
            let count = r.read_len(*max_length)?;
            // Reject counts the remaining bytes cannot hold before allocating.
            // Zero-size elements cost no bytes, so their count is capped by
            // the datagram size instead.
            let floor = element.min_size();
            if floor == 0 && count > MAX_DATAGRAM_SIZE {
                return Err(WireError::LengthExceeded {
                    offset: r.offset(),
                    length: count,
                    max: MAX_DATAGRAM_SIZE,
                });
            }
            if floor > 0 && count.saturating_mul(floor) > r.remaining() {
                return Err(WireError::UnexpectedEnd {
                    offset: r.offset(),
                    needed: count.saturating_mul(floor),
                });
            }
            let mut items = Vec::with_capacity(count.min(r.remaining() + 1));
            for _ in 0..count {
                items.push(read_value(r, element)?);
            }
            FieldValue::Sequence(items)
        }
        FieldKind::Array { element, length } => {
            let mut items = Vec::with_capacity((*length).min(r.remaining()));
            for _ in 0..*length {
                items.push(read_value(r, element)?);
            }
            FieldValue::Array(items)
        }
        FieldKind::Nested(ty) => FieldValue::Message(read_message(r, ty)?),
    };
    Ok(value)
}

fn read_primitive(r: &mut WireReader<'_>, kind: &PrimitiveKind) -> WireResult<FieldValue> {
    let value = match kind {
        PrimitiveKind::Bool => FieldValue::Bool(r.read_bool()?),
        PrimitiveKind::U8 => FieldValue::U8(r.read_u8()?),
        PrimitiveKind::U16 => FieldValue::U16(r.read_u16()?),
        PrimitiveKind::U32 => FieldValue::U32(r.read_u32()?),
        PrimitiveKind::U64 => FieldValue::U64(r.read_u64()?),
        PrimitiveKind::I8 => FieldValue::I8(r.read_i8()?),
        PrimitiveKind::I16 => FieldValue::I16(r.read_i16()?),
        PrimitiveKind::I32 => FieldValue::I32(r.read_i32()?),
        PrimitiveKind::I64 => FieldValue::I64(r.read_i64()?),
        PrimitiveKind::F32 => FieldValue::F32(r.read_f32()?),
        PrimitiveKind::F64 => FieldValue::F64(r.read_f64()?),
        PrimitiveKind::String { max_length } => FieldValue::String(r.read_string(*max_length)?),
        PrimitiveKind::Bytes { max_length } => {
            FieldValue::Bytes(r.read_prefixed(*max_length)?.to_vec())
        }
    };
    Ok(value)
}

// ===== Frames =====

/// Encode a complete frame: header followed by payload.
///
/// # Errors
///
/// `Error::Validation` when the values are invalid or the frame would exceed
/// `MAX_DATAGRAM_SIZE`.
pub fn encode_frame(
    message_type: &MessageType,
    values: &FieldValues,
    sequence: u64,
    timestamp_us: u64,
) -> Result<Vec<u8>> {
    let payload = encode_payload(message_type, values)?;
    let frame_len = HEADER_LEN + payload.len();
    if frame_len > MAX_DATAGRAM_SIZE {
        return Err(Error::Validation(format!(
            "{}: frame of {} bytes exceeds maximum datagram size {}",
            message_type.name(),
            frame_len,
            MAX_DATAGRAM_SIZE
        )));
    }
    let payload_len = u32::try_from(payload.len())
        .map_err(|_| Error::Validation("payload length overflows u32".into()))?;

    let header = FrameHeader::new(message_type.fingerprint(), sequence, payload_len, timestamp_us);
    let mut w = WireWriter::with_capacity(frame_len);
    header.write_to(&mut w);
    w.write_bytes(&payload);
    Ok(w.into_inner())
}

/// Split a datagram into its header and payload.
///
/// # Errors
///
/// - `Error::Protocol` for a bad magic or version
/// - `Error::Decode` when the header's payload length disagrees with the datagram
pub fn decode_frame(datagram: &[u8]) -> Result<(FrameHeader, &[u8])> {
    let header = FrameHeader::decode(datagram)?;
    let expected_len = HEADER_LEN + header.payload_len as usize;
    if datagram.len() != expected_len {
        return Err(Error::Decode {
            endpoint: None,
            raw_len: datagram.len(),
            expected_len,
            reason: "payload length does not match datagram length".into(),
        });
    }
    Ok((header, &datagram[HEADER_LEN..]))
}

/// Decode a datagram against the locally registered message type.
///
/// # Errors
///
/// - `Error::Protocol` for a bad magic or version
/// - `Error::SchemaMismatch` when the fingerprint differs from `message_type`'s
/// - `Error::Decode` for a malformed payload
pub fn decode_frame_for(message_type: &MessageType, datagram: &[u8]) -> Result<DecodedFrame> {
    let (header, payload) = decode_frame(datagram)?;
    if header.fingerprint != message_type.fingerprint() {
        return Err(Error::SchemaMismatch {
            type_name: message_type.name().to_string(),
            expected: message_type.fingerprint(),
            received: header.fingerprint,
        });
    }
    let mut r = WireReader::new(payload);
    let values = read_message(&mut r, message_type)
        .and_then(|values| r.finish().map(|()| values))
        .map_err(|e| decode_error(&e, datagram.len(), HEADER_LEN))?;
    Ok(DecodedFrame { header, values })
}

fn decode_error(err: &WireError, raw_len: usize, base: usize) -> Error {
    Error::Decode {
        endpoint: None,
        raw_len,
        expected_len: base.saturating_add(err.expected_len()),
        reason: err.to_string(),
    }
}

fn length_error(err: WireError) -> Error {
    Error::Validation(err.to_string())
}
