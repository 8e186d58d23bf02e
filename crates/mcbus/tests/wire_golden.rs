// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com
//
// Golden vectors: byte-exact frames and endpoints that every implementation
// of the wire format and address mapping must reproduce.

#![allow(clippy::unreadable_literal)]

mod common;

use common::{ping, ping_type};
use mcbus::config::{HEADER_LEN, MAX_DATAGRAM_SIZE};
use mcbus::schema::{MessageTypeBuilder, PrimitiveKind};
use mcbus::wire::{decode_frame_for, encode_frame, FrameHeader};
use mcbus::{endpoint_for, Error, FieldValue, NamespaceConfig};
use std::net::Ipv6Addr;

const PING_FINGERPRINT: u64 = 0x52ce_0369_fab3_4d92;

#[rustfmt::skip]
const PING_FRAME: [u8; 45] = [
    // magic "MCBS", version 1
    0x4d, 0x43, 0x42, 0x53, 0x01,
    // fingerprint (LE)
    0x92, 0x4d, 0xb3, 0xfa, 0x69, 0x03, 0xce, 0x52,
    // sequence 1
    0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    // payload length 12
    0x0c, 0x00, 0x00, 0x00,
    // timestamp 1_700_000_000_000_000 us
    0x00, 0x40, 0x1e, 0x18, 0x24, 0x0a, 0x06, 0x00,
    // seq: u32 = 1, ts: u64 = 1000
    0x01, 0x00, 0x00, 0x00,
    0xe8, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

#[test]
fn test_ping_canonical_schema_and_fingerprint() {
    let ty = ping_type();
    assert_eq!(ty.canonical_schema(), "Ping{seq:u32,ts:u64}");
    assert_eq!(ty.fingerprint(), PING_FINGERPRINT);
}

#[test]
fn test_ping_frame_bytes() {
    let frame = encode_frame(&ping_type(), &ping(1, 1000), 1, 1_700_000_000_000_000)
        .expect("encode");
    assert_eq!(frame.len(), HEADER_LEN + 12);
    assert_eq!(frame, PING_FRAME);
}

#[test]
fn test_ping_frame_decodes() {
    let decoded = decode_frame_for(&ping_type(), &PING_FRAME).expect("decode");
    assert_eq!(
        decoded.header,
        FrameHeader::new(PING_FINGERPRINT, 1, 12, 1_700_000_000_000_000)
    );
    assert_eq!(decoded.values, ping(1, 1000));
}

#[test]
fn test_ping_default_endpoint() {
    let endpoint = endpoint_for("Ping", &NamespaceConfig::default()).expect("endpoint");
    assert_eq!(
        endpoint.group,
        Ipv6Addr::new(0xff15, 0, 0, 0, 0xe9be, 0xe119, 0xc6a3, 0x7b89)
    );
    assert_eq!(endpoint.port, 26_000);
    assert_eq!(endpoint.to_string(), "[ff15::e9be:e119:c6a3:7b89]:26000");
}

#[test]
fn test_variable_fields_layout() {
    let ty = MessageTypeBuilder::new("Log")
        .string_field("text")
        .optional_field("level", PrimitiveKind::U8)
        .sequence_field("tags", PrimitiveKind::U16)
        .build()
        .expect("valid type");
    assert_eq!(ty.canonical_schema(), "Log{text:string,level?:u8,tags:seq<u16>}");

    let values = mcbus::field_values([
        ("text", FieldValue::from("hi")),
        ("level", FieldValue::Null),
        ("tags", FieldValue::sequence([7u16, 8])),
    ]);
    let frame = encode_frame(&ty, &values, 9, 0).expect("encode");
    assert_eq!(
        &frame[HEADER_LEN..],
        &[
            2, 0, 0, 0, b'h', b'i', // text
            0, // level absent
            2, 0, 0, 0, 7, 0, 8, 0, // tags
        ]
    );
}

#[test]
fn test_largest_frame_fits_and_one_more_byte_does_not() {
    let ty = MessageTypeBuilder::new("Blob")
        .bytes_field("data")
        .build()
        .expect("valid type");
    let max_payload = MAX_DATAGRAM_SIZE - HEADER_LEN - 4;

    let fits = mcbus::field_values([("data", FieldValue::Bytes(vec![0xab; max_payload]))]);
    let frame = encode_frame(&ty, &fits, 1, 0).expect("largest frame");
    assert_eq!(frame.len(), MAX_DATAGRAM_SIZE);

    let too_big = mcbus::field_values([("data", FieldValue::Bytes(vec![0xab; max_payload + 1]))]);
    assert!(matches!(
        encode_frame(&ty, &too_big, 1, 0),
        Err(Error::Validation(_))
    ));
}
