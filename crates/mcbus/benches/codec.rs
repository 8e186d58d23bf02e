// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Codec Benchmark
//!
//! Measures frame encode/decode cost for:
//! - the fixed-size `Ping` message
//! - a bytes payload of growing size (64B .. 60KB)
//! - a nested message with sequences and optionals
//!
//! No sockets are involved.

#![allow(clippy::cast_possible_truncation)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mcbus::schema::{FieldKind, MessageTypeBuilder, PrimitiveKind};
use mcbus::wire::{decode_frame_for, encode_frame};
use mcbus::{field_values, FieldValue};
use std::hint::black_box as bb;

fn bench_ping(c: &mut Criterion) {
    let ty = MessageTypeBuilder::new("Ping")
        .field("seq", PrimitiveKind::U32)
        .field("ts", PrimitiveKind::U64)
        .build()
        .expect("valid type");
    let values = field_values([("seq", FieldValue::U32(1)), ("ts", FieldValue::U64(1000))]);
    let frame = encode_frame(&ty, &values, 1, 0).expect("encode");

    let mut group = c.benchmark_group("ping");
    group.bench_function("encode", |b| {
        b.iter(|| encode_frame(bb(&ty), bb(&values), 1, 0).expect("encode"));
    });
    group.bench_function("decode", |b| {
        b.iter(|| decode_frame_for(bb(&ty), bb(&frame)).expect("decode"));
    });
    group.finish();
}

fn bench_payload_sizes(c: &mut Criterion) {
    let ty = MessageTypeBuilder::new("Blob")
        .field("seq", PrimitiveKind::U64)
        .bytes_field("data")
        .build()
        .expect("valid type");

    let mut group = c.benchmark_group("bytes_payload");
    for size in [64usize, 1024, 4096, 16384, 61440] {
        let values = field_values([
            ("seq", FieldValue::U64(1)),
            ("data", FieldValue::Bytes(vec![0xab; size])),
        ]);
        let frame = encode_frame(&ty, &values, 1, 0).expect("encode");
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("encode", size), &values, |b, values| {
            b.iter(|| encode_frame(&ty, bb(values), 1, 0).expect("encode"));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &frame, |b, frame| {
            b.iter(|| decode_frame_for(&ty, bb(frame)).expect("decode"));
        });
    }
    group.finish();
}

fn bench_nested(c: &mut Criterion) {
    let point = MessageTypeBuilder::new("Point")
        .field("x", PrimitiveKind::F64)
        .field("y", PrimitiveKind::F64)
        .build()
        .expect("valid type");
    let track = MessageTypeBuilder::new("Track")
        .string_field("id")
        .optional_field("quality", PrimitiveKind::U8)
        .sequence_field("points", FieldKind::Nested(point))
        .build()
        .expect("valid type");

    let points = (0..64u32).map(|i| {
        FieldValue::Message(field_values([
            ("x", FieldValue::F64(f64::from(i))),
            ("y", FieldValue::F64(f64::from(i) * 0.5)),
        ]))
    });
    let values = field_values([
        ("id", FieldValue::from("track-0001")),
        ("quality", FieldValue::U8(3)),
        ("points", FieldValue::sequence(points)),
    ]);
    let frame = encode_frame(&track, &values, 1, 0).expect("encode");

    let mut group = c.benchmark_group("nested_track");
    group.bench_function("encode", |b| {
        b.iter(|| encode_frame(&track, bb(&values), 1, 0).expect("encode"));
    });
    group.bench_function("decode", |b| {
        b.iter(|| decode_frame_for(&track, bb(&frame)).expect("decode"));
    });
    group.finish();
}

criterion_group!(benches, bench_ping, bench_payload_sizes, bench_nested);
criterion_main!(benches);
