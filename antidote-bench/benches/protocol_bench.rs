//! Protocol encoding/decoding benchmarks.

use antidote_client::{CrdtFactory, CrdtType, CrdtValue, MessagePack, ObjectRef};
use antidote_protocol::frame::Frame;
use antidote_protocol::proto::*;
use antidote_protocol::{Decoder, Encoder, Request, Response};
use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

struct Bucket;

impl CrdtFactory for Bucket {
    fn object(&self, key: &str, kind: CrdtType) -> ObjectRef {
        ObjectRef::new(key, kind, "bench")
    }
}

fn create_update_request(ops: usize) -> Request {
    let updates = (0..ops)
        .map(|i| Bucket.counter(&format!("counter-{}", i)).increment(1))
        .collect();
    Request::StaticUpdateObjects(ApbStaticUpdateObjects {
        transaction: ApbStartTransaction::default(),
        updates,
    })
}

fn create_read_response(objects: usize) -> Response {
    let set = ApbReadObjectResp {
        set: Some(ApbGetSetResp {
            value: (0..8).map(|i| Bytes::from(format!("element-{}", i))).collect(),
        }),
        ..Default::default()
    };
    Response::StaticReadObjects(ApbStaticReadObjectsResp {
        objects: ApbReadObjectsResp {
            success: true,
            objects: vec![set; objects],
            errorcode: None,
        },
        committime: ApbCommitResp {
            success: true,
            commit_time: Some(Bytes::from_static(b"bench-commit-time")),
            errorcode: None,
        },
    })
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let frame = Frame::new(127, Bytes::from("x".repeat(size)));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let encoded = Frame::new(127, Bytes::from("x".repeat(size)))
            .encode()
            .unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_request_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_update_encode");

    for ops in [1, 10, 100] {
        let request = create_update_request(ops);

        group.throughput(Throughput::Elements(ops as u64));
        group.bench_with_input(BenchmarkId::from_parameter(ops), &request, |b, request| {
            b.iter(|| black_box(Encoder::encode_request(request).unwrap()));
        });
    }

    group.finish();
}

fn bench_response_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_read_decode");

    for objects in [1, 10, 100] {
        let encoded = Encoder::encode_response(&create_read_response(objects)).unwrap();

        group.throughput(Throughput::Elements(objects as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(objects),
            &encoded,
            |b, encoded| {
                b.iter(|| {
                    let mut decoder = Decoder::new();
                    decoder.extend(encoded);
                    black_box(decoder.decode_inbound().unwrap())
                });
            },
        );
    }

    group.finish();
}

fn bench_chunked_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("chunked_decode");

    let mut wire = Vec::new();
    for _ in 0..64 {
        wire.extend_from_slice(&Encoder::encode_response(&create_read_response(4)).unwrap());
    }

    for chunk in [16, 256, 4096] {
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                let mut frames = 0;
                for piece in wire.chunks(chunk) {
                    decoder.extend(piece);
                    while decoder.decode_frame().unwrap().is_some() {
                        frames += 1;
                    }
                }
                black_box(frames)
            });
        });
    }

    group.finish();
}

fn bench_nested_map_update(c: &mut Criterion) {
    c.bench_function("nested_map_update", |b| {
        let outer = Bucket.map("user");
        let inner = outer.gmap("stats");
        let counter = inner.counter("visits");
        b.iter(|| black_box(counter.increment(1)));
    });
}

fn bench_value_decode(c: &mut Criterion) {
    let entries = (0..32)
        .map(|i| ApbMapEntry {
            key: ApbMapKey {
                key: Bytes::from(format!("field-{}", i)),
                r#type: CrdtType::Counter as i32,
            },
            value: ApbReadObjectResp {
                counter: Some(ApbGetCounterResp { value: i }),
                ..Default::default()
            },
        })
        .collect();
    let resp = ApbReadObjectResp {
        map: Some(ApbGetMapResp { entries }),
        ..Default::default()
    };

    c.bench_function("map_value_decode", |b| {
        b.iter(|| black_box(CrdtValue::decode(CrdtType::Awmap, &resp, &MessagePack).unwrap()));
    });
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_request_encode,
    bench_response_decode,
    bench_chunked_decode,
    bench_nested_map_update,
    bench_value_decode,
);

criterion_main!(benches);
