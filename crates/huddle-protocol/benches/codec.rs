//! Codec benchmarks for huddle-protocol.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use huddle_protocol::{codec, ChatMessage, Member, ServerEvent};

fn chat_event() -> ServerEvent {
    ServerEvent::Message(ChatMessage {
        name: "Alice".into(),
        text: "x".repeat(64),
        time: "9:41:00 AM".into(),
    })
}

fn roster_event(size: usize) -> ServerEvent {
    ServerEvent::user_list(
        (0..size)
            .map(|i| Member {
                id: format!("conn_{:x}_{}", i, i),
                name: format!("user-{}", i),
                room: "lobby".into(),
            })
            .collect(),
    )
}

fn bench_encode_chat(c: &mut Criterion) {
    let event = chat_event();

    let mut group = c.benchmark_group("encode_chat");
    group.throughput(Throughput::Bytes(64));
    group.bench_function("json", |b| b.iter(|| codec::encode_json(black_box(&event))));
    group.bench_function("msgpack", |b| {
        b.iter(|| codec::encode_binary(black_box(&event)))
    });
    group.finish();
}

fn bench_decode_chat(c: &mut Criterion) {
    let event = chat_event();
    let text = codec::encode_json(&event).unwrap();
    let binary = codec::encode_binary(&event).unwrap();

    let mut group = c.benchmark_group("decode_chat");
    group.bench_function("json", |b| {
        b.iter(|| codec::decode_json::<ServerEvent>(black_box(&text)))
    });
    group.bench_function("msgpack", |b| {
        b.iter(|| codec::decode_binary::<ServerEvent>(black_box(&binary)))
    });
    group.finish();
}

fn bench_encode_roster(c: &mut Criterion) {
    let event = roster_event(100);

    c.bench_function("encode_roster_100", |b| {
        b.iter(|| codec::encode_json(black_box(&event)))
    });
}

criterion_group!(
    benches,
    bench_encode_chat,
    bench_decode_chat,
    bench_encode_roster
);
criterion_main!(benches);
