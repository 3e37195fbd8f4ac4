use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;
use tbfsim_core::{
    packet::{FlowId, Packet, Priority},
    Bandwidth, PacketQueue, TokenBucket,
};

const FLOW: FlowId = FlowId::new(1);
const RATE: Bandwidth = Bandwidth::new(600 * 1_024, Duration::from_secs(1));

fn queue(c: &mut Criterion) {
    let queue = PacketQueue::new(10_000);

    c.bench_function("enqueue_dequeue", |b| {
        b.iter(|| {
            queue.enqueue(black_box(Packet::new(FLOW, 512, Priority::Medium)));
            queue.try_dequeue()
        })
    });

    // a deep queue exercises the heap sift paths
    for _ in 0..5_000 {
        queue.enqueue(Packet::new(FLOW, 512, Priority::Medium));
    }

    c.bench_function("enqueue_dequeue_deep", |b| {
        b.iter(|| {
            queue.enqueue(black_box(Packet::new(FLOW, 512, Priority::High)));
            queue.try_dequeue()
        })
    });
}

fn bucket(c: &mut Criterion) {
    let bucket = TokenBucket::new(RATE, 100 * 1_024);

    c.bench_function("consume", |b| b.iter(|| bucket.consume(black_box(512))));

    c.bench_function("current_tokens", |b| b.iter(|| bucket.current_tokens()));
}

criterion_group!(benches, queue, bucket);
criterion_main!(benches);
