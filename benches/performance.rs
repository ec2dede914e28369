//! Performance benchmarks for the message bus.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fanout::{Broker, CancellationToken, Message, Payload, Registry, Subscribable};
use std::sync::Arc;
use std::time::Duration;

/// Benchmark fan-out cost with a growing number of subscribers
fn bench_fanout(c: &mut Criterion) {
    let mut group = c.benchmark_group("fanout");

    for subscribers in [1, 10, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("subscribers", subscribers),
            &subscribers,
            |b, &count| {
                let registry = Registry::new();
                let subs: Vec<_> = (0..count)
                    .map(|i| registry.subscribe(&format!("athome\\.room{}|athome\\..*", i)))
                    .collect();

                // Messages are only built by the bus; take one from a broker.
                let token = CancellationToken::new();
                let broker = Broker::new(&token).unwrap();
                let probe = broker.subscribe(".*");
                broker.publish("athome.kitchen", Payload::empty());
                let msg: Arc<Message> = probe.recv_timeout(Duration::from_secs(1)).unwrap();

                b.iter(|| {
                    black_box(registry.notify_all(&msg));
                    for sub in &subs {
                        let _ = sub.try_recv();
                    }
                });
            },
        );
    }

    group.finish();
}

/// Benchmark topic pattern matching
fn bench_pattern_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_matching");

    for (name, pattern) in [
        ("literal", "athome\\.kitchen"),
        ("prefix", "athome\\..*"),
        ("alternation", "athome\\.(kitchen|bedroom|attic)"),
        ("any", ".*"),
    ] {
        let pattern = fanout::TopicPattern::new(pattern);
        group.bench_function(name, |b| {
            b.iter(|| black_box(pattern.matches(black_box("athome.kitchen"))));
        });
    }

    group.finish();
}

/// Benchmark publish latency, including the drop path when the queue is full
fn bench_publish(c: &mut Criterion) {
    let mut group = c.benchmark_group("publish");

    group.bench_function("with_subscriber", |b| {
        let token = CancellationToken::new();
        let broker = Broker::new(&token).unwrap();
        let sub = broker.subscribe(".*");

        b.iter(|| {
            black_box(broker.publish("bench", Payload::empty()));
            let _ = sub.try_recv();
        });
    });

    group.bench_function("closed_broker", |b| {
        let token = CancellationToken::new();
        let broker = Broker::new(&token).unwrap();
        broker.close();

        b.iter(|| black_box(broker.publish("bench", Payload::empty())));
    });

    group.finish();
}

criterion_group!(benches, bench_fanout, bench_pattern_matching, bench_publish);
criterion_main!(benches);
