//! Queue and rendering benchmark suite.
//!
//! Measures the host-facing hot path:
//! - Inbox delivery then drain at different backlog sizes
//! - Rendering of each message kind
//! - Write command decoding
//!
//! Run with: cargo bench --bench queue_render
//! Results saved to: target/criterion/

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use websock_broker::broker::Inbox;
use websock_broker::protocol::WriteCommand;
use websock_broker::{ConnectionId, InboundFrame, Message, Role, SessionHandler};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const BACKLOG_SIZES: &[usize] = &[16, 256, 4096];

const SAMPLE_OBJECT: &str = r#"{"sensor":"cpu","temp":42.5,"unit":"C","tags":["a","b"]}"#;

// ============================================================================
// Benchmark: Deliver and Drain
// ============================================================================

fn bench_deliver_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("deliver_drain");

    for &size in BACKLOG_SIZES {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("events", size), &size, |b, &size| {
            let inbox = Inbox::new(ConnectionId::next(), Role::Client);
            b.iter(|| {
                for _ in 0..size {
                    inbox.on_event("tick", InboundFrame::new(SAMPLE_OBJECT));
                }
                while let Some(message) = inbox.dequeue() {
                    black_box(message);
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Render
// ============================================================================

fn bench_render(c: &mut Criterion) {
    let receiver = ConnectionId::next();
    let mut group = c.benchmark_group("render");

    let samples = [
        (
            "call",
            Message::Call {
                api: "monitor".into(),
                verb: "get".into(),
                frame: InboundFrame::with_id("7", SAMPLE_OBJECT),
            },
        ),
        (
            "event",
            Message::Event {
                event: "tick".into(),
                frame: InboundFrame::new(SAMPLE_OBJECT),
            },
        ),
        (
            "reply",
            Message::Reply {
                frame: InboundFrame::new(SAMPLE_OBJECT),
            },
        ),
        ("hangup", Message::Hangup),
    ];

    for (name, message) in samples {
        group.bench_function(name, |b| {
            b.iter(|| black_box(message.clone().render(receiver)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: Write Parsing
// ============================================================================

fn bench_parse_write(c: &mut Criterion) {
    let command = format!("c\0monitor\0get-temperature\0{SAMPLE_OBJECT}\0");

    c.bench_function("parse_write", |b| {
        b.iter(|| black_box(WriteCommand::parse(black_box(command.as_bytes()))));
    });
}

criterion_group!(benches, bench_deliver_drain, bench_render, bench_parse_write);
criterion_main!(benches);
