//! Liveness fan-out benchmark suite.
//!
//! Measures the cost of spawning, draining and reducing probe workers
//! against an in-memory engine that reports immediately:
//! - Pair counts: 1, 16, 64, 256
//!
//! Run with: cargo bench --bench probe_fanout
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use dataplane_link::protocol::{Command, Event, PING_FINISHED, PingCommand, Request, Response};
use dataplane_link::{
    CallContext, Channel, ControlChannel, Result, Stream, StreamMessage, check_liveness,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

// ============================================================================
// Benchmark Parameters
// ============================================================================

const PAIR_COUNTS: &[usize] = &[1, 16, 64, 256];

// ============================================================================
// In-memory Engine
// ============================================================================

/// Answers every probe with a `ping.finished` carrying one reply.
#[derive(Clone, Default)]
struct InstantEngine {
    streams: Arc<Mutex<Vec<mpsc::Sender<StreamMessage>>>>,
}

#[async_trait]
impl ControlChannel for InstantEngine {
    async fn open_stream(&self, _cx: &CallContext) -> Result<Stream> {
        let (request_tx, _) = mpsc::channel(1);
        let (message_tx, message_rx) = mpsc::channel(1024);
        self.streams.lock().push(message_tx);
        Ok(Stream::new(request_tx, message_rx))
    }

    async fn invoke(&self, _cx: &CallContext, request: Request) -> Result<Response> {
        if let Command::Ping(PingCommand::Start { address, .. }) = request.command {
            let event = Event::new(
                PING_FINISHED,
                json!({ "address": address.to_string(), "replyCount": 1 }),
            );
            let mut streams = self.streams.lock();
            streams.retain(|tx| !tx.is_closed());
            for tx in streams.iter() {
                let _ = tx.try_send(StreamMessage::Event(event.clone()));
            }
        }
        Ok(Response::success(request.id, json!({})))
    }

    async fn open_channel(&self, cx: &CallContext) -> Result<Channel> {
        self.open_stream(cx).await.map(Channel::from_stream)
    }

    async fn open_channel_buffered(
        &self,
        cx: &CallContext,
        _request_size: usize,
        _reply_size: usize,
    ) -> Result<Channel> {
        self.open_channel(cx).await
    }
}

fn destinations(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff))
        .collect()
}

// ============================================================================
// Benchmark: Fan-out
// ============================================================================

fn bench_fanout(c: &mut Criterion) {
    let rt = Runtime::new().expect("tokio runtime");

    let mut group = c.benchmark_group("probe_fanout");
    group.measurement_time(Duration::from_secs(10));

    for &count in PAIR_COUNTS {
        let sources = vec!["192.168.0.1".to_string()];
        let destinations = destinations(count);

        group.bench_with_input(BenchmarkId::new("pairs", count), &count, |b, _| {
            b.to_async(&rt).iter(|| async {
                let engine = InstantEngine::default();
                let cx = CallContext::new().with_timeout(Duration::from_secs(5));
                let alive = check_liveness(&cx, &engine, &sources, &destinations).await;
                assert!(alive);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_fanout);
criterion_main!(benches);
