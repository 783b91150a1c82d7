//! Concurrent liveness probing over the control channel.
//!
//! One worker per (source, destination) pair asks the engine for a short
//! burst of echo probes and waits for the matching `ping.finished` event.
//! The verdict is the logical AND of every worker's outcome; all workers
//! are drained before it is returned.
//!
//! Local failures (no event subscription, rejected start request) count as
//! alive: only the engine reporting zero replies, or silence until the
//! deadline, marks a pair as down.

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::protocol::{
    Command, EventsCommand, PING_FINISHED, ParsedEvent, PingCommand, Request, Response,
};
use crate::transport::{ControlChannel, Stream, StreamMessage};

use super::address::parse_all;
use super::options::LivenessOptions;

// ============================================================================
// check_liveness
// ============================================================================

/// Probes every (source, destination) pair with default settings.
///
/// See [`Prober::check`].
pub async fn check_liveness<C, S>(
    cx: &CallContext,
    channel: &C,
    sources: &[S],
    destinations: &[S],
) -> bool
where
    C: ControlChannel + Clone + 'static,
    S: AsRef<str>,
{
    Prober::default()
        .check(cx, channel, sources, destinations)
        .await
}

// ============================================================================
// Prober
// ============================================================================

/// Liveness prober with fixed settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct Prober {
    options: LivenessOptions,
}

impl Prober {
    /// Creates a prober.
    #[inline]
    #[must_use]
    pub fn new(options: LivenessOptions) -> Self {
        Self { options }
    }

    /// Returns the prober's settings.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &LivenessOptions {
        &self.options
    }

    /// Returns the probe interval a check under `cx` would request.
    #[must_use]
    pub fn interval_for(&self, cx: &CallContext) -> Duration {
        self.options.interval(self.window(cx))
    }

    /// Time left for a check under `cx`.
    fn window(&self, cx: &CallContext) -> Duration {
        cx.remaining().unwrap_or(self.options.default_window)
    }

    /// Probes every (source, destination) pair concurrently.
    ///
    /// Malformed addresses are logged and skipped. Returns `true` when no
    /// pair is left to probe. Never returns before every worker has
    /// reported, and returns no later than shortly after the deadline of
    /// `cx` (or the default window when `cx` has none).
    pub async fn check<C, S>(
        &self,
        cx: &CallContext,
        channel: &C,
        sources: &[S],
        destinations: &[S],
    ) -> bool
    where
        C: ControlChannel + Clone + 'static,
        S: AsRef<str>,
    {
        let sources = parse_all(sources, "source");
        let destinations = parse_all(destinations, "destination");

        let pairs: Vec<ProbePair> = sources
            .iter()
            .flat_map(|&source| {
                destinations
                    .iter()
                    .map(move |&destination| ProbePair { source, destination })
            })
            .collect();

        if pairs.is_empty() {
            debug!("No address pairs to probe");
            return true;
        }

        let cx = match cx.deadline() {
            Some(_) => cx.clone(),
            None => cx.clone().with_timeout(self.options.default_window),
        };
        let interval = self.interval_for(&cx);
        let count = pairs.len();

        debug!(
            pairs = count,
            interval_ms = interval.as_millis(),
            probes = self.options.probe_count,
            "Starting liveness check"
        );

        let (result_tx, mut result_rx) = mpsc::channel::<bool>(count);

        for pair in pairs {
            let cx = cx.clone();
            let channel = channel.clone();
            let result_tx = result_tx.clone();
            let repeat = self.options.probe_count;

            tokio::spawn(async move {
                let alive = probe_pair(&cx, &channel, pair, interval, repeat).await;
                // Capacity equals the worker count
                let _ = result_tx.send(alive).await;
            });
        }
        drop(result_tx);

        let mut alive = true;
        for _ in 0..count {
            match result_rx.recv().await {
                Some(outcome) => alive &= outcome,
                // A worker ended without reporting
                None => {
                    alive = false;
                    break;
                }
            }
        }

        info!(pairs = count, alive, "Liveness check finished");
        alive
    }
}

// ============================================================================
// Worker
// ============================================================================

/// One probed combination.
#[derive(Debug, Clone, Copy)]
struct ProbePair {
    source: IpAddr,
    destination: IpAddr,
}

/// Runs one probe and reports whether the destination answered.
async fn probe_pair<C: ControlChannel>(
    cx: &CallContext,
    channel: &C,
    pair: ProbePair,
    interval: Duration,
    repeat: u32,
) -> bool {
    let ProbePair {
        source,
        destination,
    } = pair;

    let mut stream = match subscribe(cx, channel).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!(%source, %destination, error = %e, "Probe not started, assuming alive");
            return true;
        }
    };

    let start = Request::new(Command::Ping(PingCommand::Start {
        address: destination,
        interval: interval.as_secs_f64(),
        repeat,
    }));
    if let Err(e) = channel
        .invoke(cx, start)
        .await
        .and_then(Response::into_result)
    {
        warn!(%source, %destination, error = %e, "Probe start failed, assuming alive");
        return true;
    }

    loop {
        tokio::select! {
            biased;

            message = stream.recv() => match message {
                Some(StreamMessage::Event(event)) => match event.parse() {
                    ParsedEvent::PingFinished {
                        address,
                        reply_count,
                    } if address == destination => {
                        debug!(%source, %destination, reply_count, "Probe finished");
                        return reply_count > 0;
                    }
                    _ => {}
                },
                Some(StreamMessage::Reply(_)) => {}
                None => {
                    debug!(%source, %destination, "Event stream closed before probe finished");
                    return false;
                }
            },

            () = cx.done() => {
                debug!(%source, %destination, "Probe timed out");
                return false;
            }
        }
    }
}

/// Opens an event stream and enables `ping.finished` delivery.
async fn subscribe<C: ControlChannel>(cx: &CallContext, channel: &C) -> Result<Stream> {
    let stream = channel
        .open_stream(cx)
        .await
        .map_err(|e| Error::probe_subscription_failed(e.to_string()))?;

    let want = Request::new(Command::Events(EventsCommand::Want {
        event: PING_FINISHED.to_string(),
        enable: true,
    }));
    channel
        .invoke(cx, want)
        .await
        .and_then(Response::into_result)
        .map_err(|e| Error::probe_subscription_failed(e.to_string()))?;

    Ok(stream)
}

// ============================================================================
// Tests
// ============================================================================
