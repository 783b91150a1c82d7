//! Test fixtures: a fake engine on a Unix socket and an in-memory
//! control channel.

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{Value, json};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::{Command, Event, PING_FINISHED, PingCommand, Request, Response};
use crate::transport::channel::validate_buffers;
use crate::transport::{
    Channel, ControlChannel, DEFAULT_REPLY_BUFFER, DEFAULT_REQUEST_BUFFER, Stream, StreamMessage,
};

/// Creates a temporary directory to host engine sockets.
pub(crate) fn socket_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create socket dir")
}

// ============================================================================
// FakeEngine
// ============================================================================

/// Scripted engine serving the control protocol on a Unix socket.
///
/// Answers `control.ping`, `events.want` and `ping.start` with success,
/// anything else with an error reply. A `ping.start` for an address with
/// configured replies is followed by its `ping.finished` event.
pub(crate) struct FakeEngine {
    path: PathBuf,
    accepted: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

/// Configures a [`FakeEngine`].
#[derive(Debug, Clone)]
pub(crate) struct FakeEngineBuilder {
    replies: FxHashMap<IpAddr, u32>,
    answer_control_ping: bool,
    answer_ping_start: bool,
}

impl Default for FakeEngineBuilder {
    fn default() -> Self {
        Self {
            replies: FxHashMap::default(),
            answer_control_ping: true,
            answer_ping_start: true,
        }
    }
}

impl FakeEngineBuilder {
    /// Reports `count` echo replies for probes to `address`.
    pub(crate) fn replies(mut self, address: IpAddr, count: u32) -> Self {
        self.replies.insert(address, count);
        self
    }

    /// Never answers the session handshake.
    pub(crate) fn silent_control_ping(mut self) -> Self {
        self.answer_control_ping = false;
        self
    }

    /// Never answers `ping.start`.
    pub(crate) fn silent_ping_start(mut self) -> Self {
        self.answer_ping_start = false;
        self
    }

    /// Binds the socket and starts serving.
    pub(crate) async fn start(self, path: impl Into<PathBuf>) -> FakeEngine {
        let path = path.into();
        let listener = UnixListener::bind(&path).expect("bind fake engine");
        let accepted = Arc::new(AtomicUsize::new(0));
        let script = Arc::new(self);

        let task = tokio::spawn({
            let accepted = Arc::clone(&accepted);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, Arc::clone(&script)));
                }
            }
        });

        FakeEngine {
            path,
            accepted,
            task,
        }
    }

    /// Replies (and events) for one incoming request.
    fn answer(&self, request: &Value) -> Vec<Value> {
        let id = request.get("id").cloned().unwrap_or(Value::Null);
        let method = request
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let success = json!({ "id": id, "type": "success", "result": {} });

        match method {
            "control.ping" if !self.answer_control_ping => Vec::new(),
            "ping.start" if !self.answer_ping_start => Vec::new(),
            "control.ping" | "events.want" => vec![success],
            "ping.start" => {
                let finished = request["params"]["address"]
                    .as_str()
                    .and_then(|s| s.parse::<IpAddr>().ok())
                    .and_then(|address| Some((address, *self.replies.get(&address)?)))
                    .map(|(address, count)| {
                        json!({
                            "id": RequestId::generate(),
                            "type": "event",
                            "method": PING_FINISHED,
                            "params": { "address": address.to_string(), "replyCount": count },
                        })
                    });
                std::iter::once(success).chain(finished).collect()
            }
            other => vec![json!({
                "id": id,
                "type": "error",
                "error": "unknown command",
                "message": format!("unknown method: {other}"),
            })],
        }
    }
}

/// Serves one accepted control session.
async fn serve(stream: UnixStream, script: Arc<FakeEngineBuilder>) {
    let Ok(ws_stream) = tokio_tungstenite::accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    while let Some(Ok(message)) = read.next().await {
        let Message::Text(text) = message else {
            continue;
        };
        let Ok(request) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        for reply in script.answer(&request) {
            if write
                .send(Message::Text(reply.to_string().into()))
                .await
                .is_err()
            {
                return;
            }
        }
    }
}

impl FakeEngine {
    /// Starts an engine that answers every supported request.
    pub(crate) async fn start(path: impl Into<PathBuf>) -> Self {
        Self::builder().start(path).await
    }

    pub(crate) fn builder() -> FakeEngineBuilder {
        FakeEngineBuilder::default()
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Number of sessions accepted so far.
    pub(crate) fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for FakeEngine {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// ScriptedChannel
// ============================================================================

/// How a [`ScriptedChannel`] reacts to `ping.start` for an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Destination {
    /// Emits `ping.finished` with this reply count.
    Replies(u32),
    /// Accepts the start and never reports back.
    Silent,
    /// Rejects the start request.
    FailStart,
    /// Accepts the start, then ends every open stream.
    CloseStream,
}

/// In-memory [`ControlChannel`] with per-destination behaviour.
///
/// Unknown destinations behave as [`Destination::Silent`].
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedChannel {
    destinations: Arc<FxHashMap<IpAddr, Destination>>,
    fail_subscribe: bool,
    state: Arc<ScriptedState>,
}

#[derive(Debug, Default)]
struct ScriptedState {
    streams: Mutex<Vec<mpsc::Sender<StreamMessage>>>,
    started: AtomicUsize,
}

impl ScriptedChannel {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with(mut self, address: &str, destination: Destination) -> Self {
        let address = address.parse().expect("scripted address");
        Arc::make_mut(&mut self.destinations).insert(address, destination);
        self
    }

    /// Makes every `open_stream` fail.
    pub(crate) fn failing_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    /// Number of `ping.start` requests received.
    pub(crate) fn started(&self) -> usize {
        self.state.started.load(Ordering::SeqCst)
    }

    /// Number of streams whose receiving side is still alive.
    pub(crate) fn open_streams(&self) -> usize {
        self.state
            .streams
            .lock()
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }

    fn broadcast(&self, event: &Event) {
        let mut streams = self.state.streams.lock();
        streams.retain(|tx| !tx.is_closed());
        for tx in streams.iter() {
            let _ = tx.try_send(StreamMessage::Event(event.clone()));
        }
    }
}

#[async_trait]
impl ControlChannel for ScriptedChannel {
    async fn open_stream(&self, cx: &CallContext) -> Result<Stream> {
        if cx.is_done() {
            return Err(Error::cancelled("open stream"));
        }
        if self.fail_subscribe {
            return Err(Error::connection("scripted subscription failure"));
        }

        // Scripted streams carry events only
        let (request_tx, _) = mpsc::channel(DEFAULT_REQUEST_BUFFER);
        let (message_tx, message_rx) = mpsc::channel(DEFAULT_REPLY_BUFFER);
        self.state.streams.lock().push(message_tx);

        Ok(Stream::new(request_tx, message_rx))
    }

    async fn invoke(&self, cx: &CallContext, request: Request) -> Result<Response> {
        if cx.is_done() {
            return Err(Error::cancelled("invoke"));
        }

        let id = request.id;
        if let Command::Ping(PingCommand::Start { address, .. }) = request.command {
            self.state.started.fetch_add(1, Ordering::SeqCst);

            match self
                .destinations
                .get(&address)
                .copied()
                .unwrap_or(Destination::Silent)
            {
                Destination::Replies(count) => self.broadcast(&Event::new(
                    PING_FINISHED,
                    json!({ "address": address.to_string(), "replyCount": count }),
                )),
                Destination::FailStart => {
                    return Ok(Response::error(id, "start failed", "scripted start failure"));
                }
                Destination::CloseStream => self.state.streams.lock().clear(),
                Destination::Silent => {}
            }
        }

        Ok(Response::success(id, json!({})))
    }

    async fn open_channel(&self, cx: &CallContext) -> Result<Channel> {
        self.open_channel_buffered(cx, DEFAULT_REQUEST_BUFFER, DEFAULT_REPLY_BUFFER)
            .await
    }

    async fn open_channel_buffered(
        &self,
        cx: &CallContext,
        request_size: usize,
        reply_size: usize,
    ) -> Result<Channel> {
        validate_buffers(request_size, reply_size)?;
        if cx.is_done() {
            return Err(Error::cancelled("open channel"));
        }

        let (request_tx, mut request_rx) = mpsc::channel::<Request>(request_size);
        let (message_tx, message_rx) = mpsc::channel(reply_size);
        tokio::spawn(async move {
            while let Some(request) = request_rx.recv().await {
                let reply = Response::success(request.id, json!({}));
                if message_tx.send(StreamMessage::Reply(Ok(reply))).await.is_err() {
                    break;
                }
            }
        });

        Ok(Channel::from_stream(Stream::new(request_tx, message_rx)))
    }
}
