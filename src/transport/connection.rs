//! WebSocket control session and event loop.
//!
//! This module handles one live session with the engine over its Unix
//! control socket, including request/response correlation and event
//! fan-out to subscribers.
//!
//! # Event Loop
//!
//! The connection spawns a tokio task that handles:
//!
//! - Incoming messages from the engine (responses, events)
//! - Outgoing requests from the Rust API
//! - Request/response correlation by UUID
//! - Event delivery to every open subscription
//!
//! Streams and channels opened on a connection run a small pump task that
//! forwards their requests through the correlation map and their replies
//! (and, for streams, events) back to the caller.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::FuturesUnordered;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::{from_str, to_string};
use tokio::net::UnixStream;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, trace, warn};

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SubscriptionId};
use crate::protocol::{Command, ControlCommand, Event, Request, Response};

use super::channel::{
    Channel, ControlChannel, DEFAULT_REPLY_BUFFER, DEFAULT_REQUEST_BUFFER, Stream,
    StreamMessage, validate_buffers,
};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for a request's reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum pending requests before rejecting new ones.
const MAX_PENDING_REQUESTS: usize = 100;

// ============================================================================
// Types
// ============================================================================

/// Map of request IDs to response channels.
type CorrelationMap = FxHashMap<RequestId, oneshot::Sender<Result<Response>>>;

/// Map of open event subscriptions.
type SubscriberMap = FxHashMap<SubscriptionId, mpsc::Sender<Event>>;

/// WebSocket stream over the engine's control socket.
pub(crate) type ControlSocket = WebSocketStream<UnixStream>;

// ============================================================================
// ConnectionCommand
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Send a request and wait for response.
    Send {
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
    },
    /// Remove the correlation entry of an abandoned request.
    RemoveCorrelation(RequestId),
    /// Shutdown the connection.
    Shutdown,
}

// ============================================================================
// CorrelationGuard
// ============================================================================

/// Removes a correlation entry unless its reply was delivered.
///
/// Commands are processed in order, so the removal always follows the
/// insertion made for the same request.
struct CorrelationGuard<'a> {
    command_tx: &'a mpsc::UnboundedSender<ConnectionCommand>,
    request_id: RequestId,
    armed: bool,
}

impl Drop for CorrelationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let _ = self
                .command_tx
                .send(ConnectionCommand::RemoveCorrelation(self.request_id));
        }
    }
}

// ============================================================================
// Connection
// ============================================================================

/// Live control session with the engine.
///
/// Handles request/response correlation and event routing.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; clones share the
/// session.
#[derive(Clone)]
pub struct Connection {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Correlation map (shared with event loop).
    correlation: Arc<Mutex<CorrelationMap>>,
    /// Event subscribers (shared with event loop).
    subscribers: Arc<Mutex<SubscriberMap>>,
    /// Timeout applied by [`Connection::send`].
    request_timeout: Duration,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("pending", &self.pending_count())
            .field("subscribers", &self.subscriber_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Creates a new connection from a WebSocket stream.
    ///
    /// Spawns the event loop task internally.
    pub(crate) fn new(ws_stream: ControlSocket, request_timeout: Duration) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let correlation = Arc::new(Mutex::new(CorrelationMap::default()));
        let subscribers = Arc::new(Mutex::new(SubscriberMap::default()));

        tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&correlation),
            Arc::clone(&subscribers),
        ));

        Self {
            command_tx,
            correlation,
            subscribers,
            request_timeout,
        }
    }

    /// Round-trips a `control.ping` to confirm the engine services the
    /// session.
    ///
    /// # Errors
    ///
    /// - [`Error::RequestTimeout`] if no reply arrives within `ping_timeout`
    /// - [`Error::Protocol`] if the engine answers with an error
    pub async fn control_ping(&self, ping_timeout: Duration) -> Result<()> {
        let request = Request::new(Command::Control(ControlCommand::Ping));
        self.send_with_timeout(request, ping_timeout)
            .await?
            .into_result()?;

        debug!("Control ping answered");
        Ok(())
    }

    /// Sends a request and waits for response with the session's default
    /// timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending requests
    pub async fn send(&self, request: Request) -> Result<Response> {
        self.send_with_timeout(request, self.request_timeout).await
    }

    /// Sends a request and waits for response with custom timeout.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionClosed`] if connection is closed
    /// - [`Error::RequestTimeout`] if response not received within timeout
    /// - [`Error::Protocol`] if too many pending requests
    pub async fn send_with_timeout(
        &self,
        request: Request,
        request_timeout: Duration,
    ) -> Result<Response> {
        let request_id = request.id;

        // Check pending request limit
        {
            let correlation = self.correlation.lock();
            if correlation.len() >= MAX_PENDING_REQUESTS {
                warn!(
                    pending = correlation.len(),
                    max = MAX_PENDING_REQUESTS,
                    "Too many pending requests"
                );
                return Err(Error::protocol(format!(
                    "Too many pending requests: {}/{}",
                    correlation.len(),
                    MAX_PENDING_REQUESTS
                )));
            }
        }

        let (response_tx, response_rx) = oneshot::channel();

        self.command_tx
            .send(ConnectionCommand::Send {
                request,
                response_tx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        // Armed until a reply arrives; also covers the future being dropped
        let mut guard = CorrelationGuard {
            command_tx: &self.command_tx,
            request_id,
            armed: true,
        };

        match timeout(request_timeout, response_rx).await {
            Ok(Ok(result)) => {
                guard.armed = false;
                result
            }
            Ok(Err(_)) => {
                guard.armed = false;
                Err(Error::ConnectionClosed)
            }
            Err(_) => Err(Error::request_timeout(
                request_id,
                request_timeout.as_millis() as u64,
            )),
        }
    }

    /// Registers an event subscription buffering up to `capacity` events.
    ///
    /// Events arriving while the buffer is full are dropped for this
    /// subscriber only. The receiver ends when the session closes.
    pub fn subscribe(&self, capacity: usize) -> (SubscriptionId, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let id = SubscriptionId::next();
        self.subscribers.lock().insert(id, tx);

        trace!(%id, "Event subscription added");
        (id, rx)
    }

    /// Removes an event subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.subscribers.lock().remove(&id).is_some() {
            trace!(%id, "Event subscription removed");
        }
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.correlation.lock().len()
    }

    /// Returns the number of open event subscriptions.
    #[inline]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Returns `true` once the event loop has stopped.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.command_tx.is_closed()
    }

    /// Shuts down the session.
    ///
    /// Pending requests fail with [`Error::ConnectionClosed`] and every
    /// open stream ends.
    pub fn shutdown(&self) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Connection - Streams
// ============================================================================

impl Connection {
    /// Starts a pump task backing a [`Stream`].
    ///
    /// With `with_events` the pump also forwards every engine event.
    fn spawn_stream(&self, request_size: usize, reply_size: usize, with_events: bool) -> Stream {
        let (request_tx, request_rx) = mpsc::channel(request_size);
        let (message_tx, message_rx) = mpsc::channel(reply_size);
        let events = with_events.then(|| self.subscribe(reply_size));

        tokio::spawn(self.clone().run_pump(request_rx, message_tx, events));

        Stream::new(request_tx, message_rx)
    }

    /// Forwards stream requests and delivers replies and events until either
    /// side goes away.
    async fn run_pump(
        self,
        mut requests: mpsc::Receiver<Request>,
        messages: mpsc::Sender<StreamMessage>,
        subscription: Option<(SubscriptionId, mpsc::Receiver<Event>)>,
    ) {
        let (subscription_id, mut events) = match subscription {
            Some((id, rx)) => (Some(id), Some(rx)),
            None => (None, None),
        };
        let mut in_flight = FuturesUnordered::new();

        loop {
            tokio::select! {
                () = messages.closed() => break,

                request = requests.recv() => {
                    let Some(request) = request else { break };
                    let connection = self.clone();
                    in_flight.push(async move { connection.send(request).await });
                }

                Some(reply) = in_flight.next(), if !in_flight.is_empty() => {
                    if messages.send(StreamMessage::Reply(reply)).await.is_err() {
                        break;
                    }
                }

                event = async { events.as_mut()?.recv().await }, if events.is_some() => {
                    match event {
                        Some(event) => {
                            if messages.send(StreamMessage::Event(event)).await.is_err() {
                                break;
                            }
                        }
                        // Session closed
                        None => break,
                    }
                }
            }
        }

        if let Some(id) = subscription_id {
            self.unsubscribe(id);
        }

        trace!("Stream pump terminated");
    }
}

// ============================================================================
// Connection - ControlChannel
// ============================================================================

#[async_trait]
impl ControlChannel for Connection {
    async fn open_stream(&self, cx: &CallContext) -> Result<Stream> {
        self.ensure_usable(cx, "open stream")?;
        Ok(self.spawn_stream(DEFAULT_REQUEST_BUFFER, DEFAULT_REPLY_BUFFER, true))
    }

    async fn invoke(&self, cx: &CallContext, request: Request) -> Result<Response> {
        trace!(method = request.method(), id = %request.id, "Invoking");
        cx.run("invoke", self.send(request)).await
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
        self.ensure_usable(cx, "open channel")?;
        Ok(Channel::from_stream(self.spawn_stream(
            request_size,
            reply_size,
            false,
        )))
    }
}

impl Connection {
    /// Fails fast on an ended context or a closed session.
    fn ensure_usable(&self, cx: &CallContext, operation: &str) -> Result<()> {
        if cx.is_done() {
            return Err(Error::cancelled(operation));
        }
        if self.is_closed() {
            return Err(Error::ConnectionClosed);
        }
        Ok(())
    }
}

// ============================================================================
// Connection - Event Loop
// ============================================================================

impl Connection {
    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop(
        ws_stream: ControlSocket,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        correlation: Arc<Mutex<CorrelationMap>>,
        subscribers: Arc<Mutex<SubscriberMap>>,
    ) {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming messages from the engine
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(&text, &correlation, &subscribers);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("Control socket closed by engine");
                            break;
                        }

                        Some(Err(e)) => {
                            error!(error = %e, "Control socket error");
                            break;
                        }

                        None => {
                            debug!("Control socket stream ended");
                            break;
                        }

                        // Ignore Binary, Ping, Pong
                        _ => {}
                    }
                }

                // Commands from Rust API
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Send { request, response_tx }) => {
                            Self::handle_send_command(
                                request,
                                response_tx,
                                &mut ws_write,
                                &correlation,
                            ).await;
                        }

                        Some(ConnectionCommand::RemoveCorrelation(request_id)) => {
                            correlation.lock().remove(&request_id);
                            debug!(%request_id, "Removed abandoned correlation");
                        }

                        Some(ConnectionCommand::Shutdown) => {
                            debug!("Shutdown command received");
                            let _ = ws_write.close().await;
                            break;
                        }

                        None => {
                            debug!("Command channel closed");
                            break;
                        }
                    }
                }
            }
        }

        // Stop accepting commands before failing what is queued
        command_rx.close();
        while let Ok(command) = command_rx.try_recv() {
            if let ConnectionCommand::Send { response_tx, .. } = command {
                let _ = response_tx.send(Err(Error::ConnectionClosed));
            }
        }

        Self::fail_pending_requests(&correlation);

        // Dropping the senders ends every subscriber's stream
        subscribers.lock().clear();

        debug!("Event loop terminated");
    }

    /// Handles an incoming text message from the engine.
    fn handle_incoming_message(
        text: &str,
        correlation: &Arc<Mutex<CorrelationMap>>,
        subscribers: &Arc<Mutex<SubscriberMap>>,
    ) {
        // Try to parse as Response first
        if let Ok(response) = from_str::<Response>(text) {
            let tx = correlation.lock().remove(&response.id);

            if let Some(tx) = tx {
                let _ = tx.send(Ok(response));
            } else {
                warn!(id = %response.id, "Response for unknown request");
            }

            return;
        }

        if let Ok(event) = from_str::<Event>(text) {
            Self::dispatch_event(event, subscribers);
            return;
        }

        warn!(text = %text, "Failed to parse incoming message");
    }

    /// Delivers an event to every subscriber, pruning closed ones.
    fn dispatch_event(event: Event, subscribers: &Arc<Mutex<SubscriberMap>>) {
        let mut subscribers = subscribers.lock();
        trace!(method = %event.method, subscribers = subscribers.len(), "Dispatching event");

        subscribers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(%id, method = %event.method, "Subscriber buffer full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
    }

    /// Handles a send command from the Rust API.
    async fn handle_send_command(
        request: Request,
        response_tx: oneshot::Sender<Result<Response>>,
        ws_write: &mut futures_util::stream::SplitSink<ControlSocket, Message>,
        correlation: &Arc<Mutex<CorrelationMap>>,
    ) {
        let request_id = request.id;

        let json = match to_string(&request) {
            Ok(j) => j,
            Err(e) => {
                let _ = response_tx.send(Err(Error::from(e)));
                return;
            }
        };

        // Store correlation before sending
        correlation.lock().insert(request_id, response_tx);

        if let Err(e) = ws_write.send(Message::Text(json.into())).await {
            if let Some(tx) = correlation.lock().remove(&request_id) {
                let _ = tx.send(Err(Error::connection(e.to_string())));
            }
        }

        trace!(%request_id, "Request sent");
    }

    /// Fails all pending requests with ConnectionClosed error.
    fn fail_pending_requests(correlation: &Arc<Mutex<CorrelationMap>>) {
        let pending: Vec<_> = correlation.lock().drain().collect();
        let count = pending.len();

        for (_, tx) in pending {
            let _ = tx.send(Err(Error::ConnectionClosed));
        }

        if count > 0 {
            debug!(count, "Failed pending requests on shutdown");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
