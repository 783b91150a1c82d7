//! Control-channel primitives.
//!
//! [`ControlChannel`] is the seam every dataplane-configuring component
//! builds on. It is implemented by [`Connection`](super::Connection) for a
//! live session and by [`Handle`](crate::Handle), which gates the same four
//! operations on bootstrap completion.
//!
//! | Operation | Shape |
//! |-----------|-------|
//! | `invoke` | one request, one reply |
//! | `open_stream` | duplex: requests out, replies and events in |
//! | `open_channel` | request/reply pipe, default buffers |
//! | `open_channel_buffered` | request/reply pipe, explicit buffers |

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::protocol::{Event, Request, Response};

// ============================================================================
// Constants
// ============================================================================

/// Default request buffer for [`ControlChannel::open_channel`] and streams.
pub const DEFAULT_REQUEST_BUFFER: usize = 100;

/// Default reply buffer for [`ControlChannel::open_channel`] and streams.
pub const DEFAULT_REPLY_BUFFER: usize = 100;

// ============================================================================
// ControlChannel
// ============================================================================

/// The four primitives used to talk to the engine.
///
/// Every operation takes the caller's [`CallContext`] and must return
/// [`Error::Cancelled`] promptly once it ends.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    /// Opens a duplex stream receiving replies and every engine event.
    async fn open_stream(&self, cx: &CallContext) -> Result<Stream>;

    /// Sends one request and waits for its reply.
    ///
    /// An error reply is returned as a [`Response`]; use
    /// [`Response::into_result`] to turn it into [`Error::Protocol`].
    async fn invoke(&self, cx: &CallContext, request: Request) -> Result<Response>;

    /// Opens a request/reply channel with default buffer sizes.
    async fn open_channel(&self, cx: &CallContext) -> Result<Channel>;

    /// Opens a request/reply channel with explicit buffer sizes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if either size is zero.
    async fn open_channel_buffered(
        &self,
        cx: &CallContext,
        request_size: usize,
        reply_size: usize,
    ) -> Result<Channel>;
}

#[async_trait]
impl<T: ControlChannel + ?Sized> ControlChannel for Arc<T> {
    async fn open_stream(&self, cx: &CallContext) -> Result<Stream> {
        (**self).open_stream(cx).await
    }

    async fn invoke(&self, cx: &CallContext, request: Request) -> Result<Response> {
        (**self).invoke(cx, request).await
    }

    async fn open_channel(&self, cx: &CallContext) -> Result<Channel> {
        (**self).open_channel(cx).await
    }

    async fn open_channel_buffered(
        &self,
        cx: &CallContext,
        request_size: usize,
        reply_size: usize,
    ) -> Result<Channel> {
        (**self)
            .open_channel_buffered(cx, request_size, reply_size)
            .await
    }
}

/// Rejects zero-sized buffers.
pub(crate) fn validate_buffers(request_size: usize, reply_size: usize) -> Result<()> {
    if request_size == 0 || reply_size == 0 {
        return Err(Error::invalid_argument(format!(
            "channel buffers must be non-zero (request={request_size}, reply={reply_size})"
        )));
    }
    Ok(())
}

// ============================================================================
// StreamMessage
// ============================================================================

/// Item received on a [`Stream`].
#[derive(Debug)]
pub enum StreamMessage {
    /// Reply (or failure) for a request sent on the stream.
    Reply(Result<Response>),
    /// Engine event.
    Event(Event),
}

// ============================================================================
// Stream
// ============================================================================

/// Duplex message stream.
///
/// Dropping the stream releases its event subscription and background
/// pump.
#[derive(Debug)]
pub struct Stream {
    /// Outgoing requests.
    requests: mpsc::Sender<Request>,
    /// Incoming replies and events, in arrival order.
    messages: mpsc::Receiver<StreamMessage>,
}

impl Stream {
    /// Assembles a stream from its two halves.
    ///
    /// Used by [`ControlChannel`] implementations; the producer side ends
    /// the stream by dropping the sender of `messages`.
    #[inline]
    #[must_use]
    pub fn new(
        requests: mpsc::Sender<Request>,
        messages: mpsc::Receiver<StreamMessage>,
    ) -> Self {
        Self { requests, messages }
    }

    /// Queues a request. Its reply arrives as [`StreamMessage::Reply`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the stream has ended.
    pub async fn send(&self, request: Request) -> Result<()> {
        self.requests
            .send(request)
            .await
            .map_err(|_| Error::ConnectionClosed)
    }

    /// Receives the next message, or `None` once the stream has ended.
    ///
    /// Cancel-safe.
    pub async fn recv(&mut self) -> Option<StreamMessage> {
        self.messages.recv().await
    }

    /// Returns `true` once the producer side has gone away.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.requests.is_closed()
    }
}

// ============================================================================
// Channel
// ============================================================================

/// Request/reply pipe without event delivery.
#[derive(Debug)]
pub struct Channel {
    /// Underlying stream; events are never forwarded into it.
    stream: Stream,
}

impl Channel {
    /// Wraps a stream; any events it carries are skipped by [`Channel::recv`].
    #[inline]
    #[must_use]
    pub fn from_stream(stream: Stream) -> Self {
        Self { stream }
    }

    /// Queues a request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`] if the channel has ended.
    pub async fn send(&self, request: Request) -> Result<()> {
        self.stream.send(request).await
    }

    /// Receives the next reply, or `None` once the channel has ended.
    pub async fn recv(&mut self) -> Option<Result<Response>> {
        loop {
            match self.stream.recv().await? {
                StreamMessage::Reply(reply) => return Some(reply),
                StreamMessage::Event(_) => continue,
            }
        }
    }

    /// Sends `request` and waits for the next reply.
    ///
    /// Do not interleave with [`Channel::send`]: the next reply in arrival
    /// order is returned.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cx` ends first
    /// - [`Error::ConnectionClosed`] if the channel ends first
    pub async fn request(&mut self, cx: &CallContext, request: Request) -> Result<Response> {
        self.send(request).await?;
        cx.run("channel reply", async {
            self.recv().await.unwrap_or(Err(Error::ConnectionClosed))
        })
        .await
    }
}

// ============================================================================
// Tests
// ============================================================================
