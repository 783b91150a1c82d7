//! Deferred control-channel handle.
//!
//! [`bootstrap`] returns a [`Handle`] immediately. A single background task
//! waits for the engine socket, connects, and publishes the outcome exactly
//! once. Every [`ControlChannel`] operation on the handle waits for that
//! outcome (or for the caller's own context to end) before delegating to the
//! live [`Connection`].
//!
//! # Lifecycle
//!
//! ```text
//! bootstrap() ──► waiting for socket ──► connecting ──► ready
//!                        │                   │
//!                        └──── cancelled ────┴──► failed (terminal)
//! ```
//!
//! A failed handle never reconnects: every later call returns the same
//! error. Create a new handle to retry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::protocol::{Request, Response};
use crate::transport::{Channel, Connection, ControlChannel, Stream, dial};

use super::builder::HandleBuilder;
use super::options::BootstrapOptions;
use super::socket::wait_for_socket;

// ============================================================================
// Types
// ============================================================================

/// Outcome published by the bootstrap task.
type Resolution = StdResult<Connection, Error>;

/// Shared state behind every clone of a [`Handle`].
struct HandleInner {
    /// Socket being bootstrapped.
    socket_path: PathBuf,
    /// Readiness latch; holds `Some` once resolved, never reset.
    ready: watch::Receiver<Option<Resolution>>,
    /// Scope of the bootstrap task and of the session it opens.
    bootstrap_cx: CallContext,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        // Last handle gone: stop retrying and close any open session
        self.bootstrap_cx.cancel();
    }
}

// ============================================================================
// bootstrap
// ============================================================================

/// Starts bootstrapping a link to the engine at `socket_path` with default
/// settings.
///
/// Returns without touching the filesystem or the network. `cx` bounds the
/// bootstrap: if it ends before the link is up the handle fails terminally;
/// once up, ending it closes the session.
///
/// Must be called within a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let handle = dataplane_link::bootstrap(&cx, "/run/engine/api.sock");
/// // Blocks until the engine is up, or `call_cx` ends.
/// let reply = handle.invoke(&call_cx, request).await?;
/// ```
#[must_use]
pub fn bootstrap(cx: &CallContext, socket_path: impl Into<PathBuf>) -> Handle {
    Handle::spawn(cx, BootstrapOptions::new(socket_path))
}

// ============================================================================
// Handle
// ============================================================================

/// Caller-facing link to the engine, usable before the engine is.
///
/// Cheap to clone; clones share one bootstrap attempt and its outcome.
#[derive(Clone)]
pub struct Handle {
    /// Shared inner state.
    inner: Arc<HandleInner>,
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("socket_path", &self.inner.socket_path)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl Handle {
    /// Creates a configuration builder.
    #[inline]
    #[must_use]
    pub fn builder() -> HandleBuilder {
        HandleBuilder::new()
    }

    /// Spawns the bootstrap task and returns its handle.
    pub(crate) fn spawn(cx: &CallContext, options: BootstrapOptions) -> Self {
        let bootstrap_cx = cx.child();
        let (ready_tx, ready_rx) = watch::channel(None);
        let socket_path = options.socket_path.clone();

        let task_cx = bootstrap_cx.clone();
        tokio::spawn(async move {
            let resolution = resolve(&task_cx, &options).await;
            let path = options.socket_path.display();

            let connection = match &resolution {
                Ok(connection) => {
                    info!(path = %path, "Dataplane link ready");
                    Some(connection.clone())
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "Dataplane link failed");
                    None
                }
            };

            ready_tx.send_replace(Some(resolution));

            // The session lives as long as the bootstrap scope and some handle
            if let Some(connection) = connection {
                tokio::select! {
                    () = task_cx.done() => {}
                    () = ready_tx.closed() => {}
                }
                connection.shutdown();
                debug!(path = %path, "Dataplane link closed");
            }
        });

        Self {
            inner: Arc::new(HandleInner {
                socket_path,
                ready: ready_rx,
                bootstrap_cx,
            }),
        }
    }

    /// Returns the socket path being bootstrapped.
    #[inline]
    #[must_use]
    pub fn socket_path(&self) -> &Path {
        &self.inner.socket_path
    }

    /// Returns `true` once the bootstrap has resolved, successfully or not.
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.borrow().is_some()
    }

    /// Returns the terminal error, if the bootstrap resolved with one.
    #[must_use]
    pub fn terminal_error(&self) -> Option<Error> {
        match &*self.inner.ready.borrow() {
            Some(Err(e)) => Some(e.clone()),
            _ => None,
        }
    }

    /// Waits until the link is usable.
    ///
    /// # Errors
    ///
    /// - [`Error::Cancelled`] if `cx` ends first
    /// - the terminal bootstrap error if the bootstrap failed
    pub async fn wait_ready(&self, cx: &CallContext) -> Result<()> {
        self.resolved(cx, "wait ready").await.map(drop)
    }

    /// Waits for and returns the live connection.
    ///
    /// # Errors
    ///
    /// Same as [`Handle::wait_ready`].
    pub async fn connection(&self, cx: &CallContext) -> Result<Connection> {
        self.resolved(cx, "connection").await
    }

    /// Cancels an in-flight bootstrap and closes the session if one is up.
    ///
    /// A handle shut down before resolving fails with [`Error::Cancelled`].
    pub fn shutdown(&self) {
        self.inner.bootstrap_cx.cancel();
        if let Some(Ok(connection)) = &*self.inner.ready.borrow() {
            connection.shutdown();
        }
    }

    /// Races the readiness latch against `cx`.
    ///
    /// An already resolved handle answers even if `cx` has ended.
    async fn resolved(&self, cx: &CallContext, operation: &str) -> Result<Connection> {
        let mut ready = self.inner.ready.clone();

        tokio::select! {
            biased;

            state = ready.wait_for(Option::is_some) => match state {
                Ok(state) => match &*state {
                    Some(Ok(connection)) => Ok(connection.clone()),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(Error::connection("bootstrap resolved without outcome")),
                },
                Err(_) => Err(Error::connection("bootstrap task ended without resolving")),
            },

            () = cx.done() => Err(Error::cancelled(operation)),
        }
    }
}

// ============================================================================
// Handle - ControlChannel
// ============================================================================

#[async_trait]
impl ControlChannel for Handle {
    async fn open_stream(&self, cx: &CallContext) -> Result<Stream> {
        self.resolved(cx, "open stream").await?.open_stream(cx).await
    }

    async fn invoke(&self, cx: &CallContext, request: Request) -> Result<Response> {
        self.resolved(cx, "invoke").await?.invoke(cx, request).await
    }

    async fn open_channel(&self, cx: &CallContext) -> Result<Channel> {
        self.resolved(cx, "open channel").await?.open_channel(cx).await
    }

    async fn open_channel_buffered(
        &self,
        cx: &CallContext,
        request_size: usize,
        reply_size: usize,
    ) -> Result<Channel> {
        self.resolved(cx, "open channel")
            .await?
            .open_channel_buffered(cx, request_size, reply_size)
            .await
    }
}

// ============================================================================
// Background Resolution
// ============================================================================

/// Waits for the socket, then connects.
async fn resolve(cx: &CallContext, options: &BootstrapOptions) -> Resolution {
    wait_for_socket(cx, &options.socket_path).await?;
    connect_until_ready(cx, options).await
}

/// Retries [`dial`] with a fixed backoff until it succeeds or `cx` ends.
async fn connect_until_ready(cx: &CallContext, options: &BootstrapOptions) -> Resolution {
    let path = &options.socket_path;
    let mut attempt: u64 = 0;
    let mut last_error: Option<Error> = None;

    loop {
        if cx.is_done() {
            return Err(match last_error {
                Some(e) => Error::connect_failed(path, e.to_string()),
                None => Error::cancelled("connect"),
            });
        }

        attempt += 1;
        match cx.run("connect", dial(path, &options.dial)).await {
            Ok(connection) => {
                debug!(path = %path.display(), attempt, "Connect attempt succeeded");
                return Ok(connection);
            }
            // Reported by the check at the top of the loop
            Err(e) if e.is_cancelled() => {}
            Err(e) => {
                debug!(path = %path.display(), attempt, error = %e, "Connect attempt failed");
                last_error = Some(e);

                tokio::select! {
                    () = cx.done() => {}
                    () = sleep(options.retry_backoff) => {}
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
