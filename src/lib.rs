//! Dataplane link - deferred control channel and liveness probing for a
//! local packet-processing engine.
//!
//! Components that configure the dataplane need a control channel to the
//! engine, but the engine may not be running yet when they are created.
//! This library hands out a [`Handle`] immediately and connects in the
//! background; every call on the handle waits for the link (or for the
//! caller to give up) before it is forwarded.
//!
//! # Architecture
//!
//! - **Bootstrap**: wait for the engine's control socket, connect, publish
//!   the outcome once through a readiness latch
//! - **Transport**: WebSocket session over the Unix socket with request
//!   correlation and event fan-out
//! - **Liveness**: concurrent echo probes per address pair, reduced to a
//!   single verdict
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use dataplane_link::{CallContext, Result, bootstrap, check_liveness};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scope = CallContext::new();
//!     let handle = bootstrap(&scope, "/run/engine/api.sock");
//!
//!     let cx = CallContext::new().with_timeout(Duration::from_secs(2));
//!     handle.wait_ready(&cx).await?;
//!
//!     let alive = check_liveness(&cx, &handle, &["10.0.0.1/24"], &["10.0.0.2"]).await;
//!     println!("alive: {alive}");
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bootstrap`] | Deferred [`Handle`] and its builder |
//! | [`context`] | [`CallContext`] cancellation and deadlines |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`liveness`] | Liveness probe fan-out |
//! | [`protocol`] | Control message types |
//! | [`transport`] | Control session and [`ControlChannel`] trait |

// ============================================================================
// Modules
// ============================================================================

/// Deferred bootstrap of the control channel.
///
/// Use [`bootstrap()`](bootstrap::bootstrap) or [`Handle::builder()`].
pub mod bootstrap;

/// Cancellation and deadline scope.
pub mod context;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Liveness probing of address pairs.
pub mod liveness;

/// Control protocol message types.
///
/// Defines request/reply/event structures exchanged with the engine.
pub mod protocol;

/// Control-socket transport layer.
pub mod transport;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

// Bootstrap types
pub use bootstrap::{BootstrapOptions, Handle, HandleBuilder, bootstrap};

// Context
pub use context::CallContext;

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SubscriptionId};

// Liveness
pub use liveness::{LivenessOptions, Prober, check_liveness, parse_address};

// Transport types
pub use transport::{Channel, Connection, ControlChannel, DialOptions, Stream, StreamMessage};
