//! Control-socket transport layer.
//!
//! This module handles communication between the local end (Rust) and the
//! packet-processing engine over its Unix control socket.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Chain element  │                              │  Dataplane      │
//! │                 │   WebSocket over Unix socket │  engine         │
//! │  Connection     │◄────────────────────────────►│                 │
//! │  Stream/Channel │      /run/engine/api.sock    │  control API    │
//! └─────────────────┘                              └─────────────────┘
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. [`dial`] - Connect, upgrade and handshake
//! 2. [`Connection`] - Invoke requests, open streams and channels
//! 3. [`Connection::shutdown`] - Close the session
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | [`ControlChannel`] trait, [`Stream`] and [`Channel`] |
//! | `connection` | WebSocket session and event loop |
//! | `dialer` | Single connect attempt |

// ============================================================================
// Submodules
// ============================================================================

/// Control-channel trait and message pipes.
pub mod channel;

/// WebSocket session and event loop.
pub mod connection;

/// Session establishment.
pub mod dialer;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{
    Channel, ControlChannel, DEFAULT_REPLY_BUFFER, DEFAULT_REQUEST_BUFFER, Stream, StreamMessage,
};
pub use connection::{Connection, DEFAULT_REQUEST_TIMEOUT};
pub use dialer::{DEFAULT_HANDSHAKE_TIMEOUT, DialOptions, dial};
