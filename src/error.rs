//! Error types for the dataplane link.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use dataplane_link::{CallContext, ControlChannel, Result};
//!
//! async fn example(handle: &Handle, cx: &CallContext) -> Result<()> {
//!     let reply = handle.invoke(cx, request).await?;
//!     reply.into_result()?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Bootstrap | [`Error::Cancelled`], [`Error::SocketWaitFailed`], [`Error::ConnectFailed`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`], [`Error::RequestTimeout`] |
//! | Protocol | [`Error::Protocol`] |
//! | Liveness | [`Error::ProbeSubscriptionFailed`], [`Error::AddressParseFailed`] |
//! | External | [`Error::Io`], [`Error::Json`], [`Error::WebSocket`] |
//!
//! # Cloning
//!
//! A bootstrap failure is memoized by its [`Handle`](crate::Handle) and
//! handed to every later caller, so [`Error`] is `Clone`. Foreign errors are
//! held behind an [`Arc`].

// ============================================================================
// Imports
// ============================================================================

use std::io::Error as IoError;
use std::path::PathBuf;
use std::result::Result as StdResult;
use std::sync::Arc;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

use crate::identifiers::RequestId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant includes relevant context for debugging.
#[derive(Error, Debug, Clone)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when a builder is missing a required setting.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument.
    ///
    /// Returned when an operation receives an argument it cannot use.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Bootstrap Errors
    // ========================================================================
    /// The caller's or the bootstrap's context ended first.
    #[error("Cancelled: {operation}")]
    Cancelled {
        /// Operation that was waiting when the context ended.
        operation: String,
    },

    /// The filesystem notification subsystem failed while waiting for the
    /// engine socket to appear.
    #[error("Failed waiting for socket {}: {message}", .path.display())]
    SocketWaitFailed {
        /// Socket path being waited on.
        path: PathBuf,
        /// Description of the notification failure.
        message: String,
    },

    /// The bootstrap gave up connecting to an existing socket.
    ///
    /// Only produced once the bootstrap context ends; connect attempts are
    /// never bounded by a count.
    #[error("Failed to connect to {}: {message}", .path.display())]
    ConnectFailed {
        /// Socket path.
        path: PathBuf,
        /// Last connect error observed.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// Session-level connection failure.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Control session closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Request timed out waiting for its reply.
    #[error("Request {request_id} timed out after {timeout_ms}ms")]
    RequestTimeout {
        /// The request ID that timed out.
        request_id: RequestId,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    // ========================================================================
    // Protocol Errors
    // ========================================================================
    /// Protocol violation or error reply from the engine.
    #[error("Protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    // ========================================================================
    // Liveness Errors
    // ========================================================================
    /// The event watch needed by a probe could not be opened.
    #[error("Probe subscription failed: {message}")]
    ProbeSubscriptionFailed {
        /// Description of the subscription failure.
        message: String,
    },

    /// An address could not be parsed.
    #[error("Invalid address {address:?}: {message}")]
    AddressParseFailed {
        /// The rejected input.
        address: String,
        /// Why it was rejected.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(Arc<IoError>),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(Arc<serde_json::Error>),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(Arc<WsError>),
}

// ============================================================================
// Conversions
// ============================================================================

impl From<IoError> for Error {
    fn from(err: IoError) -> Self {
        Self::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(Arc::new(err))
    }
}

impl From<WsError> for Error {
    fn from(err: WsError) -> Self {
        Self::WebSocket(Arc::new(err))
    }
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a cancellation error for `operation`.
    #[inline]
    pub fn cancelled(operation: impl Into<String>) -> Self {
        Self::Cancelled {
            operation: operation.into(),
        }
    }

    /// Creates a socket wait error.
    #[inline]
    pub fn socket_wait_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::SocketWaitFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a connect failure.
    #[inline]
    pub fn connect_failed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConnectFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a request timeout error.
    #[inline]
    pub fn request_timeout(request_id: RequestId, timeout_ms: u64) -> Self {
        Self::RequestTimeout {
            request_id,
            timeout_ms,
        }
    }

    /// Creates a protocol error.
    #[inline]
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Creates a probe subscription error.
    #[inline]
    pub fn probe_subscription_failed(message: impl Into<String>) -> Self {
        Self::ProbeSubscriptionFailed {
            message: message.into(),
        }
    }

    /// Creates an address parse error.
    #[inline]
    pub fn address_parse_failed(address: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AddressParseFailed {
            address: address.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if a context ended before the operation completed.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout { .. })
    }

    /// Returns `true` if this error came out of the bootstrap sequence.
    #[inline]
    #[must_use]
    pub fn is_bootstrap_error(&self) -> bool {
        matches!(
            self,
            Self::Cancelled { .. } | Self::SocketWaitFailed { .. } | Self::ConnectFailed { .. }
        )
    }

    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::ConnectFailed { .. }
                | Self::ConnectionClosed
                | Self::WebSocket(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
