//! Session establishment over the engine's control socket.
//!
//! # Connection Flow
//!
//! 1. Connect a Unix stream to the socket path
//! 2. Upgrade to WebSocket
//! 3. Spawn the [`Connection`] event loop
//! 4. Round-trip `control.ping` to confirm the engine services the session

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;
use std::time::Duration;

use tokio::net::UnixStream;
use tracing::{debug, info};

use crate::error::{Error, Result};

use super::Connection;
use super::connection::DEFAULT_REQUEST_TIMEOUT;

// ============================================================================
// Constants
// ============================================================================

/// URL presented during the WebSocket upgrade. The host part is ignored by
/// the engine; the socket path selects the peer.
const CONTROL_URL: &str = "ws://localhost/control";

/// Default time allowed for the `control.ping` handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

// ============================================================================
// DialOptions
// ============================================================================

/// Per-attempt session settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialOptions {
    /// Time allowed for the `control.ping` handshake.
    pub handshake_timeout: Duration,
    /// Default reply timeout for requests on the session.
    pub request_timeout: Duration,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

// ============================================================================
// dial
// ============================================================================

/// Performs one connect attempt.
///
/// # Errors
///
/// - [`Error::Io`] if the socket cannot be connected
/// - [`Error::Connection`] if the WebSocket upgrade fails
/// - [`Error::RequestTimeout`] / [`Error::Protocol`] if the handshake fails
pub async fn dial(path: &Path, options: &DialOptions) -> Result<Connection> {
    let stream = UnixStream::connect(path).await?;
    debug!(path = %path.display(), "Control socket connected");

    let (ws_stream, _) = tokio_tungstenite::client_async(CONTROL_URL, stream)
        .await
        .map_err(|e| Error::connection(format!("WebSocket upgrade failed: {e}")))?;

    let connection = Connection::new(ws_stream, options.request_timeout);

    if let Err(e) = connection.control_ping(options.handshake_timeout).await {
        connection.shutdown();
        return Err(e);
    }

    info!(path = %path.display(), "Control session established");
    Ok(connection)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testing::{FakeEngine, socket_dir};

    #[test]
    fn test_default_options() {
        let options = DialOptions::default();
        assert_eq!(options.handshake_timeout, DEFAULT_HANDSHAKE_TIMEOUT);
        assert_eq!(options.request_timeout, DEFAULT_REQUEST_TIMEOUT);
    }

    #[tokio::test]
    async fn test_dial_missing_socket_is_io_error() {
        let dir = socket_dir();
        let err = dial(&dir.path().join("absent.sock"), &DialOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[tokio::test]
    async fn test_dial_requires_handshake() {
        let dir = socket_dir();
        let engine = FakeEngine::builder()
            .silent_control_ping()
            .start(dir.path().join("engine.sock"))
            .await;

        let options = DialOptions {
            handshake_timeout: Duration::from_millis(50),
            ..DialOptions::default()
        };
        let err = dial(engine.path(), &options).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_dial_succeeds() {
        let dir = socket_dir();
        let engine = FakeEngine::start(dir.path().join("engine.sock")).await;

        let connection = dial(engine.path(), &DialOptions::default())
            .await
            .expect("dial");
        assert!(!connection.is_closed());
        assert_eq!(engine.accepted(), 1);
    }
}
