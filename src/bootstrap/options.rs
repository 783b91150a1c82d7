//! Bootstrap settings.

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::transport::DialOptions;

// ============================================================================
// Constants
// ============================================================================

/// Pause between connect attempts once the socket exists.
///
/// Failures at that point are expected to be momentary.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(1);

// ============================================================================
// BootstrapOptions
// ============================================================================

/// Validated settings for one bootstrap.
///
/// Produced by [`HandleBuilder`](super::HandleBuilder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Engine control socket.
    pub socket_path: PathBuf,
    /// Pause between connect attempts.
    pub retry_backoff: Duration,
    /// Per-attempt session settings.
    pub dial: DialOptions,
}

impl BootstrapOptions {
    /// Creates options for `socket_path` with default timings.
    #[inline]
    #[must_use]
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            dial: DialOptions::default(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
