//! Builder pattern for bootstrap configuration.
//!
//! Provides a fluent API for configuring and starting a [`Handle`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use dataplane_link::{CallContext, Handle};
//!
//! # async fn example() -> dataplane_link::Result<()> {
//! let cx = CallContext::new();
//! let handle = Handle::builder()
//!     .socket_path("/run/engine/api.sock")
//!     .retry_backoff(Duration::from_millis(5))
//!     .bootstrap(&cx)?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use crate::context::CallContext;
use crate::error::{Error, Result};
use crate::transport::DialOptions;

use super::handle::Handle;
use super::options::{BootstrapOptions, DEFAULT_RETRY_BACKOFF};

// ============================================================================
// HandleBuilder
// ============================================================================

/// Builder for configuring a [`Handle`].
///
/// Use [`Handle::builder()`] to create a new builder.
#[derive(Debug, Clone)]
pub struct HandleBuilder {
    /// Engine control socket.
    socket_path: Option<PathBuf>,
    /// Pause between connect attempts.
    retry_backoff: Duration,
    /// Per-attempt session settings.
    dial: DialOptions,
}

impl Default for HandleBuilder {
    fn default() -> Self {
        Self {
            socket_path: None,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            dial: DialOptions::default(),
        }
    }
}

// ============================================================================
// HandleBuilder Implementation
// ============================================================================

impl HandleBuilder {
    /// Creates a new builder with default timings and no socket path.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the engine's control socket path.
    #[inline]
    #[must_use]
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = Some(path.into());
        self
    }

    /// Sets the pause between connect attempts.
    #[inline]
    #[must_use]
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Sets the time allowed for the session handshake.
    #[inline]
    #[must_use]
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.dial.handshake_timeout = timeout;
        self
    }

    /// Sets the default reply timeout for requests on the session.
    #[inline]
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.dial.request_timeout = timeout;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the socket path is missing or empty
    /// - [`Error::Config`] if any duration is zero
    pub fn build(self) -> Result<BootstrapOptions> {
        let socket_path = self.validate_socket_path()?;
        self.validate_timings()?;

        Ok(BootstrapOptions {
            socket_path,
            retry_backoff: self.retry_backoff,
            dial: self.dial,
        })
    }

    /// Validates and starts the bootstrap.
    ///
    /// Returns as soon as the background task is spawned.
    ///
    /// # Errors
    ///
    /// Same as [`HandleBuilder::build`].
    pub fn bootstrap(self, cx: &CallContext) -> Result<Handle> {
        let options = self.build()?;
        Ok(Handle::spawn(cx, options))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl HandleBuilder {
    /// Validates the socket path configuration.
    fn validate_socket_path(&self) -> Result<PathBuf> {
        let path = self.socket_path.clone().ok_or_else(|| {
            Error::config(
                "Socket path is required. Use .socket_path() to set it.\n\
                 Example: Handle::builder().socket_path(\"/run/engine/api.sock\")",
            )
        })?;

        if path.as_os_str().is_empty() || path.file_name().is_none() {
            return Err(Error::config(format!(
                "Socket path must name a file: {:?}",
                path
            )));
        }

        Ok(path)
    }

    /// Rejects zero durations.
    fn validate_timings(&self) -> Result<()> {
        for (name, value) in [
            ("retry_backoff", self.retry_backoff),
            ("handshake_timeout", self.dial.handshake_timeout),
            ("request_timeout", self.dial.request_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = HandleBuilder::new();
        assert!(builder.socket_path.is_none());
        assert_eq!(builder.retry_backoff, DEFAULT_RETRY_BACKOFF);
    }

    #[test]
    fn test_socket_path_sets_path() {
        let builder = HandleBuilder::new().socket_path("/run/engine/api.sock");
        assert_eq!(
            builder.socket_path,
            Some(PathBuf::from("/run/engine/api.sock"))
        );
    }

    #[test]
    fn test_build_fails_without_socket_path() {
        let err = HandleBuilder::new().build().unwrap_err();
        assert!(err.to_string().contains("Socket path is required"));
    }

    #[test]
    fn test_build_rejects_directory_like_path() {
        let err = HandleBuilder::new().socket_path("/").build().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_build_rejects_zero_backoff() {
        let err = HandleBuilder::new()
            .socket_path("/run/engine/api.sock")
            .retry_backoff(Duration::ZERO)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("retry_backoff"));
    }

    #[test]
    fn test_build_carries_timings() {
        let options = HandleBuilder::new()
            .socket_path("/run/engine/api.sock")
            .retry_backoff(Duration::from_millis(5))
            .handshake_timeout(Duration::from_millis(500))
            .request_timeout(Duration::from_secs(3))
            .build()
            .expect("valid");

        assert_eq!(options.retry_backoff, Duration::from_millis(5));
        assert_eq!(options.dial.handshake_timeout, Duration::from_millis(500));
        assert_eq!(options.dial.request_timeout, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_bootstrap_starts_handle() {
        let handle = HandleBuilder::new()
            .socket_path("/nonexistent-dir/engine.sock")
            .bootstrap(&CallContext::new())
            .expect("valid configuration");

        assert!(!handle.is_ready() || handle.terminal_error().is_some());
        handle.shutdown();
    }
}
