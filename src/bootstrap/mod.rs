//! Deferred bootstrap of the engine control channel.
//!
//! This module provides the entry point used by every dataplane-configuring
//! component: a [`Handle`] that exists before the engine does.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`bootstrap`] | Start a bootstrap with default settings |
//! | [`Handle`] | Gated control channel |
//! | [`HandleBuilder`] | Fluent configuration builder |
//! | [`BootstrapOptions`] | Validated settings |
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use dataplane_link::{CallContext, Result, bootstrap};
//!
//! # async fn example() -> Result<()> {
//! let cx = CallContext::new();
//! let handle = bootstrap(&cx, "/run/engine/api.sock");
//!
//! let call_cx = CallContext::new().with_timeout(Duration::from_secs(5));
//! handle.wait_ready(&call_cx).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder for bootstrap configuration.
pub mod builder;

/// Gated handle and background resolution.
pub mod handle;

/// Bootstrap settings.
pub mod options;

/// Socket creation watch.
mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::HandleBuilder;
pub use handle::{Handle, bootstrap};
pub use options::{BootstrapOptions, DEFAULT_RETRY_BACKOFF};
