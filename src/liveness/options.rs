//! Liveness probe settings.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Echo probes requested per pair.
pub const DEFAULT_PROBE_COUNT: u32 = 4;

/// Share of the per-probe slot used as the probe interval.
///
/// Leaves room for the last reply to arrive before the window closes.
pub const DEFAULT_INTERVAL_FACTOR: f64 = 0.85;

/// Window used when the caller's context has no deadline.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

// ============================================================================
// LivenessOptions
// ============================================================================

/// Settings for a [`Prober`](super::Prober).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessOptions {
    /// Echo probes requested per pair. Never zero.
    pub probe_count: u32,
    /// Interval multiplier in `(0, 1]`.
    pub interval_factor: f64,
    /// Window when the context has no deadline.
    pub default_window: Duration,
}

impl Default for LivenessOptions {
    fn default() -> Self {
        Self {
            probe_count: DEFAULT_PROBE_COUNT,
            interval_factor: DEFAULT_INTERVAL_FACTOR,
            default_window: DEFAULT_WINDOW,
        }
    }
}

impl LivenessOptions {
    /// Creates default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of probes per pair. Zero is raised to one.
    #[inline]
    #[must_use]
    pub fn with_probe_count(mut self, count: u32) -> Self {
        self.probe_count = count.max(1);
        self
    }

    /// Sets the interval factor.
    ///
    /// Values above one are clamped to one; non-finite or non-positive
    /// values restore the default.
    #[inline]
    #[must_use]
    pub fn with_interval_factor(mut self, factor: f64) -> Self {
        self.interval_factor = if factor.is_finite() && factor > 0.0 {
            factor.min(1.0)
        } else {
            DEFAULT_INTERVAL_FACTOR
        };
        self
    }

    /// Sets the window used when the context has no deadline.
    #[inline]
    #[must_use]
    pub fn with_default_window(mut self, window: Duration) -> Self {
        self.default_window = window;
        self
    }

    /// Returns the probe interval for a window of `window`.
    #[must_use]
    pub fn interval(&self, window: Duration) -> Duration {
        window
            .checked_div(self.probe_count.max(1))
            .unwrap_or_default()
            .mul_f64(self.interval_factor)
    }
}

// ============================================================================
// Tests
// ============================================================================
