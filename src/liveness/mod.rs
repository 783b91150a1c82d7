//! Liveness probing of address pairs through the engine.
//!
//! | Item | Description |
//! |------|-------------|
//! | [`check_liveness`] | Probe with default settings |
//! | [`Prober`] | Probe with explicit [`LivenessOptions`] |
//! | [`parse_address`] | Address syntax accepted for probing |

// ============================================================================
// Submodules
// ============================================================================

/// Probe address parsing.
pub mod address;

/// Probe settings.
pub mod options;

/// Concurrent probe fan-out.
pub mod prober;

// ============================================================================
// Re-exports
// ============================================================================

pub use address::parse_address;
pub use options::{
    DEFAULT_INTERVAL_FACTOR, DEFAULT_PROBE_COUNT, DEFAULT_WINDOW, LivenessOptions,
};
pub use prober::{Prober, check_liveness};
