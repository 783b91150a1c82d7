//! Control-session message types.
//!
//! This module defines the message format exchanged with the engine over
//! its control socket.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Engine | Command request |
//! | `Response` | Engine → Local | Command reply |
//! | `Event` | Engine → Local | Asynchronous notification |
//!
//! # Command Naming
//!
//! Commands follow `module.methodName` format:
//!
//! - `control.ping`
//! - `ping.start`
//! - `events.want`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `command` | Command definitions by domain |
//! | `event` | Event types |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Command definitions organized by module.
pub mod command;

/// Event message types.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use command::{Command, ControlCommand, EventsCommand, PingCommand};
pub use event::{Event, PING_FINISHED, ParsedEvent};
pub use request::{Request, Response, ResponseType};
