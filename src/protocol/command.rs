//! Command definitions organized by module.
//!
//! Commands follow `module.methodName` format.
//!
//! # Command Modules
//!
//! | Module | Commands |
//! |--------|----------|
//! | `control` | Session keep-alive |
//! | `ping` | Repeated echo probes |
//! | `events` | Event opt-in |

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Command Wrapper
// ============================================================================

/// All protocol commands organized by module.
///
/// This enum wraps module-specific command enums for unified serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Control module commands.
    Control(ControlCommand),
    /// Ping module commands.
    Ping(PingCommand),
    /// Events module commands.
    Events(EventsCommand),
}

impl Command {
    /// Returns the wire method name.
    #[must_use]
    pub fn method(&self) -> &'static str {
        match self {
            Self::Control(ControlCommand::Ping) => "control.ping",
            Self::Ping(PingCommand::Start { .. }) => "ping.start",
            Self::Events(EventsCommand::Want { .. }) => "events.want",
        }
    }
}

// ============================================================================
// Control Commands
// ============================================================================

/// Control module commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum ControlCommand {
    /// Round-trip no-op used to confirm a session is serviced.
    #[serde(rename = "control.ping")]
    Ping,
}

// ============================================================================
// Ping Commands
// ============================================================================

/// Ping module commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum PingCommand {
    /// Send `repeat` echo requests to `address`, `interval` seconds apart.
    ///
    /// The engine answers immediately and later emits one
    /// `ping.finished` event for the address.
    #[serde(rename = "ping.start")]
    Start {
        /// Destination address.
        address: IpAddr,
        /// Seconds between probes.
        interval: f64,
        /// Number of probes.
        repeat: u32,
    },
}

// ============================================================================
// Events Commands
// ============================================================================

/// Events module commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum EventsCommand {
    /// Enable or disable delivery of an event kind on this session.
    #[serde(rename = "events.want")]
    Want {
        /// Event method, e.g. `ping.finished`.
        event: String,
        /// Whether to deliver it.
        enable: bool,
    },
}

// ============================================================================
// Tests
// ============================================================================
