//! Event message types.
//!
//! Events are notifications pushed by the engine without a matching
//! request.
//!
//! # Event Types
//!
//! | Module | Events |
//! |--------|--------|
//! | `ping` | `finished` |

// ============================================================================
// Imports
// ============================================================================

use std::net::IpAddr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::identifiers::RequestId;

// ============================================================================
// Constants
// ============================================================================

/// Method of the event closing a `ping.start` run.
pub const PING_FINISHED: &str = "ping.finished";

// ============================================================================
// Event
// ============================================================================

/// An event notification from the engine.
///
/// # Format
///
/// ```json
/// {
///   "id": "event-uuid",
///   "type": "event",
///   "method": "module.eventName",
///   "params": { ... }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier of this event.
    pub id: RequestId,

    /// Event type marker (always "event").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Event name in `module.eventName` format.
    pub method: String,

    /// Event-specific data.
    #[serde(default)]
    pub params: Value,
}

impl Event {
    /// Creates an event with a fresh ID.
    #[must_use]
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            id: RequestId::generate(),
            event_type: "event".to_string(),
            method: method.into(),
            params,
        }
    }

    /// Parses the event into a typed variant.
    #[must_use]
    pub fn parse(&self) -> ParsedEvent {
        match self.method.as_str() {
            PING_FINISHED => match self
                .params
                .get("address")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<IpAddr>().ok())
            {
                Some(address) => ParsedEvent::PingFinished {
                    address,
                    reply_count: self.get_u32("replyCount"),
                },
                None => self.unknown(),
            },

            _ => self.unknown(),
        }
    }

    fn unknown(&self) -> ParsedEvent {
        ParsedEvent::Unknown {
            method: self.method.clone(),
            params: self.params.clone(),
        }
    }

    /// Gets a u32 from params.
    #[inline]
    fn get_u32(&self, key: &str) -> u32 {
        self.params
            .get(key)
            .and_then(|v| v.as_u64())
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or_default()
    }
}

// ============================================================================
// ParsedEvent
// ============================================================================

/// Parsed event types for type-safe handling.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedEvent {
    /// A `ping.start` run completed.
    PingFinished {
        /// Probed destination.
        address: IpAddr,
        /// Number of echo replies received.
        reply_count: u32,
    },

    /// Unknown or malformed event.
    Unknown {
        /// Event method.
        method: String,
        /// Event params.
        params: Value,
    },
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_ping_finished_parsing() {
        let json_str = r#"{
            "id": "550e8400-e29b-41d4-a716-446655440000",
            "type": "event",
            "method": "ping.finished",
            "params": { "address": "10.0.0.2", "replyCount": 3 }
        }"#;

        let event: Event = serde_json::from_str(json_str).expect("parse event");
        assert_eq!(event.method, PING_FINISHED);

        assert_eq!(
            event.parse(),
            ParsedEvent::PingFinished {
                address: "10.0.0.2".parse().expect("ip"),
                reply_count: 3,
            }
        );
    }

    #[test]
    fn test_missing_reply_count_is_zero() {
        let event = Event::new(PING_FINISHED, json!({ "address": "fd00::1" }));
        match event.parse() {
            ParsedEvent::PingFinished { reply_count, .. } => assert_eq!(reply_count, 0),
            other => panic!("unexpected parsed event: {other:?}"),
        }
    }

    #[test]
    fn test_bad_address_falls_back_to_unknown() {
        let event = Event::new(PING_FINISHED, json!({ "address": "nope", "replyCount": 1 }));
        assert!(matches!(event.parse(), ParsedEvent::Unknown { .. }));
    }

    #[test]
    fn test_unknown_event() {
        let event = Event::new("interface.linkChanged", json!({ "swIfIndex": 3 }));
        match event.parse() {
            ParsedEvent::Unknown { method, .. } => assert_eq!(method, "interface.linkChanged"),
            other => panic!("expected Unknown variant, got {other:?}"),
        }
    }
}
