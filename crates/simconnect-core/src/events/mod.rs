//! Client events and notification groups.
//!
//! # How events reach the host (for beginners)
//!
//! A *client event* is a small integer ID the client picks, bound ("mapped")
//! to a host event name such as `"AP_MASTER"`.  Before the host accepts a
//! transmitted client event, the event must belong to a *notification group*.
//! Each group has a numeric priority; the host hands events to the groups of
//! all connected clients in priority order, lowest number first.
//!
//! [`EventManager`] owns the session's events and groups, makes the host
//! calls in the right order, and delivers inbound events to subscribers.

pub mod client_event;
pub mod group;
pub mod manager;

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::channel::HostError;
use crate::protocol::IdError;

pub use client_event::ClientEvent;
pub use group::EventGroup;
pub use manager::{EventManager, DEFAULT_GROUP_NAME};

/// Dispatch priority of a notification group; lower values are served first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Priority(pub u32);

impl Priority {
    pub const HIGHEST: Priority = Priority(1);
    /// Highest priority at which events can still be masked from lower groups.
    pub const HIGHEST_MASKABLE: Priority = Priority(10_000_000);
    pub const STANDARD: Priority = Priority(1_900_000_000);
    pub const DEFAULT: Priority = Priority(2_000_000_000);
    pub const LOWEST: Priority = Priority(4_000_000_000);

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::DEFAULT
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Priority::HIGHEST => f.write_str("Highest"),
            Priority::HIGHEST_MASKABLE => f.write_str("HighestMaskable"),
            Priority::STANDARD => f.write_str("Standard"),
            Priority::DEFAULT => f.write_str("Default"),
            Priority::LOWEST => f.write_str("Lowest"),
            Priority(other) => write!(f, "{other}"),
        }
    }
}

/// A client event as seen by a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventData {
    pub event_id: u32,
    pub data: u32,
}

impl EventData {
    /// The payload reinterpreted as a signed value.
    pub fn signed(&self) -> i32 {
        self.data as i32
    }
}

/// Errors raised by event and group operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EventError {
    #[error("an event group named '{0}' already exists")]
    DuplicateGroup(String),

    #[error("event name must not be empty")]
    EmptyEventName,

    #[error("event group {0} is not registered with this session")]
    UnknownGroup(u32),

    #[error("event {0} is not a live system event subscription")]
    UnknownSystemEvent(u32),

    #[error("client event {event_id} is not in group {group_id}")]
    NotInGroup { group_id: u32, event_id: u32 },

    #[error("{api} failed for event '{event}': {source}")]
    Host {
        api: &'static str,
        event: String,
        #[source]
        source: HostError,
    },

    #[error(transparent)]
    Ids(#[from] IdError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_constants_are_ordered() {
        let mut priorities = vec![
            Priority::LOWEST,
            Priority::DEFAULT,
            Priority::HIGHEST,
            Priority::STANDARD,
            Priority::HIGHEST_MASKABLE,
        ];

        priorities.sort();

        assert_eq!(
            priorities,
            vec![
                Priority::HIGHEST,
                Priority::HIGHEST_MASKABLE,
                Priority::STANDARD,
                Priority::DEFAULT,
                Priority::LOWEST,
            ]
        );
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::HIGHEST.to_string(), "Highest");
        assert_eq!(Priority(42).to_string(), "42");
    }

    #[test]
    fn test_event_data_signed_view() {
        let data = EventData {
            event_id: 65,
            data: u32::MAX,
        };
        assert_eq!(data.signed(), -1);
    }
}
