//! Client events: session-local IDs bound to host event names.

use std::sync::Arc;

use tracing::error;

use crate::events::{EventError, EventManager};

/// A client event bound to a host event name.
///
/// Obtain one with [`EventManager::event`]; the manager guarantees a single
/// instance (and ID) per host event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEvent {
    id: u32,
    mapped_event: String,
}

impl ClientEvent {
    pub(crate) fn new(id: u32, mapped_event: impl Into<String>) -> Self {
        Self {
            id,
            mapped_event: mapped_event.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Host event name, e.g. `"AP_MASTER"`.
    pub fn mapped_event(&self) -> &str {
        &self.mapped_event
    }

    /// Transmits this event to `object_id`; a failure is handed to `on_error`.
    pub fn send<F>(self: &Arc<Self>, manager: &EventManager, object_id: u32, data: u32, on_error: F)
    where
        F: FnOnce(EventError),
    {
        if let Err(err) = manager.send(self, object_id, data) {
            on_error(err);
        }
    }

    /// Like [`send`](Self::send), logging failures.
    pub fn send_or_log(self: &Arc<Self>, manager: &EventManager, object_id: u32, data: u32) {
        self.send(manager, object_id, data, |err| {
            error!("failed to send '{}': {err}", self.mapped_event);
        });
    }
}
