//! Notification groups.
//!
//! A group is a prioritised set of client events.  Membership changes go
//! through [`EventManager`](crate::events::EventManager) so the host always
//! sees the same groups as the client.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{ClientEvent, Priority};

/// A named notification group holding client events ordered by ID.
///
/// Groups are created through
/// [`EventManager::create_group`](crate::events::EventManager::create_group),
/// which assigns the ID.
#[derive(Debug)]
pub struct EventGroup {
    id: u32,
    name: String,
    priority: Priority,
    events: RwLock<BTreeMap<u32, Arc<ClientEvent>>>,
}

impl EventGroup {
    pub(crate) fn new(id: u32, name: impl Into<String>, priority: Priority) -> Self {
        Self {
            id,
            name: name.into(),
            priority,
            events: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Adds `event` to the local set; returns `false` if it was already there.
    ///
    /// Callers outside the crate go through
    /// [`EventManager::add_to_group`](crate::events::EventManager::add_to_group),
    /// which also registers the membership with the host.
    pub(crate) fn add(&self, event: Arc<ClientEvent>) -> bool {
        let mut events = self.events.write();
        if events.contains_key(&event.id()) {
            return false;
        }
        events.insert(event.id(), event);
        true
    }

    pub(crate) fn remove(&self, event_id: u32) -> Option<Arc<ClientEvent>> {
        self.events.write().remove(&event_id)
    }

    pub fn contains(&self, event_id: u32) -> bool {
        self.events.read().contains_key(&event_id)
    }

    /// Members in ascending ID order.
    pub fn events(&self) -> Vec<Arc<ClientEvent>> {
        self.events.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub(crate) fn clear(&self) -> Vec<Arc<ClientEvent>> {
        std::mem::take(&mut *self.events.write())
            .into_values()
            .collect()
    }
}
