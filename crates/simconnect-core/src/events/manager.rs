//! Session registry of client events and notification groups.
//!
//! # Mapping and membership
//!
//! The host needs three things before it accepts a client event:
//!
//! 1. the event ID mapped to a host event name (`MapClientEventToSimEvent`),
//! 2. the event added to a notification group,
//! 3. the group's priority set.
//!
//! The manager tracks membership per (group, event) pair and keeps a
//! reference count per event: an event counts as mapped while at least one
//! group holds it.  The host mapping itself is sent only once per event and
//! connection, because the host offers no way to undo it.
//!
//! A membership the host does not know about yet (for example one that
//! outlived a lost connection) is registered on demand before the event is
//! transmitted through it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use crate::channel::{HostChannel, HostError};
use crate::events::{ClientEvent, EventData, EventError, EventGroup, Priority};
use crate::protocol::{IdAllocator, SystemEvent};
use crate::reactive::{MessageObserver, MessageStream};

/// Name of the group events join when they are sent without one.
pub const DEFAULT_GROUP_NAME: &str = "Default EventGroup";

#[derive(Default)]
struct GroupTable {
    by_name: HashMap<String, Arc<EventGroup>>,
    by_id: BTreeMap<u32, Arc<EventGroup>>,
}

#[derive(Default)]
struct EventTable {
    by_name: HashMap<String, Arc<ClientEvent>>,
    by_id: HashMap<u32, Arc<ClientEvent>>,
}

#[derive(Default)]
struct Registrations {
    /// Number of groups holding each event.
    refs: HashMap<u32, usize>,
    /// Events whose name mapping was sent to the host.
    host_mapped: HashSet<u32>,
    /// Host-registered (group, event) pairs and their maskable flag.
    members: HashMap<(u32, u32), bool>,
    /// Pairs registered on a previous connection, waiting to be re-sent.
    lapsed: HashMap<(u32, u32), bool>,
}

/// Creates and tracks client events and notification groups for one session.
pub struct EventManager {
    channel: Arc<dyn HostChannel>,
    event_ids: IdAllocator,
    group_ids: IdAllocator,
    groups: RwLock<GroupTable>,
    events: RwLock<EventTable>,
    registrations: Mutex<Registrations>,
    streams: RwLock<HashMap<u32, Arc<MessageStream<EventData>>>>,
    /// Live system event subscriptions by event ID.
    system_events: Mutex<HashMap<u32, SystemEvent>>,
}

impl EventManager {
    pub fn new(channel: Arc<dyn HostChannel>) -> Self {
        Self {
            channel,
            event_ids: IdAllocator::events(),
            group_ids: IdAllocator::groups(),
            groups: RwLock::new(GroupTable::default()),
            events: RwLock::new(EventTable::default()),
            registrations: Mutex::new(Registrations::default()),
            streams: RwLock::new(HashMap::new()),
            system_events: Mutex::new(HashMap::new()),
        }
    }

    // ── Groups ───────────────────────────────────────────────────────────────

    /// Creates a notification group.
    ///
    /// # Errors
    ///
    /// [`EventError::DuplicateGroup`] if a group with this name exists.
    pub fn create_group(
        &self,
        name: &str,
        priority: Priority,
    ) -> Result<Arc<EventGroup>, EventError> {
        let mut groups = self.groups.write();
        if groups.by_name.contains_key(name) {
            return Err(EventError::DuplicateGroup(name.to_string()));
        }
        let group = Arc::new(EventGroup::new(self.group_ids.next()?, name, priority));
        groups.by_name.insert(name.to_string(), Arc::clone(&group));
        groups.by_id.insert(group.id(), Arc::clone(&group));
        debug!(
            "created event group {} '{}' (priority {})",
            group.id(),
            group.name(),
            group.priority()
        );
        Ok(group)
    }

    pub fn group(&self, name: &str) -> Option<Arc<EventGroup>> {
        self.groups.read().by_name.get(name).cloned()
    }

    pub fn group_by_id(&self, group_id: u32) -> Option<Arc<EventGroup>> {
        self.groups.read().by_id.get(&group_id).cloned()
    }

    /// All groups, highest precedence (lowest priority value) first; equal
    /// priorities are ordered by ID.
    pub fn groups(&self) -> Vec<Arc<EventGroup>> {
        let mut groups: Vec<_> = self.groups.read().by_id.values().cloned().collect();
        groups.sort_by_key(|g| (g.priority(), g.id()));
        groups
    }

    /// The group events join when sent without one, created on first use.
    pub fn default_group(&self) -> Result<Arc<EventGroup>, EventError> {
        if let Some(group) = self.group(DEFAULT_GROUP_NAME) {
            return Ok(group);
        }
        match self.create_group(DEFAULT_GROUP_NAME, Priority::HIGHEST) {
            // Lost a race with another thread creating it.
            Err(EventError::DuplicateGroup(_)) => self
                .group(DEFAULT_GROUP_NAME)
                .ok_or(EventError::DuplicateGroup(DEFAULT_GROUP_NAME.to_string())),
            other => other,
        }
    }

    /// Removes a group and all its memberships.
    pub fn remove_group(&self, group: &EventGroup) -> Result<(), EventError> {
        let registered = {
            let mut groups = self.groups.write();
            let found = groups.by_id.remove(&group.id());
            if found.is_some() {
                groups.by_name.remove(group.name());
            }
            found
        };
        let Some(registered) = registered else {
            return Err(EventError::UnknownGroup(group.id()));
        };

        let mut reg = self.registrations.lock();
        for event in registered.clear() {
            let pair = (registered.id(), event.id());
            reg.lapsed.remove(&pair);
            if reg.members.remove(&pair).is_some() {
                release(&mut reg, event.id());
            }
        }
        drop(reg);

        self.channel
            .clear_notification_group(registered.id())
            .map_err(|source| host_error("ClearNotificationGroup", registered.name(), source))
    }

    // ── Events ───────────────────────────────────────────────────────────────

    /// Returns the client event for `name`, creating it on first use.
    pub fn event(&self, name: &str) -> Result<Arc<ClientEvent>, EventError> {
        if name.is_empty() {
            return Err(EventError::EmptyEventName);
        }
        if let Some(event) = self.events.read().by_name.get(name) {
            return Ok(Arc::clone(event));
        }

        let mut events = self.events.write();
        if let Some(event) = events.by_name.get(name) {
            return Ok(Arc::clone(event));
        }
        let event = Arc::new(ClientEvent::new(self.event_ids.next()?, name));
        events.by_name.insert(name.to_string(), Arc::clone(&event));
        events.by_id.insert(event.id(), Arc::clone(&event));
        debug!("event ID {}: '{}'", event.id(), name);
        Ok(event)
    }

    pub fn event_by_id(&self, event_id: u32) -> Option<Arc<ClientEvent>> {
        self.events.read().by_id.get(&event_id).cloned()
    }

    /// `true` while at least one group holds `event`.
    pub fn is_mapped(&self, event: &ClientEvent) -> bool {
        self.registrations
            .lock()
            .refs
            .get(&event.id())
            .is_some_and(|n| *n > 0)
    }

    /// Groups the host knows to hold `event`, highest precedence first.
    pub fn groups_of(&self, event: &ClientEvent) -> Vec<Arc<EventGroup>> {
        let groups = self.groups();
        let reg = self.registrations.lock();
        groups
            .into_iter()
            .filter(|g| reg.members.contains_key(&(g.id(), event.id())))
            .collect()
    }

    // ── Membership ───────────────────────────────────────────────────────────

    /// Adds `event` to `group` on the host and locally.
    ///
    /// Maps the event name on first use, then adds the event to the host
    /// group and sets the group priority.  Adding an event that is already a
    /// member does nothing.
    pub fn add_to_group(
        &self,
        group: &EventGroup,
        event: &Arc<ClientEvent>,
        maskable: bool,
    ) -> Result<(), EventError> {
        let Some(group) = self.group_by_id(group.id()) else {
            return Err(EventError::UnknownGroup(group.id()));
        };

        let mut reg = self.registrations.lock();
        let pair = (group.id(), event.id());
        if reg.members.contains_key(&pair) {
            return Ok(());
        }

        if !reg.host_mapped.contains(&event.id()) {
            self.channel
                .map_client_event_to_sim_event(event.id(), event.mapped_event())
                .map_err(|source| host_error("MapClientEventToSimEvent", event.mapped_event(), source))?;
            reg.host_mapped.insert(event.id());
        }
        self.channel
            .add_client_event_to_notification_group(group.id(), event.id(), maskable)
            .map_err(|source| {
                host_error("AddClientEventToNotificationGroup", event.mapped_event(), source)
            })?;
        self.channel
            .set_notification_group_priority(group.id(), group.priority())
            .map_err(|source| {
                host_error("SetNotificationGroupPriority", event.mapped_event(), source)
            })?;

        group.add(Arc::clone(event));
        reg.lapsed.remove(&pair);
        reg.members.insert(pair, maskable);
        *reg.refs.entry(event.id()).or_default() += 1;
        Ok(())
    }

    /// Removes `event` from `group` on the host and locally.
    pub fn remove_from_group(&self, group: &EventGroup, event: &ClientEvent) -> Result<(), EventError> {
        let Some(group) = self.group_by_id(group.id()) else {
            return Err(EventError::UnknownGroup(group.id()));
        };

        let mut reg = self.registrations.lock();
        let pair = (group.id(), event.id());
        if !group.contains(event.id()) {
            return Err(EventError::NotInGroup {
                group_id: group.id(),
                event_id: event.id(),
            });
        }
        if reg.members.contains_key(&pair) {
            self.channel
                .remove_client_event(group.id(), event.id())
                .map_err(|source| host_error("RemoveClientEvent", event.mapped_event(), source))?;
            reg.members.remove(&pair);
            release(&mut reg, event.id());
        }
        reg.lapsed.remove(&pair);
        group.remove(event.id());
        Ok(())
    }

    // ── Sending and receiving ────────────────────────────────────────────────

    /// Transmits `event` to `object_id`.
    ///
    /// An event that belongs to no group joins the default group first.  An
    /// event in several groups is sent through the one with the highest
    /// precedence.
    pub fn send(&self, event: &Arc<ClientEvent>, object_id: u32, data: u32) -> Result<(), EventError> {
        let group = self.transmit_group(event)?;
        debug!(
            "TransmitClientEvent(object {object_id}, '{}', {data}, group {})",
            event.mapped_event(),
            group.id()
        );
        self.channel
            .transmit_client_event(object_id, event.id(), data, group.id())
            .map_err(|source| {
                error!("TransmitClientEvent failed for '{}': {source}", event.mapped_event());
                host_error("TransmitClientEvent", event.mapped_event(), source)
            })
    }

    /// Like [`send`](Self::send) with a signed payload.
    pub fn send_signed(&self, event: &Arc<ClientEvent>, object_id: u32, data: i32) -> Result<(), EventError> {
        self.send(event, object_id, data as u32)
    }

    /// Returns the notification stream for `event`, registering it with the
    /// default group if it belongs to none.
    pub fn subscribe(&self, event: &Arc<ClientEvent>) -> Result<Arc<MessageStream<EventData>>, EventError> {
        self.transmit_group(event)?;
        if let Some(stream) = self.streams.read().get(&event.id()) {
            return Ok(Arc::clone(stream));
        }
        let mut streams = self.streams.write();
        let stream = streams
            .entry(event.id())
            .or_insert_with(|| Arc::new(MessageStream::default()));
        Ok(Arc::clone(stream))
    }

    /// Subscribes to a host system event.
    ///
    /// Each call allocates a fresh event ID; notifications arrive through
    /// [`dispatch_event`](Self::dispatch_event) like any client event.
    pub fn subscribe_system_event(
        &self,
        system_event: SystemEvent,
    ) -> Result<Arc<MessageStream<EventData>>, EventError> {
        let event_id = self.event_ids.next()?;
        debug!("event ID {event_id}: subscribing to '{}'", system_event.as_str());
        let stream = Arc::new(MessageStream::default());
        self.streams.write().insert(event_id, Arc::clone(&stream));

        if let Err(source) = self
            .channel
            .subscribe_to_system_event(event_id, system_event.as_str())
        {
            self.streams.write().remove(&event_id);
            error!("SubscribeToSystemEvent failed for '{}': {source}", system_event.as_str());
            return Err(host_error("SubscribeToSystemEvent", system_event.as_str(), source));
        }
        self.system_events.lock().insert(event_id, system_event);
        Ok(stream)
    }

    /// Ends a system event subscription and completes its stream.
    pub fn unsubscribe_system_event(&self, event_id: u32) -> Result<(), EventError> {
        let Some(system_event) = self.system_events.lock().remove(&event_id) else {
            return Err(EventError::UnknownSystemEvent(event_id));
        };
        let stream = self.streams.write().remove(&event_id);
        if let Some(stream) = stream {
            stream.on_completed();
        }
        self.channel
            .unsubscribe_from_system_event(event_id)
            .map_err(|source| host_error("UnsubscribeFromSystemEvent", system_event.as_str(), source))
    }

    /// The system event behind `event_id`, if it is a live subscription.
    pub fn system_event(&self, event_id: u32) -> Option<SystemEvent> {
        self.system_events.lock().get(&event_id).copied()
    }

    /// Delivers an inbound host event; returns `false` if nobody subscribed.
    pub fn dispatch_event(&self, event_id: u32, data: u32) -> bool {
        let stream = self.streams.read().get(&event_id).cloned();
        match stream {
            Some(stream) => {
                stream.on_next(EventData { event_id, data });
                true
            }
            None => {
                debug!("no subscriber for event {event_id}");
                false
            }
        }
    }

    /// Completes every event stream; used when the connection is lost.
    pub fn close_streams(&self) {
        for (_, stream) in self.streams.write().drain() {
            stream.on_completed();
        }
    }

    /// Forgets everything the host was told: name mappings, host group
    /// memberships, and system event subscriptions.
    ///
    /// Events, groups, and local memberships survive; each membership is
    /// registered with the host again the next time an event is sent or
    /// subscribed through it.
    pub fn forget_host_state(&self) {
        let mut reg = self.registrations.lock();
        let members = std::mem::take(&mut reg.members);
        reg.lapsed.extend(members);
        reg.refs.clear();
        reg.host_mapped.clear();
        drop(reg);
        self.system_events.lock().clear();
    }

    fn transmit_group(&self, event: &Arc<ClientEvent>) -> Result<Arc<EventGroup>, EventError> {
        if let Some(group) = self.groups_of(event).into_iter().next() {
            return Ok(group);
        }
        // Held locally but unknown to the host: register it there.
        if let Some(group) = self
            .groups()
            .into_iter()
            .find(|g| g.contains(event.id()))
        {
            let maskable = self
                .registrations
                .lock()
                .lapsed
                .get(&(group.id(), event.id()))
                .copied()
                .unwrap_or(false);
            debug!(
                "registering '{}' with group {} before use",
                event.mapped_event(),
                group.id()
            );
            self.add_to_group(&group, event, maskable)?;
            return Ok(group);
        }
        let group = self.default_group()?;
        self.add_to_group(&group, event, false)?;
        Ok(group)
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("groups", &self.groups.read().by_id.len())
            .field("events", &self.events.read().by_id.len())
            .finish()
    }
}

fn release(reg: &mut Registrations, event_id: u32) {
    if let Some(count) = reg.refs.get_mut(&event_id) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            reg.refs.remove(&event_id);
        }
    }
}

fn host_error(api: &'static str, event: &str, source: HostError) -> EventError {
    EventError::Host {
        api,
        event: event.to_string(),
        source,
    }
}
