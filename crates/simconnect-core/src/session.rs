//! The client session: one connection's worth of definitions, events, and
//! outstanding requests.
//!
//! # Why a session object? (for beginners)
//!
//! Identifier counters, the definition cache, and the event tables all belong
//! to a single connection: when the connection drops, definitions must be
//! re-published and pending requests must fail.  Keeping them together in a
//! [`SimSession`] (instead of process-wide globals) makes that reset a single
//! call and lets tests run many independent sessions side by side.
//!
//! # Inbound traffic
//!
//! The transport that reads host messages calls [`SimSession::on_reply`],
//! [`SimSession::on_exception`], and [`SimSession::on_event`]; everything else
//! is outbound.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{HostChannel, HostError};
use crate::config::SessionConfig;
use crate::definition::{
    DataRecord, DataShape, DefinitionError, DefinitionRegistry, Direction, DynamicDefinition,
    FieldDescriptor, ObjectDefinition,
};
use crate::events::{ClientEvent, EventData, EventError, EventGroup, EventManager, Priority};
use crate::protocol::{
    DataRequestFlags, HostReply, ObjectData, ObjectDataPeriod, ObjectType, SystemEvent,
    SystemState, SystemStateKind, MAX_RADIUS_METERS,
};
use crate::reactive::{MessageResult, MessageStream, RequestError};
use crate::request::RequestManager;

/// Per-connection client state.
pub struct SimSession {
    id: Uuid,
    config: SessionConfig,
    channel: Arc<dyn HostChannel>,
    definitions: DefinitionRegistry,
    events: EventManager,
    requests: Arc<RequestManager>,
    /// Periodic data streams by request ID: (definition ID, object ID).
    streams: Mutex<HashMap<u32, (u32, u32)>>,
}

impl SimSession {
    pub fn new(config: SessionConfig, channel: Arc<dyn HostChannel>) -> Self {
        let id = Uuid::new_v4();
        info!("session {id} created for '{}'", config.app_name);
        Self {
            id,
            config,
            definitions: DefinitionRegistry::new(Arc::clone(&channel)),
            events: EventManager::new(Arc::clone(&channel)),
            requests: Arc::new(RequestManager::new()),
            streams: Mutex::new(HashMap::new()),
            channel,
        }
    }

    /// Unique ID of this session, used to tell sessions apart in logs.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn definitions(&self) -> &DefinitionRegistry {
        &self.definitions
    }

    pub fn events(&self) -> &EventManager {
        &self.events
    }

    pub fn requests(&self) -> &Arc<RequestManager> {
        &self.requests
    }

    // ── Data definitions ─────────────────────────────────────────────────────

    /// Compiles and publishes `S` for `direction` (cached per session).
    pub fn define<S: DataShape>(
        &self,
        direction: Direction,
    ) -> Result<Arc<ObjectDefinition<S>>, DefinitionError> {
        self.definitions.define::<S>(direction)
    }

    /// Publishes a definition assembled at runtime.
    pub fn define_dynamic(
        &self,
        fields: Vec<FieldDescriptor>,
    ) -> Result<Arc<DynamicDefinition>, DefinitionError> {
        self.definitions.define_dynamic(fields)
    }

    // ── Requests ─────────────────────────────────────────────────────────────

    /// Requests one snapshot of `S` for `object_id`.
    ///
    /// Definition and send failures come back as an already failed result.
    pub fn request_data<S>(&self, object_id: u32) -> Arc<MessageResult<S>>
    where
        S: DataShape + Clone,
    {
        let def = match self.definitions.define::<S>(Direction::Get) {
            Ok(def) => def,
            Err(err) => return Arc::new(MessageResult::error_result(0, err.into())),
        };
        let definition_id = def.id();
        let channel = Arc::clone(&self.channel);
        let result = self.requests.issue(
            "RequestDataOnSimObject",
            |request_id| {
                channel.request_data_on_sim_object(
                    request_id,
                    definition_id,
                    object_id,
                    ObjectDataPeriod::Once,
                    DataRequestFlags::NONE,
                )
            },
            move |request_id, reply| match reply {
                HostReply::ObjectData(data) => Ok(def.materialize(&data)?),
                other => Err(unexpected(request_id, "ObjectData", &other)),
            },
        );
        self.arm_timeout(&result);
        result
    }

    /// Requests one record of a dynamic definition for `object_id`.
    pub fn request_record(
        &self,
        definition: &Arc<DynamicDefinition>,
        object_id: u32,
    ) -> Arc<MessageResult<DataRecord>> {
        if !self.definitions.is_known(definition.id()) {
            return Arc::new(MessageResult::error_result(
                0,
                DefinitionError::UnknownDefinition(definition.id()).into(),
            ));
        }
        let definition_id = definition.id();
        let def = Arc::clone(definition);
        let channel = Arc::clone(&self.channel);
        let result = self.requests.issue(
            "RequestDataOnSimObject",
            |request_id| {
                channel.request_data_on_sim_object(
                    request_id,
                    definition_id,
                    object_id,
                    ObjectDataPeriod::Once,
                    DataRequestFlags::NONE,
                )
            },
            move |request_id, reply| match reply {
                HostReply::ObjectData(data) => Ok(def.record(&data)?),
                other => Err(unexpected(request_id, "ObjectData", &other)),
            },
        );
        self.arm_timeout(&result);
        result
    }

    /// Streams `S` for `object_id` at `period` until stopped.
    ///
    /// With [`ObjectDataPeriod::Once`] the stream completes after the first
    /// reply.  `only_when_changed` asks the host to skip unchanged samples.
    pub fn request_data_stream<S>(
        &self,
        object_id: u32,
        period: ObjectDataPeriod,
        only_when_changed: bool,
    ) -> Result<Arc<MessageStream<S>>, RequestError>
    where
        S: DataShape + Clone,
    {
        let def = self.definitions.define::<S>(Direction::Get)?;
        let definition_id = def.id();
        self.open_stream(definition_id, object_id, period, only_when_changed, move |request_id, reply| {
            match reply {
                HostReply::ObjectData(data) => Ok(def.materialize(&data)?),
                other => Err(unexpected(request_id, "ObjectData", &other)),
            }
        })
    }

    /// Like [`request_data_stream`](Self::request_data_stream), but copies
    /// each reply into the caller's `target` instead of building a new `S`.
    ///
    /// The returned stream signals every copy with `()`.
    pub fn request_data_into<S>(
        &self,
        target: &Arc<Mutex<S>>,
        object_id: u32,
        period: ObjectDataPeriod,
        only_when_changed: bool,
    ) -> Result<Arc<MessageStream<()>>, RequestError>
    where
        S: DataShape,
    {
        let def = self.definitions.define::<S>(Direction::Get)?;
        let definition_id = def.id();
        let target = Arc::clone(target);
        self.open_stream(definition_id, object_id, period, only_when_changed, move |request_id, reply| {
            match reply {
                HostReply::ObjectData(data) => Ok(def.copy_into(&data, &mut *target.lock())?),
                other => Err(unexpected(request_id, "ObjectData", &other)),
            }
        })
    }

    /// Stops a periodic stream; `false` if `request_id` was not streaming.
    ///
    /// The host is told to stop sending and the stream completes.
    pub fn stop_data_stream(&self, request_id: u32) -> Result<bool, RequestError> {
        let Some((definition_id, object_id)) = self.streams.lock().remove(&request_id) else {
            return Ok(false);
        };
        self.requests.complete(request_id);
        self.channel.request_data_on_sim_object(
            request_id,
            definition_id,
            object_id,
            ObjectDataPeriod::Never,
            DataRequestFlags::NONE,
        )?;
        debug!("stopped data stream {request_id}");
        Ok(true)
    }

    /// Number of periodic streams that have not been stopped.
    pub fn active_streams(&self) -> usize {
        self.streams.lock().len()
    }

    /// Requests `S` from every object of `object_type` within
    /// `radius_meters` of the user.
    ///
    /// One value arrives per object; the stream completes after the entry
    /// the host numbers last.  Radii beyond [`MAX_RADIUS_METERS`] are clamped.
    pub fn request_data_on_object_type<S>(
        &self,
        object_type: ObjectType,
        radius_meters: u32,
    ) -> Result<Arc<MessageStream<S>>, RequestError>
    where
        S: DataShape + Clone,
    {
        let radius_meters = if radius_meters > MAX_RADIUS_METERS {
            warn!("radius {radius_meters} m exceeds the host limit, using {MAX_RADIUS_METERS} m");
            MAX_RADIUS_METERS
        } else {
            radius_meters
        };
        let def = self.definitions.define::<S>(Direction::Get)?;
        let definition_id = def.id();
        let channel = Arc::clone(&self.channel);
        self.requests.issue_stream(
            "RequestDataOnSimObjectType",
            |request_id| {
                channel.request_data_on_sim_object_type(request_id, definition_id, radius_meters, object_type)
            },
            move |request_id, reply| match reply {
                HostReply::ObjectData(data) => Ok(def.materialize(&data)?),
                other => Err(unexpected(request_id, "ObjectData", &other)),
            },
            is_last_entry,
        )
    }

    /// Writes `data` to `object_id` through the set definition of `S`.
    pub fn set_data<S: DataShape>(&self, object_id: u32, data: &S) -> Result<(), RequestError> {
        let def = self.definitions.define::<S>(Direction::Set)?;
        let values = def.extract(data)?;
        self.channel
            .set_data_on_sim_object(def.id(), object_id, &values)?;
        Ok(())
    }

    /// Asks the host for a system state.
    pub fn request_system_state(&self, kind: SystemStateKind) -> Arc<MessageResult<SystemState>> {
        let channel = Arc::clone(&self.channel);
        let result = self.requests.issue(
            "RequestSystemState",
            |request_id| channel.request_system_state(request_id, kind.as_str()),
            |request_id, reply| match reply {
                HostReply::SystemState(state) => Ok(state),
                other => Err(unexpected(request_id, "SystemState", &other)),
            },
        );
        self.arm_timeout(&result);
        result
    }

    // ── Events ───────────────────────────────────────────────────────────────

    pub fn create_group(&self, name: &str, priority: Priority) -> Result<Arc<EventGroup>, EventError> {
        self.events.create_group(name, priority)
    }

    pub fn event(&self, name: &str) -> Result<Arc<ClientEvent>, EventError> {
        self.events.event(name)
    }

    /// Subscribes to a host system event such as `Pause` or `1Sec`.
    pub fn subscribe_system_event(
        &self,
        system_event: SystemEvent,
    ) -> Result<Arc<MessageStream<EventData>>, EventError> {
        self.events.subscribe_system_event(system_event)
    }

    /// Looks up (or creates) the event `name` and transmits it.
    pub fn send_event(&self, name: &str, object_id: u32, data: u32) -> Result<(), EventError> {
        let event = self.events.event(name)?;
        self.events.send(&event, object_id, data)
    }

    // ── Inbound ──────────────────────────────────────────────────────────────

    /// Routes a correlated host reply; `false` if no request was waiting.
    pub fn on_reply(&self, request_id: u32, reply: HostReply) -> bool {
        self.requests.dispatch(request_id, reply)
    }

    /// Routes a host exception to the request it belongs to.
    pub fn on_exception(&self, request_id: u32, error: HostError) -> bool {
        self.requests.dispatch_error(request_id, error.into())
    }

    /// Delivers an inbound client event to its subscribers.
    pub fn on_event(&self, event_id: u32, data: u32) -> bool {
        self.events.dispatch_event(event_id, data)
    }

    /// Tears down connection state: pending requests and data streams fail
    /// with [`HostError::Disconnected`], definitions are forgotten, event
    /// streams complete, and host-side event registrations are dropped.
    ///
    /// Events and groups stay usable; the next send registers them again.
    pub fn disconnect(&self) {
        let failed = self
            .requests
            .fail_all(RequestError::Host(HostError::Disconnected));
        self.streams.lock().clear();
        self.definitions.reset();
        self.events.close_streams();
        self.events.forget_host_state();
        info!("session {} disconnected ({failed} requests failed)", self.id);
    }

    fn open_stream<T, C>(
        &self,
        definition_id: u32,
        object_id: u32,
        period: ObjectDataPeriod,
        only_when_changed: bool,
        convert: C,
    ) -> Result<Arc<MessageStream<T>>, RequestError>
    where
        T: Clone + Send + Sync + 'static,
        C: Fn(u32, HostReply) -> Result<T, RequestError> + Send + Sync + 'static,
    {
        if period == ObjectDataPeriod::Never {
            return Err(RequestError::InvalidPeriod(period));
        }
        let once = period == ObjectDataPeriod::Once;
        let flags = DataRequestFlags::only_when_changed(only_when_changed);
        let channel = Arc::clone(&self.channel);
        let stream = self.requests.issue_stream(
            "RequestDataOnSimObject",
            |request_id| {
                channel.request_data_on_sim_object(request_id, definition_id, object_id, period, flags)
            },
            convert,
            move |_| once,
        )?;
        if let (false, Some(request_id)) = (once, stream.request_id()) {
            self.streams.lock().insert(request_id, (definition_id, object_id));
        }
        Ok(stream)
    }

    fn arm_timeout<T>(&self, result: &MessageResult<T>) {
        let (Some(timeout), Some(request_id)) = (self.config.request_timeout(), result.request_id())
        else {
            return;
        };
        if result.is_completed() {
            return;
        }
        if self.requests.expire_after(request_id, timeout).is_none() {
            warn!("request {request_id} will wait without a timeout");
        }
    }
}

impl std::fmt::Debug for SimSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimSession")
            .field("id", &self.id)
            .field("app_name", &self.config.app_name)
            .field("definitions", &self.definitions)
            .field("events", &self.events)
            .field("requests", &self.requests)
            .finish()
    }
}

/// Entries are numbered from 1; an empty result reports entry 0 of 0.
fn is_last_entry(reply: &HostReply) -> bool {
    match reply {
        HostReply::ObjectData(ObjectData { entry_number, out_of, .. }) => entry_number >= out_of,
        _ => true,
    }
}

fn unexpected(request_id: u32, expected: &'static str, reply: &HostReply) -> RequestError {
    RequestError::UnexpectedReply {
        request_id,
        expected,
        actual: reply.kind(),
    }
}
