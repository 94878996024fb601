//! Recording host channel for tests.
//!
//! # Why a recording channel?
//!
//! A real [`HostChannel`] talks to a running simulator.  Tests instead need to
//! see exactly which calls were made and in which order, because the order of
//! add-to-definition calls *is* the wire layout.  [`RecordingChannel`] pushes
//! every call into a `Mutex<Vec<HostCall>>` so assertions can inspect it.
//!
//! # Failure injection
//!
//! Set `should_fail = true` to make every call fail, or `fail_on =
//! Some("TransmitClientEvent")` to fail a single API, before wrapping the
//! channel in an `Arc`.

use parking_lot::Mutex;

use crate::channel::{HostChannel, HostError};
use crate::definition::field::FieldDescriptor;
use crate::events::Priority;
use crate::protocol::{DataRequestFlags, ObjectDataPeriod, ObjectType, Value};

/// One recorded outbound call.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    AddToDataDefinition {
        definition_id: u32,
        field: FieldDescriptor,
        tag: u32,
    },
    ClearDataDefinition {
        definition_id: u32,
    },
    RequestDataOnSimObject {
        request_id: u32,
        definition_id: u32,
        object_id: u32,
        period: ObjectDataPeriod,
        flags: DataRequestFlags,
    },
    RequestDataOnSimObjectType {
        request_id: u32,
        definition_id: u32,
        radius_meters: u32,
        object_type: ObjectType,
    },
    SetDataOnSimObject {
        definition_id: u32,
        object_id: u32,
        values: Vec<Value>,
    },
    RequestSystemState {
        request_id: u32,
        state: String,
    },
    SubscribeToSystemEvent {
        event_id: u32,
        event_name: String,
    },
    UnsubscribeFromSystemEvent {
        event_id: u32,
    },
    MapClientEventToSimEvent {
        event_id: u32,
        event_name: String,
    },
    AddClientEventToNotificationGroup {
        group_id: u32,
        event_id: u32,
        maskable: bool,
    },
    RemoveClientEvent {
        group_id: u32,
        event_id: u32,
    },
    SetNotificationGroupPriority {
        group_id: u32,
        priority: Priority,
    },
    ClearNotificationGroup {
        group_id: u32,
    },
    TransmitClientEvent {
        object_id: u32,
        event_id: u32,
        data: u32,
        group_id: u32,
    },
}

/// A host channel that records calls instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    /// Every call, in the order it was made.
    pub calls: Mutex<Vec<HostCall>>,
    /// When `true`, every call returns [`HostError::CallFailed`].
    pub should_fail: bool,
    /// When set, only the named API fails.
    pub fail_on: Option<&'static str>,
}

impl RecordingChannel {
    /// Creates a channel with no recorded calls that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel that fails every call.
    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Creates a channel that fails only `api`.
    pub fn failing_on(api: &'static str) -> Self {
        Self {
            fail_on: Some(api),
            ..Self::default()
        }
    }

    /// Returns a snapshot of the recorded calls.
    pub fn recorded(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    /// Returns the field names sent for `definition_id`, in call order.
    pub fn definition_layout(&self, definition_id: u32) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                HostCall::AddToDataDefinition {
                    definition_id: id,
                    field,
                    ..
                } if *id == definition_id => Some(field.name.clone()),
                _ => None,
            })
            .collect()
    }

    /// Drops all recorded calls.
    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, api: &'static str, call: HostCall) -> Result<(), HostError> {
        if self.should_fail || self.fail_on == Some(api) {
            return Err(HostError::CallFailed {
                api,
                code: 0x8000_4005,
            });
        }
        self.calls.lock().push(call);
        Ok(())
    }
}

impl HostChannel for RecordingChannel {
    fn add_to_data_definition(
        &self,
        definition_id: u32,
        field: &FieldDescriptor,
        tag: u32,
    ) -> Result<(), HostError> {
        self.record(
            "AddToDataDefinition",
            HostCall::AddToDataDefinition {
                definition_id,
                field: field.clone(),
                tag,
            },
        )
    }

    fn clear_data_definition(&self, definition_id: u32) -> Result<(), HostError> {
        self.record(
            "ClearDataDefinition",
            HostCall::ClearDataDefinition { definition_id },
        )
    }

    fn request_data_on_sim_object(
        &self,
        request_id: u32,
        definition_id: u32,
        object_id: u32,
        period: ObjectDataPeriod,
        flags: DataRequestFlags,
    ) -> Result<(), HostError> {
        self.record(
            "RequestDataOnSimObject",
            HostCall::RequestDataOnSimObject {
                request_id,
                definition_id,
                object_id,
                period,
                flags,
            },
        )
    }

    fn request_data_on_sim_object_type(
        &self,
        request_id: u32,
        definition_id: u32,
        radius_meters: u32,
        object_type: ObjectType,
    ) -> Result<(), HostError> {
        self.record(
            "RequestDataOnSimObjectType",
            HostCall::RequestDataOnSimObjectType {
                request_id,
                definition_id,
                radius_meters,
                object_type,
            },
        )
    }

    fn set_data_on_sim_object(
        &self,
        definition_id: u32,
        object_id: u32,
        values: &[Value],
    ) -> Result<(), HostError> {
        self.record(
            "SetDataOnSimObject",
            HostCall::SetDataOnSimObject {
                definition_id,
                object_id,
                values: values.to_vec(),
            },
        )
    }

    fn request_system_state(&self, request_id: u32, state: &str) -> Result<(), HostError> {
        self.record(
            "RequestSystemState",
            HostCall::RequestSystemState {
                request_id,
                state: state.to_string(),
            },
        )
    }

    fn subscribe_to_system_event(&self, event_id: u32, event_name: &str) -> Result<(), HostError> {
        self.record(
            "SubscribeToSystemEvent",
            HostCall::SubscribeToSystemEvent {
                event_id,
                event_name: event_name.to_string(),
            },
        )
    }

    fn unsubscribe_from_system_event(&self, event_id: u32) -> Result<(), HostError> {
        self.record(
            "UnsubscribeFromSystemEvent",
            HostCall::UnsubscribeFromSystemEvent { event_id },
        )
    }

    fn map_client_event_to_sim_event(
        &self,
        event_id: u32,
        event_name: &str,
    ) -> Result<(), HostError> {
        self.record(
            "MapClientEventToSimEvent",
            HostCall::MapClientEventToSimEvent {
                event_id,
                event_name: event_name.to_string(),
            },
        )
    }

    fn add_client_event_to_notification_group(
        &self,
        group_id: u32,
        event_id: u32,
        maskable: bool,
    ) -> Result<(), HostError> {
        self.record(
            "AddClientEventToNotificationGroup",
            HostCall::AddClientEventToNotificationGroup {
                group_id,
                event_id,
                maskable,
            },
        )
    }

    fn remove_client_event(&self, group_id: u32, event_id: u32) -> Result<(), HostError> {
        self.record(
            "RemoveClientEvent",
            HostCall::RemoveClientEvent { group_id, event_id },
        )
    }

    fn set_notification_group_priority(
        &self,
        group_id: u32,
        priority: Priority,
    ) -> Result<(), HostError> {
        self.record(
            "SetNotificationGroupPriority",
            HostCall::SetNotificationGroupPriority { group_id, priority },
        )
    }

    fn clear_notification_group(&self, group_id: u32) -> Result<(), HostError> {
        self.record(
            "ClearNotificationGroup",
            HostCall::ClearNotificationGroup { group_id },
        )
    }

    fn transmit_client_event(
        &self,
        object_id: u32,
        event_id: u32,
        data: u32,
        group_id: u32,
    ) -> Result<(), HostError> {
        self.record(
            "TransmitClientEvent",
            HostCall::TransmitClientEvent {
                object_id,
                event_id,
                data,
                group_id,
            },
        )
    }
}
