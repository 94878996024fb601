//! The host channel contract.
//!
//! [`HostChannel`] is the seam between this crate and the host SDK.  Each
//! method corresponds to one outbound host call; a `Ok(())` return means the
//! call was accepted for transmission, not that the host has acted on it.
//! Host-side failures that arrive later are routed back through
//! [`crate::request::RequestManager`].

pub mod mock;

use thiserror::Error;

use crate::definition::field::FieldDescriptor;
use crate::events::Priority;
use crate::protocol::{DataRequestFlags, ObjectDataPeriod, ObjectType, Value};

/// Errors reported by the host or by the host channel itself.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    /// The host SDK refused an outbound call.
    #[error("call to {api} failed (HRESULT=0x{code:08X})")]
    CallFailed { api: &'static str, code: u32 },

    /// The host replied with an exception for a previously sent packet.
    #[error("host exception {exception} for send id {send_id} (parameter {index})")]
    Exception {
        exception: u32,
        send_id: u32,
        index: u32,
    },

    /// The connection to the host is gone.
    #[error("not connected to the host")]
    Disconnected,
}

/// Outbound calls to the simulation host.
#[cfg_attr(test, mockall::automock)]
pub trait HostChannel: Send + Sync {
    /// Appends one field to a data definition's layout on the host.
    fn add_to_data_definition(
        &self,
        definition_id: u32,
        field: &FieldDescriptor,
        tag: u32,
    ) -> Result<(), HostError>;

    /// Drops every field of a data definition on the host.
    fn clear_data_definition(&self, definition_id: u32) -> Result<(), HostError>;

    /// Asks the host for data on one simulation object.
    ///
    /// `ObjectDataPeriod::Never` with the ID of a running request stops it.
    fn request_data_on_sim_object(
        &self,
        request_id: u32,
        definition_id: u32,
        object_id: u32,
        period: ObjectDataPeriod,
        flags: DataRequestFlags,
    ) -> Result<(), HostError>;

    /// Asks the host for data on every object of `object_type` within
    /// `radius_meters` of the user; one reply arrives per object.
    fn request_data_on_sim_object_type(
        &self,
        request_id: u32,
        definition_id: u32,
        radius_meters: u32,
        object_type: ObjectType,
    ) -> Result<(), HostError>;

    /// Writes values, in layout order, to one simulation object.
    fn set_data_on_sim_object(
        &self,
        definition_id: u32,
        object_id: u32,
        values: &[Value],
    ) -> Result<(), HostError>;

    /// Asks the host for a named system state.
    fn request_system_state(&self, request_id: u32, state: &str) -> Result<(), HostError>;

    /// Subscribes a client event ID to a named system event.
    fn subscribe_to_system_event(&self, event_id: u32, event_name: &str) -> Result<(), HostError>;

    /// Ends a system event subscription.
    fn unsubscribe_from_system_event(&self, event_id: u32) -> Result<(), HostError>;

    /// Binds a client event ID to a host event name.
    fn map_client_event_to_sim_event(&self, event_id: u32, event_name: &str)
        -> Result<(), HostError>;

    /// Adds a client event to a notification group.
    fn add_client_event_to_notification_group(
        &self,
        group_id: u32,
        event_id: u32,
        maskable: bool,
    ) -> Result<(), HostError>;

    /// Removes a client event from a notification group.
    fn remove_client_event(&self, group_id: u32, event_id: u32) -> Result<(), HostError>;

    /// Sets the dispatch priority of a notification group.
    fn set_notification_group_priority(
        &self,
        group_id: u32,
        priority: Priority,
    ) -> Result<(), HostError>;

    /// Removes every event from a notification group.
    fn clear_notification_group(&self, group_id: u32) -> Result<(), HostError>;

    /// Transmits a client event to an object.
    fn transmit_client_event(
        &self,
        object_id: u32,
        event_id: u32,
        data: u32,
        group_id: u32,
    ) -> Result<(), HostError>;
}
