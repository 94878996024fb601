//! # simconnect-core
//!
//! Client-side protocol runtime for SimConnect-style simulation hosts: typed
//! data definitions, client events and notification groups, and correlation
//! of asynchronous requests with their replies.
//!
//! The crate never opens a socket or loads a host SDK itself.  Every outbound
//! call goes through the [`HostChannel`] trait, and inbound replies are handed
//! back through [`SimSession`].
//!
//! # Architecture overview (for beginners)
//!
//! A simulation host talks in numbers: data definitions, client events,
//! notification groups, and requests are all identified by `u32` IDs that the
//! client chooses.  This crate hides that bookkeeping behind typed Rust values.
//!
//! - **`protocol`** – The shared vocabulary: ID allocators, wire data types,
//!   and decoded values.
//!
//! - **`definition`** – Turns a Rust struct into a host data definition.  A
//!   type implements [`DataShape`] to list its fields; the registry validates
//!   the conversions, publishes the layout once, and copies received values
//!   back into a fresh struct.
//!
//! - **`events`** – Client events mapped onto host event names, organised in
//!   prioritised notification groups.
//!
//! - **`reactive`** – [`MessageResult`] (one reply) and [`MessageStream`]
//!   (many notifications), the observers replies are delivered to.
//!
//! - **`request`** – Matches reply IDs to pending results and expires the ones
//!   that are never answered.
//!
//! - **`session`** – Ties all of the above to one host connection.

// Rust looks for each module in a file or directory with the same name
// (e.g., src/definition/mod.rs).
pub mod channel;
pub mod config;
pub mod definition;
pub mod events;
pub mod protocol;
pub mod reactive;
pub mod request;
pub mod session;
pub mod telemetry;

// Re-export the most-used types at the crate root so callers can write
// `simconnect_core::SimSession` instead of `simconnect_core::session::SimSession`.
pub use channel::{HostChannel, HostError};
pub use config::{load_config, save_config, ConfigError, SessionConfig, Simulator, SimulatorKind};
pub use definition::{
    DataRecord, DataShape, DefinitionError, Direction, DynamicDefinition, FieldDescriptor,
    MetaKind, ObjectDefinition, SchemaBuilder, Usage,
};
pub use events::{ClientEvent, EventData, EventError, EventGroup, EventManager, Priority};
pub use protocol::{
    DataRequestFlags, DataType, HostReply, ObjectData, ObjectDataPeriod, ObjectType, SystemEvent,
    SystemState, SystemStateKind, Value,
};
pub use reactive::{MessageObserver, MessageResult, MessageStream, RequestError, StreamEvent};
pub use request::RequestManager;
pub use session::SimSession;
