//! Decoded wire values and host reply payloads.
//!
//! Byte-level encoding belongs to the host SDK; this module only models the
//! values after decoding (inbound) or before encoding (outbound).

use serde::{Deserialize, Serialize};

use crate::protocol::data_type::DataType;

/// Latitude / longitude in degrees, altitude in feet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LatLonAlt {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Pitch, bank, and heading in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pbh {
    pub pitch: f64,
    pub bank: f64,
    pub heading: f64,
}

/// One decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    /// Any narrow or wide string type, fixed or variable length.
    String(String),
    LatLonAlt(LatLonAlt),
    Pbh(Pbh),
}

impl Value {
    /// Returns `true` if this value can travel as `data_type`.
    pub fn fits(&self, data_type: DataType) -> bool {
        match self {
            Value::Int32(_) => data_type == DataType::Int32,
            Value::Int64(_) => data_type == DataType::Int64,
            Value::Float32(_) => data_type == DataType::Float32,
            Value::Float64(_) => data_type == DataType::Float64,
            Value::String(_) => data_type.is_string(),
            Value::LatLonAlt(_) => data_type == DataType::LatLonAlt,
            Value::Pbh(_) => data_type == DataType::Pbh,
        }
    }

    /// Integer view of a numeric value; floats are truncated.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(v) => Some(i64::from(*v)),
            Value::Int64(v) => Some(*v),
            Value::Float32(v) => Some(*v as i64),
            Value::Float64(v) => Some(*v as i64),
            _ => None,
        }
    }

    /// Floating-point view of a numeric value.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int32(v) => Some(f64::from(*v)),
            Value::Int64(v) => Some(*v as f64),
            Value::Float32(v) => Some(f64::from(*v)),
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    /// String view of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

/// An object data reply, as decoded from the host's `RECV_SIMOBJECT_DATA`.
///
/// `values` holds one entry per wire field of the definition, in layout order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ObjectData {
    pub request_id: u32,
    pub object_id: u32,
    pub define_id: u32,
    pub flags: u32,
    pub entry_number: u32,
    pub out_of: u32,
    pub values: Vec<Value>,
}

/// How often the host should send object data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u32)]
pub enum ObjectDataPeriod {
    Never = 0,
    Once = 1,
    PerVisualFrame = 2,
    PerSimFrame = 3,
    PerSecond = 4,
}

/// Object ID the host uses for the user's own aircraft.
pub const SIM_OBJECT_USER: u32 = 0;

/// Options for a data request, sent as a bit set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DataRequestFlags(pub u32);

impl DataRequestFlags {
    pub const NONE: DataRequestFlags = DataRequestFlags(0);
    /// Only send data when a field changed by more than its epsilon.
    pub const CHANGED: DataRequestFlags = DataRequestFlags(0x0000_0001);
    pub const TAGGED: DataRequestFlags = DataRequestFlags(0x0000_0002);

    pub fn only_when_changed(only: bool) -> Self {
        if only {
            Self::CHANGED
        } else {
            Self::NONE
        }
    }

    pub fn contains(self, other: DataRequestFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

/// Largest radius, in meters, the host accepts for an object-type request.
pub const MAX_RADIUS_METERS: u32 = 200_000;

/// Kinds of simulation objects a request can target by type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum ObjectType {
    User = 0,
    All = 1,
    Aircraft = 2,
    Helicopter = 3,
    Boat = 4,
    GroundVehicle = 5,
    Weapon = 6,
    Countermeasure = 7,
    Animal = 8,
    Avatar = 9,
    Blimp = 10,
    ControlTower = 11,
    ExternalSim = 12,
    SimpleObject = 13,
    Submersible = 14,
    Viewer = 15,
}

/// Host notifications a client can subscribe to by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemEvent {
    Sim,
    SimStart,
    SimStop,
    Pause,
    Paused,
    Unpaused,
    Crashed,
    CrashReset,
    Each1Sec,
    Each4Sec,
    Freq6Hz,
    Frame,
    PauseFrame,
    PositionChanged,
    FlightLoaded,
    FlightSaved,
    FlightPlanLoaded,
    FlightPlanDeactivated,
    AircraftLoaded,
    Sound,
    View,
    TextEventCreated,
    TextEventDestroyed,
    PlaybackStateChanged,
    RecorderStateChanged,
    WeatherModeChanged,
    ObjectAdded,
    ObjectRemoved,
    RaceEnd,
    RaceLap,
    MissionCompleted,
    CustomMissionActionExecuted,
    FlightSegmentReadyForGrading,
    WeaponFired,
    WeaponDetonated,
    CountermeasureFired,
    ObjectDamagedByWeapon,
    MultiplayerClientStarted,
    MultiplayerServerStarted,
    MultiplayerSessionEnded,
}

impl SystemEvent {
    /// The event name the host expects on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            SystemEvent::Sim => "Sim",
            SystemEvent::SimStart => "SimStart",
            SystemEvent::SimStop => "SimStop",
            SystemEvent::Pause => "Pause",
            SystemEvent::Paused => "Paused",
            SystemEvent::Unpaused => "Unpaused",
            SystemEvent::Crashed => "Crashed",
            SystemEvent::CrashReset => "CrashReset",
            SystemEvent::Each1Sec => "1Sec",
            SystemEvent::Each4Sec => "4Sec",
            SystemEvent::Freq6Hz => "6Hz",
            SystemEvent::Frame => "Frame",
            SystemEvent::PauseFrame => "PauseFrame",
            SystemEvent::PositionChanged => "PositionChanged",
            SystemEvent::FlightLoaded => "FlightLoaded",
            SystemEvent::FlightSaved => "FlightSaved",
            SystemEvent::FlightPlanLoaded => "FlightPlanLoaded",
            SystemEvent::FlightPlanDeactivated => "FlightPlanDeactivated",
            SystemEvent::AircraftLoaded => "AircraftLoaded",
            SystemEvent::Sound => "Sound",
            SystemEvent::View => "View",
            SystemEvent::TextEventCreated => "TextEventCreated",
            SystemEvent::TextEventDestroyed => "TextEventDestroyed",
            SystemEvent::PlaybackStateChanged => "PlaybackStateChanged",
            SystemEvent::RecorderStateChanged => "RecorderStateChanged",
            SystemEvent::WeatherModeChanged => "WeatherModeChanged",
            SystemEvent::ObjectAdded => "ObjectAdded",
            SystemEvent::ObjectRemoved => "ObjectRemoved",
            SystemEvent::RaceEnd => "RaceEnd",
            SystemEvent::RaceLap => "RaceLap",
            SystemEvent::MissionCompleted => "MissionCompleted",
            SystemEvent::CustomMissionActionExecuted => "CustomMissionActionExecuted",
            SystemEvent::FlightSegmentReadyForGrading => "FlightSegmentReadyForGrading",
            SystemEvent::WeaponFired => "WeaponFired",
            SystemEvent::WeaponDetonated => "WeaponDetonated",
            SystemEvent::CountermeasureFired => "CountermeasureFired",
            SystemEvent::ObjectDamagedByWeapon => "ObjectDamagedByWeapon",
            SystemEvent::MultiplayerClientStarted => "MultiplayerClientStarted",
            SystemEvent::MultiplayerServerStarted => "MultiplayerServerStarted",
            SystemEvent::MultiplayerSessionEnded => "MultiplayerSessionEnded",
        }
    }
}

/// System states that can be queried with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemStateKind {
    AircraftLoaded,
    DialogMode,
    FlightLoaded,
    FlightPlan,
    FullScreenMode,
    Sim,
}

impl SystemStateKind {
    /// The state name the host expects on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            SystemStateKind::AircraftLoaded => "AircraftLoaded",
            SystemStateKind::DialogMode => "DialogMode",
            SystemStateKind::FlightLoaded => "FlightLoaded",
            SystemStateKind::FlightPlan => "FlightPlan",
            SystemStateKind::FullScreenMode => "FullScreenMode",
            SystemStateKind::Sim => "Sim",
        }
    }
}

/// A system state reply.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SystemState {
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: String,
}

impl SystemState {
    /// Boolean states (dialog mode, sim running) are reported in `int_value`.
    pub fn as_bool(&self) -> bool {
        self.int_value != 0
    }
}

/// A correlated reply routed to an outstanding request.
#[derive(Debug, Clone, PartialEq)]
pub enum HostReply {
    ObjectData(ObjectData),
    SystemState(SystemState),
    AssignedObjectId(u32),
}

impl HostReply {
    /// Short name of the reply kind, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            HostReply::ObjectData(_) => "ObjectData",
            HostReply::SystemState(_) => "SystemState",
            HostReply::AssignedObjectId(_) => "AssignedObjectId",
        }
    }
}
