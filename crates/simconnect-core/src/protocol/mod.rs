//! Protocol vocabulary shared by every other module: identifiers, wire data
//! types, and decoded values.

pub mod data_type;
pub mod ids;
pub mod values;

pub use data_type::DataType;
pub use ids::{IdAllocator, IdError};
pub use values::{
    DataRequestFlags, HostReply, LatLonAlt, ObjectData, ObjectDataPeriod, ObjectType, Pbh,
    SystemEvent, SystemState, SystemStateKind, Value, MAX_RADIUS_METERS, SIM_OBJECT_USER,
};
