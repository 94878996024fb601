//! Data definitions: field descriptors, conversion rules, the schema compiler,
//! and the registry that publishes definitions to the host.

pub mod conversion;
pub mod field;
pub mod record;
pub mod registry;
pub mod schema;

use thiserror::Error;

use crate::channel::HostError;
use crate::protocol::IdError;

pub use conversion::{check_conversion, Conversion, ConversionError, NativeType};
pub use field::{Direction, FieldDescriptor, MetaKind, Usage};
pub use record::{DataRecord, DynamicDefinition};
pub use registry::DefinitionRegistry;
pub use schema::{DataShape, FieldValue, ObjectDefinition, SchemaBuilder, SchemaError, WireEnum};

/// Errors raised while building, publishing, or applying a definition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("unknown data definition {0}")]
    UnknownDefinition(u32),

    /// The definition is already published; its layout can no longer change.
    #[error("data definition {0} is already published")]
    Sealed(u32),

    #[error("{definition}: reply carries {actual} values but the definition has {expected} fields")]
    FieldCount {
        definition: String,
        expected: usize,
        actual: usize,
    },

    #[error("{definition}: host rejected the definition: {source}")]
    Host {
        definition: String,
        #[source]
        source: HostError,
    },

    #[error(transparent)]
    Ids(#[from] IdError),
}
