//! Field descriptors and meta annotations.

use serde::{Deserialize, Serialize};

use crate::protocol::{DataType, ObjectData};

/// Units string the host uses for unit-less values (strings, structs).
pub const NO_UNITS: &str = "NULL";

/// Which directions a field takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Usage {
    /// Read and written.
    #[default]
    Always,
    /// Only read from the host.
    GetOnly,
    /// Only written to the host.
    SetOnly,
}

impl Usage {
    /// `true` if a field with this usage belongs in a definition used for
    /// setting (`for_set`) or getting data.
    pub fn can_be_used(self, for_set: bool) -> bool {
        match self {
            Usage::Always => true,
            Usage::GetOnly => !for_set,
            Usage::SetOnly => for_set,
        }
    }
}

/// Whether a definition reads data from the host or writes data to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Get,
    Set,
}

impl Direction {
    pub fn is_set(self) -> bool {
        self == Direction::Set
    }
}

/// One simulation variable in a data definition.
///
/// # Examples
///
/// ```rust
/// use simconnect_core::definition::field::FieldDescriptor;
/// use simconnect_core::protocol::DataType;
///
/// let title = FieldDescriptor::new("TITLE").data_type(DataType::String256);
/// assert_eq!(title.units, "NULL");
/// assert_eq!(title.wire_size(), 256);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Simulation variable name, e.g. `"PLANE ALTITUDE"`.
    pub name: String,
    pub units: String,
    pub data_type: DataType,
    /// Smallest change worth reporting.
    pub epsilon: f32,
    /// Explicit byte size; `None` means the size of `data_type`.
    pub size: Option<u32>,
    pub usage: Usage,
}

impl FieldDescriptor {
    /// Creates a `Float64` field with no units.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: NO_UNITS.to_string(),
            data_type: DataType::Float64,
            epsilon: 0.0,
            size: None,
            usage: Usage::Always,
        }
    }

    pub fn units(mut self, units: impl Into<String>) -> Self {
        self.units = units.into();
        self
    }

    pub fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn epsilon(mut self, epsilon: f32) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn usage(mut self, usage: Usage) -> Self {
        self.usage = usage;
        self
    }

    /// Byte size on the wire.
    pub fn wire_size(&self) -> u32 {
        self.size.unwrap_or_else(|| self.data_type.size())
    }
}

/// Reply header values that can be bound to a member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetaKind {
    RequestId,
    ObjectId,
    DefineId,
    DefinitionFlags,
    EntryNumber,
    /// Total number of entries in a multi-object reply.
    Count,
}

impl MetaKind {
    pub fn name(self) -> &'static str {
        match self {
            MetaKind::RequestId => "RequestId",
            MetaKind::ObjectId => "ObjectId",
            MetaKind::DefineId => "DefineId",
            MetaKind::DefinitionFlags => "DefinitionFlags",
            MetaKind::EntryNumber => "EntryNumber",
            MetaKind::Count => "Count",
        }
    }

    /// Reads this header value from a reply.
    pub fn extract(self, data: &ObjectData) -> u32 {
        match self {
            MetaKind::RequestId => data.request_id,
            MetaKind::ObjectId => data.object_id,
            MetaKind::DefineId => data.define_id,
            MetaKind::DefinitionFlags => data.flags,
            MetaKind::EntryNumber => data.entry_number,
            MetaKind::Count => data.out_of,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_host_conventions() {
        let field = FieldDescriptor::new("PLANE ALTITUDE");

        assert_eq!(field.units, NO_UNITS);
        assert_eq!(field.data_type, DataType::Float64);
        assert_eq!(field.epsilon, 0.0);
        assert_eq!(field.wire_size(), 8);
        assert_eq!(field.usage, Usage::Always);
    }

    #[test]
    fn test_explicit_size_overrides_table() {
        let field = FieldDescriptor::new("ATC ID")
            .data_type(DataType::StringV)
            .size(32);

        assert_eq!(field.wire_size(), 32);
    }

    #[test]
    fn test_usage_per_direction() {
        assert!(Usage::Always.can_be_used(true));
        assert!(Usage::Always.can_be_used(false));
        assert!(Usage::GetOnly.can_be_used(false));
        assert!(!Usage::GetOnly.can_be_used(true));
        assert!(Usage::SetOnly.can_be_used(true));
        assert!(!Usage::SetOnly.can_be_used(false));
    }

    #[test]
    fn test_meta_extracts_header_fields() {
        // Arrange
        let data = ObjectData {
            request_id: 1,
            object_id: 2,
            define_id: 3,
            flags: 4,
            entry_number: 5,
            out_of: 6,
            values: Vec::new(),
        };

        // Act
        let extracted: Vec<u32> = [
            MetaKind::RequestId,
            MetaKind::ObjectId,
            MetaKind::DefineId,
            MetaKind::DefinitionFlags,
            MetaKind::EntryNumber,
            MetaKind::Count,
        ]
        .iter()
        .map(|k| k.extract(&data))
        .collect();

        // Assert
        assert_eq!(extracted, vec![1, 2, 3, 4, 5, 6]);
    }
}
