//! Wire data types understood by the host.
//!
//! The numeric codes match the host SDK's `SIMCONNECT_DATATYPE` enumeration;
//! code 0 (`INVALID`) is not representable and is rejected by `TryFrom<u32>`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A wire data type, as sent in an add-to-data-definition call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum DataType {
    Int32 = 1,
    Int64 = 2,
    Float32 = 3,
    Float64 = 4,
    String8 = 5,
    String32 = 6,
    String64 = 7,
    String128 = 8,
    String256 = 9,
    String260 = 10,
    StringV = 11,
    InitPosition = 12,
    MarkerState = 13,
    Waypoint = 14,
    LatLonAlt = 15,
    Xyz = 16,
    Pbh = 17,
    Observer = 18,
    VideoStreamInfo = 19,
    WString8 = 20,
    WString32 = 21,
    WString64 = 22,
    WString128 = 23,
    WString256 = 24,
    WString260 = 25,
    WStringV = 26,
}

impl DataType {
    /// Every wire data type, in code order.
    pub const ALL: [DataType; 26] = [
        DataType::Int32,
        DataType::Int64,
        DataType::Float32,
        DataType::Float64,
        DataType::String8,
        DataType::String32,
        DataType::String64,
        DataType::String128,
        DataType::String256,
        DataType::String260,
        DataType::StringV,
        DataType::InitPosition,
        DataType::MarkerState,
        DataType::Waypoint,
        DataType::LatLonAlt,
        DataType::Xyz,
        DataType::Pbh,
        DataType::Observer,
        DataType::VideoStreamInfo,
        DataType::WString8,
        DataType::WString32,
        DataType::WString64,
        DataType::WString128,
        DataType::WString256,
        DataType::WString260,
        DataType::WStringV,
    ];

    /// Size of one value on the wire in bytes; 0 for variable-length strings.
    pub fn size(self) -> u32 {
        match self {
            DataType::Int32 => 4,
            DataType::Int64 => 8,
            DataType::Float32 => 4,
            DataType::Float64 => 8,
            DataType::String8 => 8,
            DataType::String32 => 32,
            DataType::String64 => 64,
            DataType::String128 => 128,
            DataType::String256 => 256,
            DataType::String260 => 260,
            DataType::StringV => 0,
            DataType::InitPosition => 56,
            DataType::MarkerState => 68,
            DataType::Waypoint => 44,
            DataType::LatLonAlt => 24,
            DataType::Xyz => 24,
            DataType::Pbh => 24,
            // 32 bytes of camera data plus a LatLonAlt and a PBH.
            DataType::Observer => 80,
            DataType::VideoStreamInfo => 120,
            DataType::WString8 => 16,
            DataType::WString32 => 64,
            DataType::WString64 => 128,
            DataType::WString128 => 256,
            DataType::WString256 => 512,
            DataType::WString260 => 520,
            DataType::WStringV => 0,
        }
    }

    /// `true` for all narrow and wide string types, fixed or variable.
    pub fn is_string(self) -> bool {
        matches!(
            self,
            DataType::String8
                | DataType::String32
                | DataType::String64
                | DataType::String128
                | DataType::String256
                | DataType::String260
                | DataType::StringV
                | DataType::WString8
                | DataType::WString32
                | DataType::WString64
                | DataType::WString128
                | DataType::WString256
                | DataType::WString260
                | DataType::WStringV
        )
    }

    /// `true` for the UTF-16 string types.
    pub fn is_wide_string(self) -> bool {
        matches!(
            self,
            DataType::WString8
                | DataType::WString32
                | DataType::WString64
                | DataType::WString128
                | DataType::WString256
                | DataType::WString260
                | DataType::WStringV
        )
    }

    /// `true` for the variable-length string types.
    pub fn is_variable_length(self) -> bool {
        matches!(self, DataType::StringV | DataType::WStringV)
    }

    /// `true` for the four scalar numeric types.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Int32 | DataType::Int64 | DataType::Float32 | DataType::Float64
        )
    }
}

impl TryFrom<u32> for DataType {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        DataType::ALL
            .iter()
            .copied()
            .find(|t| *t as u32 == value)
            .ok_or(value)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Float32 => "Float32",
            DataType::Float64 => "Float64",
            DataType::String8 => "String8",
            DataType::String32 => "String32",
            DataType::String64 => "String64",
            DataType::String128 => "String128",
            DataType::String256 => "String256",
            DataType::String260 => "String260",
            DataType::StringV => "StringV",
            DataType::InitPosition => "InitPosition",
            DataType::MarkerState => "MarkerState",
            DataType::Waypoint => "Waypoint",
            DataType::LatLonAlt => "LatLonAlt",
            DataType::Xyz => "XYZ",
            DataType::Pbh => "PBH",
            DataType::Observer => "Observer",
            DataType::VideoStreamInfo => "VideoStreamInfo",
            DataType::WString8 => "WString8",
            DataType::WString32 => "WString32",
            DataType::WString64 => "WString64",
            DataType::WString128 => "WString128",
            DataType::WString256 => "WString256",
            DataType::WString260 => "WString260",
            DataType::WStringV => "WStringV",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_round_trip_through_try_from() {
        for t in DataType::ALL {
            assert_eq!(DataType::try_from(t as u32), Ok(t));
        }
    }

    #[test]
    fn test_invalid_and_max_codes_are_rejected() {
        assert_eq!(DataType::try_from(0), Err(0));
        assert_eq!(DataType::try_from(27), Err(27));
    }

    #[test]
    fn test_fixed_string_sizes_match_their_names() {
        assert_eq!(DataType::String8.size(), 8);
        assert_eq!(DataType::String256.size(), 256);
        assert_eq!(DataType::WString256.size(), 512);
        assert_eq!(DataType::StringV.size(), 0);
    }

    #[test]
    fn test_string_classification() {
        assert!(DataType::String260.is_string());
        assert!(DataType::WStringV.is_string());
        assert!(DataType::WStringV.is_variable_length());
        assert!(DataType::WString8.is_wide_string());
        assert!(!DataType::String8.is_wide_string());
        assert!(!DataType::Float64.is_string());
        assert!(DataType::Float64.is_numeric());
        assert!(!DataType::LatLonAlt.is_numeric());
    }

    #[test]
    fn test_display_uses_sdk_names() {
        assert_eq!(DataType::Pbh.to_string(), "PBH");
        assert_eq!(DataType::Int32.to_string(), "Int32");
    }
}
