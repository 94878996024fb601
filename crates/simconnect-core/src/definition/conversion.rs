//! Wire-type to native-type conversion rules.
//!
//! [`check_conversion`] answers one question: can a value of a given wire
//! [`DataType`] be stored in a native member of a given [`NativeType`]?  The
//! answer is a pure function of the two inputs and is defined for every
//! combination.

use std::fmt;

use thiserror::Error;

use crate::protocol::DataType;

/// Native member types a field can be bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeType {
    Bool,
    I32,
    I64,
    U32,
    F32,
    F64,
    String,
    /// A type implementing [`WireEnum`](crate::definition::schema::WireEnum).
    Enum,
    LatLonAlt,
    Pbh,
}

impl NativeType {
    pub const ALL: [NativeType; 10] = [
        NativeType::Bool,
        NativeType::I32,
        NativeType::I64,
        NativeType::U32,
        NativeType::F32,
        NativeType::F64,
        NativeType::String,
        NativeType::Enum,
        NativeType::LatLonAlt,
        NativeType::Pbh,
    ];
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NativeType::Bool => "bool",
            NativeType::I32 => "i32",
            NativeType::I64 => "i64",
            NativeType::U32 => "u32",
            NativeType::F32 => "f32",
            NativeType::F64 => "f64",
            NativeType::String => "String",
            NativeType::Enum => "enum",
            NativeType::LatLonAlt => "LatLonAlt",
            NativeType::Pbh => "Pbh",
        };
        f.write_str(name)
    }
}

/// How faithful an allowed conversion is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    Exact,
    /// Allowed, but the value is truncated (a float read into a flag or enum).
    Lossy,
}

/// Why a conversion is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disallowed {
    NoConversion,
    DataTypeNotImplemented,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Allowed(ConversionKind),
    Disallowed(Disallowed),
}

impl Conversion {
    pub fn is_allowed(self) -> bool {
        matches!(self, Conversion::Allowed(_))
    }
}

/// Errors raised while validating or applying a definition's conversions.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConversionError {
    #[error("{definition}: no conversion from {data_type} to {native}")]
    NoConversion {
        definition: String,
        data_type: DataType,
        native: NativeType,
    },

    #[error("{definition}: data type {data_type} is not implemented")]
    DataTypeNotImplemented {
        definition: String,
        data_type: DataType,
    },

    #[error("{definition}: member '{member}' ({data_type}) cannot be used in this direction")]
    UnsupportedMember {
        definition: String,
        data_type: DataType,
        member: String,
    },

    #[error("{definition}: value for member '{member}' does not fit {expected}")]
    ValueMismatch {
        definition: String,
        member: String,
        expected: DataType,
    },
}

impl ConversionError {
    /// Turns a refused [`Conversion`] into an error for `definition`.
    pub fn refused(
        reason: Disallowed,
        definition: &str,
        data_type: DataType,
        native: NativeType,
    ) -> Self {
        match reason {
            Disallowed::NoConversion => ConversionError::NoConversion {
                definition: definition.to_string(),
                data_type,
                native,
            },
            Disallowed::DataTypeNotImplemented => ConversionError::DataTypeNotImplemented {
                definition: definition.to_string(),
                data_type,
            },
        }
    }
}

/// Decides whether `data_type` can be stored in a member of type `native`.
pub fn check_conversion(data_type: DataType, native: NativeType) -> Conversion {
    use ConversionKind::{Exact, Lossy};
    use DataType as D;
    use NativeType as N;

    match data_type {
        D::InitPosition
        | D::MarkerState
        | D::Waypoint
        | D::Xyz
        | D::Observer
        | D::VideoStreamInfo => return Conversion::Disallowed(Disallowed::DataTypeNotImplemented),
        _ => {}
    }

    let allowed = match (native, data_type) {
        (N::Bool | N::Enum, D::Int32 | D::Int64) => Some(Exact),
        (N::Bool | N::Enum, D::Float32 | D::Float64) => Some(Lossy),
        (N::I32 | N::U32, D::Int32) => Some(Exact),
        (N::I64, D::Int64) => Some(Exact),
        (N::F32, D::Float32) => Some(Exact),
        (N::F64, D::Float64) => Some(Exact),
        (N::String, t) if t.is_string() => Some(Exact),
        (N::LatLonAlt, D::LatLonAlt) => Some(Exact),
        (N::Pbh, D::Pbh) => Some(Exact),
        _ => None,
    };

    match allowed {
        Some(kind) => Conversion::Allowed(kind),
        None => Conversion::Disallowed(Disallowed::NoConversion),
    }
}

/// Meta members carry a `u32` header value; only `u32` and enum members can
/// hold one.
pub fn check_meta_conversion(native: NativeType) -> Conversion {
    match native {
        NativeType::U32 | NativeType::Enum => check_conversion(DataType::Int32, native),
        _ => Conversion::Disallowed(Disallowed::NoConversion),
    }
}
