//! Schema compiler: turns a declared data shape into an object definition.
//!
//! # How a data shape is declared (for beginners)
//!
//! The host exchanges object data as a flat list of values whose order is
//! fixed by the data definition.  A Rust struct has no such order at runtime,
//! so each shape lists its members explicitly in [`DataShape::describe`]:
//!
//! ```rust
//! use simconnect_core::definition::field::{FieldDescriptor, MetaKind};
//! use simconnect_core::definition::schema::{DataShape, SchemaBuilder};
//! use simconnect_core::protocol::DataType;
//!
//! #[derive(Debug, Default)]
//! struct Aircraft {
//!     object_id: u32,
//!     title: String,
//!     altitude: f64,
//! }
//!
//! impl DataShape for Aircraft {
//!     fn describe(schema: &mut SchemaBuilder<Self>) {
//!         schema
//!             .meta("object_id", MetaKind::ObjectId, |a| &mut a.object_id)
//!             .value(
//!                 "title",
//!                 FieldDescriptor::new("TITLE").data_type(DataType::String256),
//!                 |a| &a.title,
//!                 |a| &mut a.title,
//!             )
//!             .value(
//!                 "altitude",
//!                 FieldDescriptor::new("PLANE ALTITUDE").units("feet"),
//!                 |a| &a.altitude,
//!                 |a| &mut a.altitude,
//!             );
//!     }
//! }
//! ```
//!
//! Declaration order is wire order.  Struct members that are not declared are
//! simply not part of the definition.
//!
//! # Validation
//!
//! [`ObjectDefinition::compile`] checks every member before a definition ID
//! is allocated, so a rejected shape never consumes an ID:
//!
//! - field names must be non-empty and unique,
//! - an explicit size must agree with a fixed-size wire type,
//! - the wire type must convert to the member's native type,
//! - the member must have the accessor the direction needs (a setter to
//!   receive data, a getter to send it).

use std::any::type_name;
use std::collections::HashSet;

use thiserror::Error;
use tracing::{debug, warn};

use crate::definition::conversion::{
    check_conversion, check_meta_conversion, Conversion, ConversionError, ConversionKind,
    NativeType,
};
use crate::definition::field::{Direction, FieldDescriptor, MetaKind};
use crate::definition::DefinitionError;
use crate::protocol::{DataType, IdAllocator, LatLonAlt, ObjectData, Pbh, Value};

// ── Native value bindings ─────────────────────────────────────────────────────

/// A native type that can be bound to a definition field.
pub trait FieldValue: Sized + Send + Sync + 'static {
    /// Conversion-table entry for this type.
    const NATIVE: NativeType;

    /// Converts the member value for sending as `data_type`.
    fn to_value(&self, data_type: DataType) -> Option<Value>;

    /// Reads a received wire value into the native type.
    fn from_value(value: &Value) -> Option<Self>;
}

/// A field-less enum carried on the wire as an integer.
pub trait WireEnum: Copy + Send + Sync + 'static {
    fn to_wire(self) -> i32;
    fn from_wire(value: i32) -> Option<Self>;
}

fn integer_value(v: i64, data_type: DataType) -> Option<Value> {
    match data_type {
        DataType::Int32 => i32::try_from(v).ok().map(Value::Int32),
        DataType::Int64 => Some(Value::Int64(v)),
        DataType::Float32 => Some(Value::Float32(v as f32)),
        DataType::Float64 => Some(Value::Float64(v as f64)),
        _ => None,
    }
}

impl FieldValue for bool {
    const NATIVE: NativeType = NativeType::Bool;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        integer_value(i64::from(*self), data_type)
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int32(v) => Some(*v != 0),
            Value::Int64(v) => Some(*v != 0),
            Value::Float32(v) => Some(*v != 0.0),
            Value::Float64(v) => Some(*v != 0.0),
            _ => None,
        }
    }
}

impl<E: WireEnum> FieldValue for E {
    const NATIVE: NativeType = NativeType::Enum;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        integer_value(i64::from(self.to_wire()), data_type)
    }

    fn from_value(value: &Value) -> Option<Self> {
        value
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .and_then(E::from_wire)
    }
}

impl FieldValue for i32 {
    const NATIVE: NativeType = NativeType::I32;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        (data_type == DataType::Int32).then_some(Value::Int32(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for u32 {
    const NATIVE: NativeType = NativeType::U32;

    // Same bits, reinterpreted.
    fn to_value(&self, data_type: DataType) -> Option<Value> {
        (data_type == DataType::Int32).then_some(Value::Int32(*self as i32))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int32(v) => Some(*v as u32),
            _ => None,
        }
    }
}

impl FieldValue for i64 {
    const NATIVE: NativeType = NativeType::I64;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        (data_type == DataType::Int64).then_some(Value::Int64(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for f32 {
    const NATIVE: NativeType = NativeType::F32;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        (data_type == DataType::Float32).then_some(Value::Float32(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float32(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for f64 {
    const NATIVE: NativeType = NativeType::F64;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        (data_type == DataType::Float64).then_some(Value::Float64(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for String {
    const NATIVE: NativeType = NativeType::String;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        data_type
            .is_string()
            .then(|| Value::String(fit_string(self, data_type).to_string()))
    }

    fn from_value(value: &Value) -> Option<Self> {
        value.as_str().map(str::to_string)
    }
}

impl FieldValue for LatLonAlt {
    const NATIVE: NativeType = NativeType::LatLonAlt;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        (data_type == DataType::LatLonAlt).then_some(Value::LatLonAlt(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::LatLonAlt(v) => Some(*v),
            _ => None,
        }
    }
}

impl FieldValue for Pbh {
    const NATIVE: NativeType = NativeType::Pbh;

    fn to_value(&self, data_type: DataType) -> Option<Value> {
        (data_type == DataType::Pbh).then_some(Value::Pbh(*self))
    }

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Pbh(v) => Some(*v),
            _ => None,
        }
    }
}

/// Cuts `s` so it fits a fixed-size string type, leaving room for the
/// terminating NUL.  Variable-length types are returned unchanged.
pub fn fit_string(s: &str, data_type: DataType) -> &str {
    let size = data_type.size() as usize;
    if size == 0 {
        return s;
    }
    let end = if data_type.is_wide_string() {
        let limit = size / 2 - 1;
        let mut units = 0;
        s.char_indices()
            .find(|(_, c)| {
                units += c.len_utf16();
                units > limit
            })
            .map(|(i, _)| i)
    } else {
        let limit = size - 1;
        s.char_indices()
            .find(|(i, c)| i + c.len_utf8() > limit)
            .map(|(i, _)| i)
    };
    &s[..end.unwrap_or(s.len())]
}

// ── Schema declaration ────────────────────────────────────────────────────────

/// A struct whose members can be exchanged with the host.
pub trait DataShape: Default + Send + Sync + 'static {
    /// Declares the members, in wire order.
    fn describe(schema: &mut SchemaBuilder<Self>);
}

type Reader<S> = Box<dyn Fn(&S, DataType) -> Option<Value> + Send + Sync>;
type Writer<S> = Box<dyn Fn(&mut S, &Value) -> bool + Send + Sync>;

/// What a member is bound to.
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    Value(FieldDescriptor),
    Meta(MetaKind),
}

/// A declared member with its accessors.
pub struct AnnotatedMember<S> {
    member: &'static str,
    annotation: Annotation,
    native: NativeType,
    reader: Option<Reader<S>>,
    writer: Option<Writer<S>>,
}

impl<S> AnnotatedMember<S> {
    /// The Rust member name.
    pub fn member(&self) -> &'static str {
        self.member
    }

    pub fn annotation(&self) -> &Annotation {
        &self.annotation
    }

    pub fn native(&self) -> NativeType {
        self.native
    }

    /// The field descriptor, for value members.
    pub fn field(&self) -> Option<&FieldDescriptor> {
        match &self.annotation {
            Annotation::Value(field) => Some(field),
            Annotation::Meta(_) => None,
        }
    }

    pub fn is_meta(&self) -> bool {
        matches!(self.annotation, Annotation::Meta(_))
    }
}

impl<S> std::fmt::Debug for AnnotatedMember<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotatedMember")
            .field("member", &self.member)
            .field("annotation", &self.annotation)
            .field("native", &self.native)
            .field("readable", &self.reader.is_some())
            .field("writable", &self.writer.is_some())
            .finish()
    }
}

/// Collects member declarations for one [`DataShape`].
pub struct SchemaBuilder<S> {
    members: Vec<AnnotatedMember<S>>,
}

impl<S: 'static> SchemaBuilder<S> {
    fn new() -> Self {
        Self {
            members: Vec::new(),
        }
    }

    /// Declares a read-write member bound to `field`.
    pub fn value<T: FieldValue>(
        &mut self,
        member: &'static str,
        field: FieldDescriptor,
        get: fn(&S) -> &T,
        set: fn(&mut S) -> &mut T,
    ) -> &mut Self {
        self.members.push(AnnotatedMember {
            member,
            annotation: Annotation::Value(field),
            native: T::NATIVE,
            reader: Some(Box::new(move |s, data_type| get(s).to_value(data_type))),
            writer: Some(Box::new(move |s, value| match T::from_value(value) {
                Some(v) => {
                    *set(s) = v;
                    true
                }
                None => false,
            })),
        });
        self
    }

    /// Declares a member whose value is computed from the struct; it can be
    /// sent but never received.
    pub fn computed<T, F>(
        &mut self,
        member: &'static str,
        field: FieldDescriptor,
        getter: F,
    ) -> &mut Self
    where
        T: FieldValue,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        self.members.push(AnnotatedMember {
            member,
            annotation: Annotation::Value(field),
            native: T::NATIVE,
            reader: Some(Box::new(move |s, data_type| getter(s).to_value(data_type))),
            writer: None,
        });
        self
    }

    /// Declares a member filled from the reply header.
    pub fn meta<T: FieldValue>(
        &mut self,
        member: &'static str,
        kind: MetaKind,
        set: fn(&mut S) -> &mut T,
    ) -> &mut Self {
        self.members.push(AnnotatedMember {
            member,
            annotation: Annotation::Meta(kind),
            native: T::NATIVE,
            reader: None,
            writer: Some(Box::new(move |s, value| match T::from_value(value) {
                Some(v) => {
                    *set(s) = v;
                    true
                }
                None => false,
            })),
        });
        self
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// A malformed or duplicate declaration.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("{definition}: member '{member}' has an empty field name")]
    EmptyName { definition: String, member: String },

    #[error("{definition}: field '{field}' is declared more than once")]
    DuplicateField { definition: String, field: String },

    #[error("{definition}: field '{field}' declares {declared} bytes but {data_type} is {expected} bytes")]
    SizeMismatch {
        definition: String,
        field: String,
        data_type: DataType,
        declared: u32,
        expected: u32,
    },
}

/// Checks one field's name and size; `seen` collects names already declared.
pub(crate) fn validate_field(
    definition: &str,
    member: &str,
    field: &FieldDescriptor,
    seen: &mut HashSet<String>,
) -> Result<(), SchemaError> {
    if field.name.trim().is_empty() {
        return Err(SchemaError::EmptyName {
            definition: definition.to_string(),
            member: member.to_string(),
        });
    }
    if !seen.insert(field.name.clone()) {
        return Err(SchemaError::DuplicateField {
            definition: definition.to_string(),
            field: field.name.clone(),
        });
    }
    let expected = field.data_type.size();
    if let Some(declared) = field.size {
        if expected != 0 && declared != expected {
            return Err(SchemaError::SizeMismatch {
                definition: definition.to_string(),
                field: field.name.clone(),
                data_type: field.data_type,
                declared,
                expected,
            });
        }
    }
    Ok(())
}

// ── Compiled definition ───────────────────────────────────────────────────────

/// A compiled, immutable data definition for shape `S`.
#[derive(Debug)]
pub struct ObjectDefinition<S> {
    id: u32,
    name: String,
    direction: Direction,
    /// Members taking part in this direction, in declaration order.
    members: Vec<AnnotatedMember<S>>,
}

impl<S: DataShape> ObjectDefinition<S> {
    /// Validates `S` for `direction` and binds it to a fresh ID from `ids`.
    ///
    /// # Errors
    ///
    /// [`DefinitionError::Schema`] or [`DefinitionError::Conversion`] for a
    /// bad declaration; [`DefinitionError::Ids`] if no ID is left.
    pub fn compile(direction: Direction, ids: &IdAllocator) -> Result<Self, DefinitionError> {
        let mut builder = SchemaBuilder::<S>::new();
        S::describe(&mut builder);

        let name = shape_name::<S>();
        let members = validate_members(&name, direction, builder.members)?;
        let id = ids.next()?;

        let definition = Self {
            id,
            name,
            direction,
            members,
        };
        debug!(
            "compiled definition {} ({:?}) for {}: [{}]",
            definition.id,
            definition.direction,
            definition.name,
            definition
                .fields()
                .map(|f| format!("{} ({})", f.name, f.data_type))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(definition)
    }

    /// Builds a new `S` from a reply.
    pub fn materialize(&self, data: &ObjectData) -> Result<S, DefinitionError> {
        let mut target = S::default();
        self.copy_into(data, &mut target)?;
        Ok(target)
    }
}

impl<S> ObjectDefinition<S> {
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Short type name of the shape, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn members(&self) -> &[AnnotatedMember<S>] {
        &self.members
    }

    /// Fields sent to the host, in wire order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> + '_ {
        self.members.iter().filter_map(AnnotatedMember::field)
    }

    pub fn field_count(&self) -> usize {
        self.fields().count()
    }

    /// Total bytes of one record on the wire, counting variable-length
    /// strings as zero.
    pub fn wire_size(&self) -> u32 {
        self.fields().map(FieldDescriptor::wire_size).sum()
    }

    /// Writes the values of a reply into an existing `target`.
    pub fn copy_into(&self, data: &ObjectData, target: &mut S) -> Result<(), DefinitionError> {
        let expected = self.field_count();
        if data.values.len() != expected {
            return Err(DefinitionError::FieldCount {
                definition: self.name.clone(),
                expected,
                actual: data.values.len(),
            });
        }

        // Every value member owns one wire position, writable or not.
        let mut values = data.values.iter();
        for member in &self.members {
            match &member.annotation {
                Annotation::Value(field) => {
                    let Some(value) = values.next() else { break };
                    let Some(write) = member.writer.as_ref() else {
                        continue;
                    };
                    if !write(&mut *target, value) {
                        return Err(self.mismatch(member, field.data_type));
                    }
                }
                Annotation::Meta(kind) => {
                    let Some(write) = member.writer.as_ref() else {
                        continue;
                    };
                    let header = Value::Int32(kind.extract(data) as i32);
                    if !write(&mut *target, &header) {
                        return Err(self.mismatch(member, DataType::Int32));
                    }
                }
            }
        }
        Ok(())
    }

    /// Reads the wire values out of `source`, in wire order.
    pub fn extract(&self, source: &S) -> Result<Vec<Value>, DefinitionError> {
        let mut values = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let (Annotation::Value(field), Some(read)) = (&member.annotation, &member.reader) else {
                continue;
            };
            match read(source, field.data_type) {
                Some(value) => values.push(value),
                None => return Err(self.mismatch(member, field.data_type)),
            }
        }
        Ok(values)
    }

    fn mismatch(&self, member: &AnnotatedMember<S>, expected: DataType) -> DefinitionError {
        ConversionError::ValueMismatch {
            definition: self.name.clone(),
            member: member.member.to_string(),
            expected,
        }
        .into()
    }
}

fn shape_name<S>() -> String {
    let full = type_name::<S>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

fn validate_members<S>(
    definition: &str,
    direction: Direction,
    declared: Vec<AnnotatedMember<S>>,
) -> Result<Vec<AnnotatedMember<S>>, DefinitionError> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(declared.len());

    for member in declared {
        match &member.annotation {
            Annotation::Value(field) => {
                validate_field(definition, member.member, field, &mut seen)?;
                if !field.usage.can_be_used(direction.is_set()) {
                    debug!(
                        "{definition}: skipping '{}' ({:?}) for {:?}",
                        field.name, field.usage, direction
                    );
                    continue;
                }
                match check_conversion(field.data_type, member.native) {
                    Conversion::Allowed(ConversionKind::Exact) => {}
                    Conversion::Allowed(ConversionKind::Lossy) => warn!(
                        "{definition}: member '{}' receives {} as {}, fractional values are truncated",
                        member.member, field.data_type, member.native
                    ),
                    Conversion::Disallowed(reason) => {
                        return Err(ConversionError::refused(
                            reason,
                            definition,
                            field.data_type,
                            member.native,
                        )
                        .into())
                    }
                }
                let usable = match direction {
                    Direction::Get => member.writer.is_some(),
                    Direction::Set => member.reader.is_some(),
                };
                if !usable {
                    return Err(ConversionError::UnsupportedMember {
                        definition: definition.to_string(),
                        data_type: field.data_type,
                        member: member.member.to_string(),
                    }
                    .into());
                }
            }
            Annotation::Meta(kind) => {
                if direction.is_set() {
                    warn!(
                        "{definition}: ignoring meta member '{}' ({}) in a set definition",
                        member.member,
                        kind.name()
                    );
                    continue;
                }
                if let Conversion::Disallowed(reason) = check_meta_conversion(member.native) {
                    return Err(ConversionError::refused(
                        reason,
                        definition,
                        DataType::Int32,
                        member.native,
                    )
                    .into());
                }
            }
        }
        kept.push(member);
    }
    Ok(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::field::Usage;

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    enum Gear {
        #[default]
        Up,
        Down,
    }

    impl WireEnum for Gear {
        fn to_wire(self) -> i32 {
            self as i32
        }

        fn from_wire(value: i32) -> Option<Self> {
            match value {
                0 => Some(Gear::Up),
                1 => Some(Gear::Down),
                _ => None,
            }
        }
    }

    #[derive(Debug, Default, PartialEq)]
    struct Status {
        request_id: u32,
        on_ground: bool,
        title: String,
        gear: Gear,
        altitude: f64,
        commanded: f64,
    }

    impl DataShape for Status {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .meta("request_id", MetaKind::RequestId, |s| &mut s.request_id)
                .value(
                    "on_ground",
                    FieldDescriptor::new("SIM ON GROUND")
                        .units("bool")
                        .data_type(DataType::Int32),
                    |s| &s.on_ground,
                    |s| &mut s.on_ground,
                )
                .value(
                    "title",
                    FieldDescriptor::new("TITLE").data_type(DataType::String256),
                    |s| &s.title,
                    |s| &mut s.title,
                )
                .value(
                    "gear",
                    FieldDescriptor::new("GEAR HANDLE POSITION").data_type(DataType::Float64),
                    |s| &s.gear,
                    |s| &mut s.gear,
                )
                .value(
                    "altitude",
                    FieldDescriptor::new("PLANE ALTITUDE")
                        .units("feet")
                        .usage(Usage::GetOnly),
                    |s| &s.altitude,
                    |s| &mut s.altitude,
                )
                .value(
                    "commanded",
                    FieldDescriptor::new("AUTOPILOT ALTITUDE LOCK VAR")
                        .units("feet")
                        .usage(Usage::SetOnly),
                    |s| &s.commanded,
                    |s| &mut s.commanded,
                );
        }
    }

    #[derive(Debug, Default)]
    struct Duplicate {
        a: f64,
        b: f64,
    }

    impl DataShape for Duplicate {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .value("a", FieldDescriptor::new("AIRSPEED TRUE"), |s| &s.a, |s| &mut s.a)
                .value("b", FieldDescriptor::new("AIRSPEED TRUE"), |s| &s.b, |s| &mut s.b);
        }
    }

    #[derive(Debug, Default)]
    struct WrongType {
        title: f64,
    }

    impl DataShape for WrongType {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.value(
                "title",
                FieldDescriptor::new("TITLE").data_type(DataType::String8),
                |s| &s.title,
                |s| &mut s.title,
            );
        }
    }

    #[derive(Debug, Default)]
    struct Computed {
        feet: f64,
    }

    impl DataShape for Computed {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema.computed(
                "meters",
                FieldDescriptor::new("PLANE ALTITUDE").units("meters"),
                |s: &Computed| s.feet * 0.3048,
            );
        }
    }

    #[derive(Debug, Default)]
    struct Climb {
        feet: f64,
        heading: f64,
    }

    impl DataShape for Climb {
        fn describe(schema: &mut SchemaBuilder<Self>) {
            schema
                .computed(
                    "meters",
                    FieldDescriptor::new("PLANE ALTITUDE").units("meters"),
                    |s: &Climb| s.feet * 0.3048,
                )
                .value(
                    "heading",
                    FieldDescriptor::new("PLANE HEADING DEGREES TRUE").units("degrees"),
                    |s| &s.heading,
                    |s| &mut s.heading,
                );
        }
    }

    fn names<S>(def: &ObjectDefinition<S>) -> Vec<String> {
        def.fields().map(|f| f.name.clone()).collect()
    }

    #[test]
    fn test_get_definition_keeps_declaration_order_and_skips_set_only() {
        // Arrange
        let ids = IdAllocator::definitions();

        // Act
        let def = ObjectDefinition::<Status>::compile(Direction::Get, &ids).expect("compile");

        // Assert
        assert_eq!(
            names(&def),
            vec!["SIM ON GROUND", "TITLE", "GEAR HANDLE POSITION", "PLANE ALTITUDE"]
        );
        assert_eq!(def.name(), "Status");
        assert_eq!(def.members().len(), 5, "meta member is kept for get");
    }

    #[test]
    fn test_set_definition_drops_meta_and_get_only() {
        let ids = IdAllocator::definitions();

        let def = ObjectDefinition::<Status>::compile(Direction::Set, &ids).expect("compile");

        assert_eq!(
            names(&def),
            vec!["SIM ON GROUND", "TITLE", "GEAR HANDLE POSITION", "AUTOPILOT ALTITUDE LOCK VAR"]
        );
        assert!(def.members().iter().all(|m| !m.is_meta()));
    }

    #[test]
    fn test_compiling_twice_gives_same_layout_new_id() {
        let ids = IdAllocator::definitions();

        let first = ObjectDefinition::<Status>::compile(Direction::Get, &ids).expect("first");
        let second = ObjectDefinition::<Status>::compile(Direction::Get, &ids).expect("second");

        assert_eq!(names(&first), names(&second));
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_materialize_fills_values_and_meta() {
        // Arrange
        let ids = IdAllocator::definitions();
        let def = ObjectDefinition::<Status>::compile(Direction::Get, &ids).expect("compile");
        let data = ObjectData {
            request_id: 17,
            define_id: def.id(),
            values: vec![
                Value::Int32(1),
                Value::String("Cessna 172".into()),
                Value::Float64(1.0),
                Value::Float64(1500.5),
            ],
            ..ObjectData::default()
        };

        // Act
        let status = def.materialize(&data).expect("materialize");

        // Assert
        assert_eq!(status.request_id, 17);
        assert!(status.on_ground);
        assert_eq!(status.title, "Cessna 172");
        assert_eq!(status.gear, Gear::Down);
        assert_eq!(status.altitude, 1500.5);
    }

    #[test]
    fn test_materialize_rejects_wrong_value_count() {
        let ids = IdAllocator::definitions();
        let def = ObjectDefinition::<Status>::compile(Direction::Get, &ids).expect("compile");
        let data = ObjectData {
            values: vec![Value::Int32(1)],
            ..ObjectData::default()
        };

        let err = def.materialize(&data).expect_err("must fail");

        assert!(matches!(
            err,
            DefinitionError::FieldCount { expected: 4, actual: 1, .. }
        ));
    }

    #[test]
    fn test_extract_converts_in_wire_order() {
        let ids = IdAllocator::definitions();
        let def = ObjectDefinition::<Status>::compile(Direction::Set, &ids).expect("compile");
        let status = Status {
            on_ground: true,
            title: "Beaver".into(),
            gear: Gear::Down,
            commanded: 3000.0,
            ..Status::default()
        };

        let values = def.extract(&status).expect("extract");

        assert_eq!(
            values,
            vec![
                Value::Int32(1),
                Value::String("Beaver".into()),
                Value::Float64(1.0),
                Value::Float64(3000.0),
            ]
        );
    }

    #[test]
    fn test_duplicate_field_is_rejected_without_consuming_an_id() {
        let ids = IdAllocator::definitions();

        let err = ObjectDefinition::<Duplicate>::compile(Direction::Get, &ids).expect_err("dup");

        assert!(matches!(
            err,
            DefinitionError::Schema(SchemaError::DuplicateField { .. })
        ));
        assert_eq!(ids.last(), 1);
    }

    #[test]
    fn test_incompatible_type_is_a_conversion_error() {
        let ids = IdAllocator::definitions();

        let err = ObjectDefinition::<WrongType>::compile(Direction::Get, &ids).expect_err("type");

        assert_eq!(
            err,
            DefinitionError::Conversion(ConversionError::NoConversion {
                definition: "WrongType".into(),
                data_type: DataType::String8,
                native: NativeType::F64,
            })
        );
    }

    #[test]
    fn test_computed_member_only_serves_set() {
        let ids = IdAllocator::definitions();

        let get = ObjectDefinition::<Computed>::compile(Direction::Get, &ids);
        let set = ObjectDefinition::<Computed>::compile(Direction::Set, &ids).expect("set");

        assert!(matches!(
            get,
            Err(DefinitionError::Conversion(ConversionError::UnsupportedMember { .. }))
        ));
        let values = set.extract(&Computed { feet: 1000.0 }).expect("extract");
        match values.as_slice() {
            [Value::Float64(meters)] => assert!((meters - 304.8).abs() < 1e-9),
            other => panic!("unexpected values {other:?}"),
        }
    }

    #[test]
    fn test_copy_keeps_positions_behind_computed_member() {
        // Arrange
        let ids = IdAllocator::definitions();
        let set = ObjectDefinition::<Climb>::compile(Direction::Set, &ids).expect("set");
        let reply = ObjectData {
            define_id: set.id(),
            values: vec![Value::Float64(1000.0), Value::Float64(90.0)],
            ..ObjectData::default()
        };

        // Act
        let climb = set.materialize(&reply).expect("materialize");

        // Assert
        assert_eq!(climb.heading, 90.0);
        assert_eq!(climb.feet, 0.0);
    }

    #[test]
    fn test_size_mismatch_is_rejected() {
        let mut seen = HashSet::new();
        let field = FieldDescriptor::new("TITLE")
            .data_type(DataType::String64)
            .size(32);

        let err = validate_field("Shape", "title", &field, &mut seen).expect_err("size");

        assert!(matches!(err, SchemaError::SizeMismatch { declared: 32, expected: 64, .. }));
    }

    #[test]
    fn test_fit_string_respects_fixed_sizes() {
        assert_eq!(fit_string("ABCDEFGHIJ", DataType::String8), "ABCDEFG");
        assert_eq!(fit_string("ABCDEFGHIJ", DataType::WString8), "ABCDEFG");
        assert_eq!(fit_string("ABCDEFGHIJ", DataType::StringV), "ABCDEFGHIJ");
        assert_eq!(fit_string("short", DataType::String32), "short");
    }
}
