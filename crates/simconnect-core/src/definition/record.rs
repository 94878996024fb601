//! Runtime-built definitions whose replies are read by field name.
//!
//! Some callers do not know the variables they want at compile time (a
//! console tool asking for whatever the user typed, say).  A
//! [`DynamicDefinition`] is just an ordered field list; each reply becomes a
//! [`DataRecord`] that maps those field names to the received values.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::definition::conversion::ConversionError;
use crate::definition::field::FieldDescriptor;
use crate::definition::schema::validate_field;
use crate::definition::DefinitionError;
use crate::protocol::{DataType, ObjectData, Value};

/// Name used for dynamic definitions in diagnostics.
const DYNAMIC_NAME: &str = "DynamicDefinition";

/// An ordered list of fields assembled at runtime.
#[derive(Debug, Clone)]
pub struct DynamicDefinition {
    id: u32,
    fields: Vec<FieldDescriptor>,
    index: Arc<HashMap<String, usize>>,
}

impl DynamicDefinition {
    /// Checks `fields` without binding them to an ID.
    pub fn validate(fields: &[FieldDescriptor]) -> Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for field in fields {
            validate_field(DYNAMIC_NAME, &field.name, field, &mut seen)?;
            if !(field.data_type.is_numeric()
                || field.data_type.is_string()
                || matches!(field.data_type, DataType::LatLonAlt | DataType::Pbh))
            {
                return Err(ConversionError::DataTypeNotImplemented {
                    definition: DYNAMIC_NAME.to_string(),
                    data_type: field.data_type,
                }
                .into());
            }
        }
        Ok(())
    }

    /// Binds already validated `fields` to `id`.
    pub(crate) fn new(id: u32, fields: Vec<FieldDescriptor>) -> Self {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Self {
            id,
            fields,
            index: Arc::new(index),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Turns a reply into a record keyed by field name.
    pub fn record(&self, data: &ObjectData) -> Result<DataRecord, DefinitionError> {
        if data.values.len() != self.fields.len() {
            return Err(DefinitionError::FieldCount {
                definition: DYNAMIC_NAME.to_string(),
                expected: self.fields.len(),
                actual: data.values.len(),
            });
        }
        for (field, value) in self.fields.iter().zip(&data.values) {
            if !value.fits(field.data_type) {
                return Err(ConversionError::ValueMismatch {
                    definition: DYNAMIC_NAME.to_string(),
                    member: field.name.clone(),
                    expected: field.data_type,
                }
                .into());
            }
        }
        Ok(DataRecord {
            object_id: data.object_id,
            request_id: data.request_id,
            entry_number: data.entry_number,
            out_of: data.out_of,
            index: Arc::clone(&self.index),
            names: self.fields.iter().map(|f| f.name.clone()).collect(),
            values: data.values.clone(),
        })
    }
}

/// One reply of a dynamic definition.
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub object_id: u32,
    pub request_id: u32,
    pub entry_number: u32,
    pub out_of: u32,
    index: Arc<HashMap<String, usize>>,
    names: Vec<String>,
    values: Vec<Value>,
}

impl DataRecord {
    /// Value of the field called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.index.get(name).and_then(|&i| self.values.get(i))
    }

    /// Value at wire position `index`.
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn get_i32(&self, name: &str) -> Option<i32> {
        match self.get(name)? {
            Value::Int32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name)?.as_i64()
    }

    pub fn get_f64(&self, name: &str) -> Option<f64> {
        self.get(name)?.as_f64()
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name)?.as_str()
    }

    /// Non-zero numeric values are `true`.
    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name)?.as_f64().map(|v| v != 0.0)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field names in wire order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// `(name, value)` pairs in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.names.iter().map(String::as_str).zip(&self.values)
    }
}
