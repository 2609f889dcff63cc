use std::fmt;
use std::str::FromStr;

use gdal_sys::OGRFieldType;

use crate::errors::{EasyOgrError, Result};
use crate::value::FieldValue;

/// Attribute type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldType {
    Integer,
    Integer64,
    Real,
    String,
    Date,
    Time,
    DateTime,
    Binary,
    /// List types and anything newer than this crate, read as strings.
    Other(OGRFieldType::Type),
}

impl FieldType {
    pub fn from_ogr(field_type: OGRFieldType::Type) -> FieldType {
        match field_type {
            OGRFieldType::OFTInteger => FieldType::Integer,
            OGRFieldType::OFTInteger64 => FieldType::Integer64,
            OGRFieldType::OFTReal => FieldType::Real,
            OGRFieldType::OFTString => FieldType::String,
            OGRFieldType::OFTDate => FieldType::Date,
            OGRFieldType::OFTTime => FieldType::Time,
            OGRFieldType::OFTDateTime => FieldType::DateTime,
            OGRFieldType::OFTBinary => FieldType::Binary,
            other => FieldType::Other(other),
        }
    }

    pub fn to_ogr(self) -> OGRFieldType::Type {
        match self {
            FieldType::Integer => OGRFieldType::OFTInteger,
            FieldType::Integer64 => OGRFieldType::OFTInteger64,
            FieldType::Real => OGRFieldType::OFTReal,
            FieldType::String => OGRFieldType::OFTString,
            FieldType::Date => OGRFieldType::OFTDate,
            FieldType::Time => OGRFieldType::OFTTime,
            FieldType::DateTime => OGRFieldType::OFTDateTime,
            FieldType::Binary => OGRFieldType::OFTBinary,
            FieldType::Other(other) => other,
        }
    }

    /// The type a field must have to store `value` without loss.
    pub fn of_value(value: &FieldValue) -> FieldType {
        match value {
            FieldValue::Integer(v) if i32::try_from(*v).is_ok() => FieldType::Integer,
            FieldValue::Integer(_) => FieldType::Integer64,
            FieldValue::Real(_) => FieldType::Real,
            FieldValue::Date(_) => FieldType::Date,
            FieldValue::DateTime(_) => FieldType::DateTime,
            FieldValue::Null | FieldValue::String(_) => FieldType::String,
        }
    }
}

impl FromStr for FieldType {
    type Err = EasyOgrError;

    fn from_str(s: &str) -> Result<FieldType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "int" | "integer" => Ok(FieldType::Integer),
            "int64" | "integer64" | "long" => Ok(FieldType::Integer64),
            "float" | "double" | "real" => Ok(FieldType::Real),
            "str" | "string" | "text" => Ok(FieldType::String),
            "date" => Ok(FieldType::Date),
            "time" => Ok(FieldType::Time),
            "datetime" => Ok(FieldType::DateTime),
            "binary" => Ok(FieldType::Binary),
            other => Err(EasyOgrError::Schema(format!("unknown field type '{other}'"))),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Integer => f.write_str("Integer"),
            FieldType::Integer64 => f.write_str("Integer64"),
            FieldType::Real => f.write_str("Real"),
            FieldType::String => f.write_str("String"),
            FieldType::Date => f.write_str("Date"),
            FieldType::Time => f.write_str("Time"),
            FieldType::DateTime => f.write_str("DateTime"),
            FieldType::Binary => f.write_str("Binary"),
            FieldType::Other(code) => write!(f, "OGRFieldType({code})"),
        }
    }
}

/// Name, type, width and precision of one attribute field. A width of 0 lets the driver pick.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    pub field_type: FieldType,
    pub width: i32,
    pub precision: i32,
}

impl FieldDefinition {
    pub fn new(name: &str, field_type: FieldType) -> FieldDefinition {
        FieldDefinition {
            name: name.to_string(),
            field_type,
            width: 0,
            precision: 0,
        }
    }

    pub fn with_width(mut self, width: i32) -> FieldDefinition {
        self.width = width;
        self
    }

    pub fn with_precision(mut self, precision: i32) -> FieldDefinition {
        self.precision = precision;
        self
    }
}

/// Ordered field definitions. Position `i` describes attribute `i` of every record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<FieldDefinition>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDefinition>) -> Schema {
        Schema { fields }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&FieldDefinition> {
        self.fields.get(index)
    }

    /// Field position by name; exact match first, then ignoring case.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name == name)
            .or_else(|| {
                self.fields
                    .iter()
                    .position(|field| field.name.eq_ignore_ascii_case(name))
            })
    }

    /// Like [`Schema::index_of`], failing with a schema error for unknown names.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.index_of(name).ok_or_else(|| {
            EasyOgrError::Schema(format!(
                "unknown field '{name}', expected one of {:?}",
                self.names()
            ))
        })
    }

    pub fn push(&mut self, field: FieldDefinition) -> Result<()> {
        if self.index_of(&field.name).is_some() {
            return Err(EasyOgrError::Schema(format!(
                "field '{}' already exists",
                field.name
            )));
        }
        self.fields.push(field);
        Ok(())
    }

    /// Positions of `names`, sorted and deduplicated.
    pub fn indices_of(&self, names: &[&str]) -> Result<Vec<usize>> {
        let mut indices = names
            .iter()
            .map(|name| self.require(name))
            .collect::<Result<Vec<_>>>()?;
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }

    /// Removes the fields at `indices`, which must be sorted.
    pub fn remove(&mut self, indices: &[usize]) {
        for index in indices.iter().rev() {
            self.fields.remove(*index);
        }
    }
}
