//! Values exchanged with the Odoo object API.
//!
//! `OdooValue` mirrors the XML-RPC data model one-to-one, including the native
//! `dateTime.iso8601` type that JSON cannot carry. Values leave the process
//! through [`crate::wire::to_wire`], which normalizes timestamps first.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::NaiveDateTime;
use serde_json::{Map, Number, Value};

use crate::errors::SerializationError;

pub type OdooStruct = BTreeMap<String, OdooValue>;

#[derive(Clone, Debug, PartialEq)]
pub enum OdooValue {
    Nil,
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
    DateTime(NaiveDateTime),
    Base64(Vec<u8>),
    Array(Vec<OdooValue>),
    Struct(OdooStruct),
}

impl OdooValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Double(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[OdooValue]> {
        match self {
            Self::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&OdooStruct> {
        match self {
            Self::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&OdooValue> {
        self.as_struct().and_then(|fields| fields.get(key))
    }

    /// Odoo reports unset relational and scalar fields as `false`.
    pub fn is_falsy(&self) -> bool {
        match self {
            Self::Nil | Self::Bool(false) => true,
            Self::String(value) => value.is_empty(),
            Self::Array(items) => items.is_empty(),
            _ => false,
        }
    }

    /// Returns the ids of a list of integers or of `[id, display_name]` pairs.
    pub fn ids(&self) -> Vec<i64> {
        let Some(items) = self.as_array() else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| item.as_i64().or_else(|| item.get("id").and_then(Self::as_i64)))
            .collect()
    }

    /// Converts to JSON. Timestamps must be normalized beforehand.
    pub fn into_json(self) -> Result<Value, SerializationError> {
        Ok(match self {
            Self::Nil => Value::Null,
            Self::Bool(value) => Value::Bool(value),
            Self::Int(value) => Value::Number(Number::from(value)),
            Self::Double(value) => Number::from_f64(value)
                .map(Value::Number)
                .ok_or_else(|| SerializationError::NonFiniteNumber(value.to_string()))?,
            Self::String(value) => Value::String(value),
            Self::DateTime(_) => return Err(SerializationError::UnnormalizedTimestamp),
            Self::Base64(bytes) => {
                Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Self::Array(items) => Value::Array(
                items.into_iter().map(Self::into_json).collect::<Result<Vec<_>, _>>()?,
            ),
            Self::Struct(fields) => {
                let mut map = Map::with_capacity(fields.len());
                for (key, value) in fields {
                    map.insert(key, value.into_json()?);
                }
                Value::Object(map)
            }
        })
    }
}

impl From<Value> for OdooValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Nil,
            Value::Bool(value) => Self::Bool(value),
            Value::Number(number) => match number.as_i64() {
                Some(value) => Self::Int(value),
                None => Self::Double(number.as_f64().unwrap_or_default()),
            },
            Value::String(value) => Self::String(value),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Struct(map.into_iter().map(|(key, value)| (key, Self::from(value))).collect())
            }
        }
    }
}

impl From<bool> for OdooValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for OdooValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for OdooValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for OdooValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for OdooValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for OdooValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for OdooValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<NaiveDateTime> for OdooValue {
    fn from(value: NaiveDateTime) -> Self {
        Self::DateTime(value)
    }
}

impl From<Vec<OdooValue>> for OdooValue {
    fn from(items: Vec<OdooValue>) -> Self {
        Self::Array(items)
    }
}

impl From<OdooStruct> for OdooValue {
    fn from(fields: OdooStruct) -> Self {
        Self::Struct(fields)
    }
}

impl<T: Into<OdooValue>> From<Option<T>> for OdooValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Self::Nil)
    }
}
