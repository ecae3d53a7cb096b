//! Mutation payload construction shared by the record types.

use std::borrow::Cow;

use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::errors::ValidationError;
use crate::value::{OdooStruct, OdooValue};

/// A field that is either explicitly provided or left untouched.
///
/// Serializes as `null` when unset so the payload builder drops it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MaybeSet<T> {
    Unset,
    Set(T),
}

impl<T> Default for MaybeSet<T> {
    fn default() -> Self {
        Self::Unset
    }
}

impl<T> MaybeSet<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl<T> From<Option<T>> for MaybeSet<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Unset, Self::Set)
    }
}

impl<T: Serialize> Serialize for MaybeSet<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => value.serialize(serializer),
            Self::Unset => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for MaybeSet<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

impl<T: JsonSchema> JsonSchema for MaybeSet<T> {
    fn inline_schema() -> bool {
        true
    }

    fn schema_name() -> Cow<'static, str> {
        Option::<T>::schema_name()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        Option::<T>::json_schema(generator)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MutationMode {
    Create,
    Update,
}

/// Serializes `record` and keeps only the fields that carry a value.
///
/// `id` never appears in a mutation payload; identity travels separately.
pub fn mutation_payload<T: Serialize>(record: &T) -> Result<OdooStruct, ValidationError> {
    let value = serde_json::to_value(record)
        .map_err(|error| ValidationError::invalid("record", error.to_string()))?;
    let Value::Object(map) = value else {
        return Err(ValidationError::invalid("record", "must serialize to an object"));
    };

    Ok(map
        .into_iter()
        .filter(|(key, value)| key != "id" && !value.is_null())
        .map(|(key, value)| (key, OdooValue::from(value)))
        .collect())
}

/// Enforces the create-time `name` requirement and the update-time
/// "only what the caller supplied" rule.
pub fn require_name(name: &MaybeSet<String>, mode: MutationMode) -> Result<(), ValidationError> {
    match (mode, name) {
        (MutationMode::Create, MaybeSet::Unset) => {
            Err(ValidationError::MissingField { field: "name" })
        }
        (_, MaybeSet::Set(value)) if value.trim().is_empty() => {
            Err(ValidationError::invalid("name", "must not be blank"))
        }
        _ => Ok(()),
    }
}

pub fn check_percentage(field: &str, value: Option<f64>) -> Result<(), ValidationError> {
    match value {
        Some(value) if !(0.0..=100.0).contains(&value) => {
            Err(ValidationError::invalid(field, "must be within 0..=100"))
        }
        _ => Ok(()),
    }
}
