use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ValidationError;
use crate::value::OdooValue;

/// Comparison operators accepted in a search domain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "ilike")]
    ILike,
    #[serde(rename = "not ilike")]
    NotILike,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "not in")]
    NotIn,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<=")]
    Le,
}

impl Operator {
    pub const ALL: [Operator; 10] = [
        Self::Eq,
        Self::Ne,
        Self::ILike,
        Self::NotILike,
        Self::In,
        Self::NotIn,
        Self::Gt,
        Self::Lt,
        Self::Ge,
        Self::Le,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::ILike => "ilike",
            Self::NotILike => "not ilike",
            Self::In => "in",
            Self::NotIn => "not in",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|operator| operator.as_str() == normalized).ok_or_else(|| {
            ValidationError::invalid("operator", format!("`{value}` is not an allowed operator"))
        })
    }
}

/// One `[field, operator, value]` search term.
#[derive(Clone, Debug, PartialEq)]
pub struct Criterion {
    pub field: String,
    pub operator: Operator,
    pub value: OdooValue,
}

/// An ordered, implicitly AND-ed list of criteria.
pub type Domain = Vec<Criterion>;

impl Criterion {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<OdooValue>) -> Self {
        Self { field: field.into(), operator, value: value.into() }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<OdooValue>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn ilike(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, Operator::ILike, OdooValue::String(value.into()))
    }

    pub fn to_value(&self) -> OdooValue {
        OdooValue::Array(vec![
            OdooValue::String(self.field.clone()),
            OdooValue::String(self.operator.as_str().to_string()),
            self.value.clone(),
        ])
    }

    /// Parses an untrusted `[field, operator, value]` triple.
    pub fn from_json(raw: &Value) -> Result<Self, ValidationError> {
        let Some(items) = raw.as_array() else {
            return Err(ValidationError::invalid(
                "search_criteria",
                format!("`{raw}` is not a [field, operator, value] triple"),
            ));
        };
        let [field, operator, value] = items.as_slice() else {
            return Err(ValidationError::invalid(
                "search_criteria",
                format!("`{raw}` has {} elements, expected 3", items.len()),
            ));
        };
        let field = field
            .as_str()
            .filter(|field| !field.trim().is_empty())
            .ok_or_else(|| {
                ValidationError::invalid("search_criteria", format!("`{raw}` has no field name"))
            })?;
        let operator = operator
            .as_str()
            .ok_or_else(|| {
                ValidationError::invalid("search_criteria", format!("`{raw}` has no operator"))
            })?
            .parse::<Operator>()?;

        Ok(Self::new(field, operator, OdooValue::from(value.clone())))
    }
}

pub fn domain_value(domain: &[Criterion]) -> OdooValue {
    OdooValue::Array(domain.iter().map(Criterion::to_value).collect())
}
