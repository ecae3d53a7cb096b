pub mod criteria;
pub mod filters;
pub mod lead;
pub mod partner;
pub mod result;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// The record collections bulk updates may target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CrmModel {
    #[serde(rename = "crm.lead")]
    Lead,
    #[serde(rename = "res.partner")]
    Partner,
}

impl CrmModel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "crm.lead",
            Self::Partner => "res.partner",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Lead => "Lead",
            Self::Partner => "Partner",
        }
    }
}

impl fmt::Display for CrmModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CrmModel {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "crm.lead" => Ok(Self::Lead),
            "res.partner" => Ok(Self::Partner),
            other => Err(ValidationError::UnsupportedModel(other.to_string())),
        }
    }
}
