use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;
use crate::schema::{check_percentage, mutation_payload, require_name, MaybeSet, MutationMode};
use crate::value::OdooStruct;

/// `crm.lead` priority. Odoo stores the star count as a string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LeadPriority {
    #[serde(rename = "0", alias = "low")]
    Low,
    #[serde(rename = "1", alias = "normal")]
    Normal,
    #[serde(rename = "2", alias = "high")]
    High,
    #[serde(rename = "3", alias = "urgent")]
    Urgent,
}

impl LeadPriority {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "0",
            Self::Normal => "1",
            Self::High => "2",
            Self::Urgent => "3",
        }
    }
}

impl FromStr for LeadPriority {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "0" | "low" => Ok(Self::Low),
            "1" | "normal" => Ok(Self::Normal),
            "2" | "high" => Ok(Self::High),
            "3" | "urgent" => Ok(Self::Urgent),
            other => Err(ValidationError::invalid(
                "priority",
                format!("`{other}` is not one of low|normal|high|urgent (or 0..3)"),
            )),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LeadType {
    Lead,
    Opportunity,
}

impl LeadType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lead => "lead",
            Self::Opportunity => "opportunity",
        }
    }
}

impl FromStr for LeadType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "lead" => Ok(Self::Lead),
            "opportunity" => Ok(Self::Opportunity),
            other => Err(ValidationError::invalid(
                "type",
                format!("`{other}` is not one of lead|opportunity"),
            )),
        }
    }
}

/// A `crm.lead` record as the caller intends to write it.
///
/// Every field is optional so the same type serves create and update; the
/// mutation mode decides whether a missing `name` is an error.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Lead {
    pub id: Option<i64>,
    pub name: MaybeSet<String>,
    pub contact_name: Option<String>,
    pub partner_name: Option<String>,
    pub email_from: Option<String>,
    pub phone: Option<String>,
    pub mobile: Option<String>,
    pub website: Option<String>,
    pub function: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub country_id: Option<i64>,
    pub state_id: Option<i64>,
    pub user_id: Option<i64>,
    pub team_id: Option<i64>,
    pub stage_id: Option<i64>,
    pub priority: Option<LeadPriority>,
    pub expected_revenue: Option<f64>,
    pub probability: Option<f64>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub lead_type: Option<LeadType>,
    pub x_studio_programa_academico: Option<i64>,
    pub x_studio_canal_de_contacto: Option<String>,
    pub x_studio_programa_de_interes: Option<String>,
    pub progress: Option<f64>,
    pub manage_reason: Option<String>,
    pub action_request_lead: Option<String>,
}

impl Lead {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: MaybeSet::Set(name.into()), ..Self::default() }
    }

    pub fn validate(&self, mode: MutationMode) -> Result<(), ValidationError> {
        require_name(&self.name, mode)?;
        check_percentage("probability", self.probability)?;
        check_percentage("progress", self.progress)?;
        if let Some(revenue) = self.expected_revenue {
            if !revenue.is_finite() {
                return Err(ValidationError::invalid("expected_revenue", "must be a finite number"));
            }
        }
        Ok(())
    }

    /// The exact field set to send for `mode`: unset fields and `id` dropped.
    pub fn to_mutation_payload(&self, mode: MutationMode) -> Result<OdooStruct, ValidationError> {
        self.validate(mode)?;
        let payload = mutation_payload(self)?;
        if mode == MutationMode::Update && payload.is_empty() {
            return Err(ValidationError::invalid("fields", "at least one field must be supplied"));
        }
        Ok(payload)
    }
}
