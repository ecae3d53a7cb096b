//! Tool parameters and the tool catalogue.
//!
//! Search and create tools decode into the core filter and record types;
//! the structs here cover the tools whose arguments have no core counterpart.

use std::borrow::Cow;
use std::marker::PhantomData;

use leadbridge_agent::BulkUpdateRequest;
use leadbridge_core::{CrmModel, Lead, Partner, ValidationError};
use schemars::{JsonSchema, Schema, SchemaGenerator};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Records tools
pub const RECORD_TOOLS: &[&str] = &[
    "get_leads",
    "create_lead",
    "update_lead",
    "get_partners",
    "create_partner",
    "update_partner",
    "get_crm_stages",
    "get_crm_teams",
    "get_countries",
];

/// Language-model tools
pub const ASSISTANT_TOOLS: &[&str] = &[
    "natural_language_query",
    "interpret_odoo_action",
    "execute_natural_update",
    "summarize_lead",
    "suggest_lead_actions",
];

/// Diagnostics tools
pub const DIAGNOSTIC_TOOLS: &[&str] = &["test_connections", "health_check"];

pub const TOTAL_TOOLS: usize = RECORD_TOOLS.len() + ASSISTANT_TOOLS.len() + DIAGNOSTIC_TOOLS.len();

/// Tool arguments as received, advertised with `T`'s schema.
///
/// Decoding into `T` happens inside the tool so that malformed arguments
/// are answered with an error envelope rather than a protocol error.
#[derive(Debug)]
pub struct Arguments<T> {
    raw: Map<String, Value>,
    target: PhantomData<fn() -> T>,
}

impl<T> Arguments<T> {
    pub fn new(raw: Map<String, Value>) -> Self {
        Self { raw, target: PhantomData }
    }
}

impl<T: DeserializeOwned> Arguments<T> {
    pub fn decode(self) -> Result<T, ValidationError> {
        serde_json::from_value(Value::Object(self.raw))
            .map_err(|error| ValidationError::invalid("arguments", error.to_string()))
    }
}

impl<'de, T> Deserialize<'de> for Arguments<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::new)
    }
}

impl<T: JsonSchema> JsonSchema for Arguments<T> {
    fn inline_schema() -> bool {
        T::inline_schema()
    }

    fn schema_name() -> Cow<'static, str> {
        T::schema_name()
    }

    fn schema_id() -> Cow<'static, str> {
        T::schema_id()
    }

    fn json_schema(generator: &mut SchemaGenerator) -> Schema {
        T::json_schema(generator)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdateLeadInput {
    #[schemars(description = "ID of the lead to update")]
    pub lead_id: i64,

    #[serde(flatten)]
    pub fields: Lead,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct UpdatePartnerInput {
    #[schemars(description = "ID of the partner to update")]
    pub partner_id: i64,

    #[serde(flatten)]
    pub fields: Partner,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NaturalLanguageQueryInput {
    #[schemars(description = "Question about the CRM in natural language")]
    pub query: String,

    #[schemars(description = "Extra context, either a JSON object or free text")]
    #[serde(default)]
    pub context: Option<String>,

    #[schemars(description = "Completion budget in tokens (default 1000)")]
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct InterpretActionInput {
    #[schemars(description = "What the user wants done in the CRM")]
    pub query: String,

    #[schemars(description = "Extra context, either a JSON object or free text")]
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct NaturalUpdateInput {
    #[schemars(description = "Bulk update to perform, e.g. \"set phone to '555' for leads with empty phone\"")]
    pub instruction: String,

    #[schemars(description = "Target model: crm.lead or res.partner", default = "default_model")]
    #[serde(default = "default_model")]
    pub model: String,

    #[schemars(description = "Only preview the matching records (default true)", default = "default_true")]
    #[serde(default = "default_true")]
    pub dry_run: bool,

    #[schemars(description = "Maximum number of records to touch")]
    #[serde(default)]
    pub max_records: Option<u32>,
}

impl From<NaturalUpdateInput> for BulkUpdateRequest {
    fn from(input: NaturalUpdateInput) -> Self {
        Self {
            instruction: input.instruction,
            model: input.model,
            dry_run: input.dry_run,
            max_records: input.max_records,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct LeadIdInput {
    #[schemars(description = "ID of the lead")]
    pub lead_id: i64,
}

fn default_model() -> String {
    CrmModel::Lead.as_str().to_string()
}

fn default_true() -> bool {
    true
}
