//! Natural-language bulk updates.
//!
//! The pipeline is linear: compose a prompt, generate a plan, parse it,
//! validate it, search, then either preview (dry run, the default) or apply
//! one batch write. Every failure becomes a [`BulkUpdateReport`] with status
//! `error`; nothing is retried.

use std::sync::Arc;

use leadbridge_core::config::PlannerConfig;
use leadbridge_core::errors::{ClassifiedError, ErrorClass};
use leadbridge_core::{
    to_wire, CrmModel, Criterion, OdooStruct, OdooValue, SerializationError, ValidationError,
};
use leadbridge_odoo::{GatewayError, OdooGateway, SearchOptions};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{CompletionError, CompletionRequest, LlmClient};

/// Records whose current values are read for a dry-run preview.
pub const PREVIEW_READ_LIMIT: usize = 5;
/// Records reported back in a preview or a post-write confirmation.
pub const REPORTED_RECORD_LIMIT: usize = 3;

const PLAN_MAX_TOKENS: u32 = 1000;
const PLAN_TEMPERATURE: f32 = 0.1;

const PLANNER_PROMPT: &str = "\
You translate bulk-update instructions for an Odoo CRM into a structured plan. \
You never execute anything yourself. Answer with a single JSON object and nothing else.";

fn default_model() -> String {
    CrmModel::Lead.as_str().to_string()
}

fn default_dry_run() -> bool {
    true
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct BulkUpdateRequest {
    pub instruction: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_dry_run")]
    pub dry_run: bool,
    #[serde(default)]
    pub max_records: Option<u32>,
}

impl BulkUpdateRequest {
    /// A dry run against `crm.lead` with the configured default cap.
    pub fn preview(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            model: default_model(),
            dry_run: true,
            max_records: None,
        }
    }
}

/// A validated plan as produced by the language model.
#[derive(Clone, Debug, PartialEq)]
pub struct BulkUpdatePlan {
    pub action: Option<String>,
    pub model: Option<String>,
    pub search_criteria: Vec<Criterion>,
    pub updates: Map<String, Value>,
    pub description: String,
    pub estimated_impact: Option<String>,
}

impl BulkUpdatePlan {
    /// Checks presence of the required keys, in order, then their shapes.
    pub fn from_value(raw: &Value) -> Result<Self, PlannerError> {
        let Some(object) = raw.as_object() else {
            return Err(PlannerError::invalid("plan", "must be a JSON object"));
        };
        for field in ["search_criteria", "updates", "description"] {
            if object.get(field).map_or(true, Value::is_null) {
                return Err(PlannerError::invalid(field, "is missing"));
            }
        }

        let search_criteria = object["search_criteria"]
            .as_array()
            .ok_or_else(|| PlannerError::invalid("search_criteria", "must be a list of triples"))?
            .iter()
            .map(Criterion::from_json)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| PlannerError::invalid("search_criteria", error.to_string()))?;
        let updates = object["updates"]
            .as_object()
            .cloned()
            .ok_or_else(|| PlannerError::invalid("updates", "must be an object"))?;
        let description = match &object["description"] {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        Ok(Self {
            action: text_field(object, "action"),
            model: text_field(object, "model"),
            search_criteria,
            updates,
            description,
            estimated_impact: text_field(object, "estimated_impact"),
        })
    }

    fn update_values(&self) -> OdooStruct {
        self.updates
            .iter()
            .map(|(field, value)| (field.clone(), OdooValue::from(value.clone())))
            .collect()
    }

    /// `id`, `name` and every updated field, without duplicates.
    fn preview_fields(&self) -> Vec<&str> {
        let mut fields = vec!["id", "name"];
        for field in self.updates.keys() {
            if !fields.contains(&field.as_str()) {
                fields.push(field);
            }
        }
        fields
    }
}

fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    match object.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        Some(Value::Null) | None => None,
        Some(other) => Some(other.to_string()),
    }
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("plan generation failed: {0}")]
    Completion(#[from] CompletionError),
    #[error("the language model did not return a JSON plan")]
    PlanParse { raw: String },
    #[error("invalid plan: `{field}` {reason}")]
    InvalidPlan { field: String, reason: String },
    #[error(transparent)]
    Remote(#[from] GatewayError),
    #[error("the backend did not apply the update to {count} records")]
    NotApplied { count: usize },
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl PlannerError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPlan { field: field.into(), reason: reason.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Completion(_) => "completion",
            Self::PlanParse { .. } => "plan_parse",
            Self::InvalidPlan { .. } => "invalid_plan",
            Self::Remote(_) => "remote",
            Self::NotApplied { .. } => "not_applied",
            Self::Serialization(_) => "serialization",
        }
    }
}

impl ClassifiedError for PlannerError {
    fn class(&self) -> ErrorClass {
        match self {
            Self::Validation(_) => ErrorClass::Validation,
            Self::Completion(_) => ErrorClass::Completion,
            Self::PlanParse { .. } | Self::InvalidPlan { .. } => ErrorClass::Plan,
            Self::Remote(_) | Self::NotApplied { .. } => ErrorClass::Remote,
            Self::Serialization(_) => ErrorClass::Serialization,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkUpdateStatus {
    DryRun,
    Success,
    NoMatches,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BulkUpdateReport {
    pub status: BulkUpdateStatus,
    pub success: bool,
    pub instruction: String,
    pub model: String,
    pub dry_run: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Value>,
    pub found_records: usize,
    pub record_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_updates: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_current_data: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_records: Option<Vec<Value>>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
    #[serde(skip)]
    error_class: Option<ErrorClass>,
}

impl BulkUpdateReport {
    fn new(request: &BulkUpdateRequest, status: BulkUpdateStatus, message: String) -> Self {
        Self {
            status,
            success: status != BulkUpdateStatus::Error,
            instruction: request.instruction.clone(),
            model: request.model.clone(),
            dry_run: request.dry_run,
            plan: None,
            found_records: 0,
            record_ids: Vec::new(),
            planned_updates: None,
            preview_current_data: None,
            updated_records: None,
            message,
            error: None,
            error_kind: None,
            raw_response: None,
            error_class: None,
        }
    }

    fn failed(request: &BulkUpdateRequest, plan: Option<Value>, error: &PlannerError) -> Self {
        let class = error.class();
        let mut report =
            Self::new(request, BulkUpdateStatus::Error, class.user_message().to_string());
        report.plan = plan;
        report.error = Some(error.to_string());
        report.error_kind = Some(error.kind());
        report.error_class = Some(class);
        if let PlannerError::PlanParse { raw } = error {
            report.raw_response = Some(raw.clone());
        }
        report
    }

    pub fn error_class(&self) -> Option<ErrorClass> {
        self.error_class
    }

    pub fn status_code(&self) -> u16 {
        self.error_class.map_or(200, ErrorClass::status_code)
    }
}

pub struct BulkUpdatePlanner {
    gateway: Arc<OdooGateway>,
    llm: Arc<dyn LlmClient>,
    guardrails: GuardrailPolicy,
    limits: PlannerConfig,
}

impl BulkUpdatePlanner {
    pub fn new(
        gateway: Arc<OdooGateway>,
        llm: Arc<dyn LlmClient>,
        guardrails: GuardrailPolicy,
        limits: PlannerConfig,
    ) -> Self {
        Self { gateway, llm, guardrails, limits }
    }

    /// Runs the whole pipeline. Never fails: errors are reported as data.
    pub async fn execute(&self, request: &BulkUpdateRequest) -> BulkUpdateReport {
        let mut raw_plan = None;
        match self.run(request, &mut raw_plan).await {
            Ok(report) => report,
            Err(error) => {
                warn!(
                    event_name = "planner.run.failed",
                    model = %request.model,
                    dry_run = request.dry_run,
                    error_kind = error.kind(),
                    error = %error,
                    "bulk update failed"
                );
                BulkUpdateReport::failed(request, raw_plan, &error)
            }
        }
    }

    /// The search cap: the caller's value, or the default, never above the ceiling.
    pub fn effective_limit(&self, requested: Option<u32>) -> Result<u32, ValidationError> {
        let requested = requested.unwrap_or(self.limits.default_max_records);
        if requested == 0 {
            return Err(ValidationError::invalid("max_records", "must be greater than zero"));
        }
        Ok(requested.min(self.limits.max_records_ceiling))
    }

    async fn run(
        &self,
        request: &BulkUpdateRequest,
        raw_plan: &mut Option<Value>,
    ) -> Result<BulkUpdateReport, PlannerError> {
        if request.instruction.trim().is_empty() {
            return Err(ValidationError::MissingField { field: "instruction" }.into());
        }
        let model: CrmModel = request.model.parse()?;
        let limit = self.effective_limit(request.max_records)?;

        info!(
            event_name = "planner.plan.requested",
            model = %model,
            dry_run = request.dry_run,
            limit,
            "generating bulk update plan"
        );
        let completion_request =
            CompletionRequest::new(PLANNER_PROMPT, compose_prompt(&request.instruction, model, limit))
                .max_tokens(PLAN_MAX_TOKENS)
                .temperature(PLAN_TEMPERATURE);
        let completion = self.llm.complete(&completion_request).await?;

        let value = extract_plan(&completion.text)
            .ok_or_else(|| PlannerError::PlanParse { raw: completion.text.clone() })?;
        *raw_plan = Some(value.clone());
        let plan = BulkUpdatePlan::from_value(&value)?;

        if let GuardrailDecision::Deny { reason_code, field, user_message } =
            self.guardrails.evaluate(&plan, model)
        {
            warn!(event_name = "planner.plan.rejected", reason_code, field = %field, "plan denied");
            return Err(PlannerError::InvalidPlan { field, reason: user_message });
        }
        info!(
            event_name = "planner.plan.generated",
            criteria = plan.search_criteria.len(),
            updates = plan.updates.len(),
            tokens_used = completion.tokens_used(),
            "plan accepted"
        );

        let ids = self
            .gateway
            .search(model.as_str(), &plan.search_criteria, &SearchOptions::default().limit(limit))
            .await?;
        info!(event_name = "planner.search.finished", matched = ids.len(), limit, "plan search done");

        let mut report = if ids.is_empty() {
            BulkUpdateReport::new(
                request,
                BulkUpdateStatus::NoMatches,
                "No records match the plan's search criteria; nothing was changed.".to_string(),
            )
        } else if request.dry_run {
            let preview_ids = &ids[..ids.len().min(PREVIEW_READ_LIMIT)];
            let current =
                self.gateway.read(model.as_str(), preview_ids, &plan.preview_fields()).await?;
            info!(event_name = "planner.dry_run.previewed", matched = ids.len(), "dry run finished");

            let mut report = BulkUpdateReport::new(
                request,
                BulkUpdateStatus::DryRun,
                format!(
                    "Dry run: {} records would be updated. Run again with dry_run=false to apply.",
                    ids.len()
                ),
            );
            report.preview_current_data = Some(reported(current)?);
            report
        } else {
            if !self.gateway.write(model.as_str(), &ids, plan.update_values()).await? {
                return Err(PlannerError::NotApplied { count: ids.len() });
            }
            info!(
                event_name = "planner.write.applied",
                model = %model,
                updated = ids.len(),
                "bulk update applied"
            );

            let confirm_ids = &ids[..ids.len().min(REPORTED_RECORD_LIMIT)];
            let updated =
                self.gateway.read(model.as_str(), confirm_ids, &plan.preview_fields()).await?;
            let mut report = BulkUpdateReport::new(
                request,
                BulkUpdateStatus::Success,
                format!("Updated {} records.", ids.len()),
            );
            report.updated_records = Some(reported(updated)?);
            report
        };

        report.plan = raw_plan.take();
        report.found_records = ids.len();
        report.record_ids = ids;
        report.planned_updates = Some(plan.updates);
        Ok(report)
    }
}

fn reported(records: Vec<OdooStruct>) -> Result<Vec<Value>, SerializationError> {
    records
        .into_iter()
        .take(REPORTED_RECORD_LIMIT)
        .map(|record| to_wire(OdooValue::Struct(record)))
        .collect()
}

fn compose_prompt(instruction: &str, model: CrmModel, limit: u32) -> String {
    let operators = leadbridge_core::Operator::ALL
        .iter()
        .map(|operator| operator.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Instruction: {instruction}\n\
         Target model: {model}\n\
         At most {limit} records will be touched.\n\n\
         Return a JSON object with exactly this shape:\n\
         {{\"action\": \"update_records\", \"model\": \"{model}\", \
         \"search_criteria\": [[\"field\", \"operator\", value]], \
         \"updates\": {{\"field\": value}}, \
         \"description\": \"what will change\", \
         \"estimated_impact\": \"which records are affected\"}}\n\n\
         Allowed operators: {operators}.\n\
         Use ilike for case-insensitive partial text matches.\n\
         \"field is empty\" is written [\"field\", \"=\", false]; \
         \"field is not empty\" is written [\"field\", \"!=\", false].\n\
         Update values must be text, numbers or booleans. Never update id."
    )
}

/// The whole text as JSON, else the first fenced block, else the outermost
/// braces.
pub fn extract_plan(text: &str) -> Option<Value> {
    let as_object = |candidate: &str| {
        serde_json::from_str::<Value>(candidate.trim()).ok().filter(Value::is_object)
    };

    if let Some(value) = as_object(text) {
        return Some(value);
    }

    if let Some(start) = text.find("```") {
        let after_fence = &text[start + 3..];
        let body_start = after_fence.find('\n').map_or(0, |newline| newline + 1);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            if let Some(value) = as_object(&body[..end]) {
                return Some(value);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| as_object(&text[start..=end])).flatten()
}
