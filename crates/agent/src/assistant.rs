//! Prompted completion calls with the errors-as-data contract: every call
//! yields a [`CompletionResult`], and a failure is visible only in its text.

use std::sync::Arc;

use chrono::Utc;
use leadbridge_core::{OdooStruct, OdooValue};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::llm::{CompletionRequest, LlmClient};

const ASSISTANT_PROMPT: &str = "\
You are an assistant for a university CRM that manages prospective-student leads.

You help interpret questions about:
- leads and opportunities for prospective students
- partners (students, companies, contacts)
- academic programs and the admissions process
- commercial follow-up and lead conversion

Leads may record the academic program of interest and the contact channel (web, \
social networks, events, referrals). The process moves through stages from \
prospect to enrolled.

Answer professionally and clearly, oriented to action, in the language of the question.";

const ACTION_PROMPT: &str = "\
You interpret requests for a university CRM built on Odoo.

Available actions:

Leads (crm.lead):
- get_leads: search leads with filters
- create_lead: create a new lead
- update_lead: update an existing lead

Partners (res.partner):
- get_partners: search partners with filters
- create_partner: create a new partner
- update_partner: update an existing partner

Key fields:
- Leads: name, contact_name, email_from, phone, x_studio_programa_academico, \
x_studio_canal_de_contacto, stage_id, user_id, team_id
- Partners: name, email, phone, is_company, customer_rank, city, country_id

Always answer with valid JSON of the form:
{\"action\": \"action_name\", \"model\": \"crm.lead\" | \"res.partner\", \
\"parameters\": {...}, \"explanation\": \"what will be done\"}";

const SUMMARY_PROMPT: &str = "\
You are an assistant specialised in university CRM. Write a concise, useful \
summary of the lead, highlighting what matters for commercial follow-up.";

const SUGGESTION_PROMPT: &str = "\
You are a university CRM consultant specialised in admissions. Analyse the lead \
and suggest specific actions that improve conversion.";

/// Text produced by the completion service, or a failure rendered as text.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CompletionResult {
    pub response: String,
    pub tokens_used: Option<u32>,
    pub model: Option<String>,
    pub timestamp: String,
    #[serde(skip)]
    failed: bool,
}

impl CompletionResult {
    pub fn failure(prefix: &str, error: impl std::fmt::Display) -> Self {
        Self {
            response: format!("{prefix}: {error}"),
            tokens_used: None,
            model: None,
            timestamp: Utc::now().to_rfc3339(),
            failed: true,
        }
    }

    pub fn is_error(&self) -> bool {
        self.failed
    }
}

#[derive(Clone)]
pub struct Assistant {
    llm: Arc<dyn LlmClient>,
}

impl Assistant {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub async fn natural_language_query(
        &self,
        query: &str,
        context: Option<&str>,
        max_tokens: u32,
    ) -> CompletionResult {
        let mut message = format!("Question: {query}");
        if let Some(context) = parse_context(context, "additional_context") {
            message.push_str("\n\nAdditional context:\n");
            for (key, value) in &context {
                message.push_str(&format!("- {key}: {}\n", display_json(value)));
            }
        }

        let request =
            CompletionRequest::new(ASSISTANT_PROMPT, message).max_tokens(max_tokens).temperature(0.1);
        self.run("natural_language_query", "Error processing query", request).await
    }

    pub async fn interpret_odoo_action(&self, query: &str, context: Option<&str>) -> CompletionResult {
        let mut message = format!("User request: {query}\n");
        if let Some(context) = parse_context(context, "raw_context") {
            message.push_str(&format!("\nAdditional context: {}\n", Value::Object(context)));
        }
        message.push_str(
            "\nAnswer with JSON containing:\n\
             - action: the action to perform\n\
             - model: the Odoo model (crm.lead or res.partner)\n\
             - parameters: the parameters the action needs\n\
             - explanation: what will be done",
        );

        let request = CompletionRequest::new(ACTION_PROMPT, message).max_tokens(1000).temperature(0.1);
        self.run("interpret_odoo_action", "Error interpreting action", request).await
    }

    pub async fn summarize_lead(&self, lead: &OdooStruct) -> CompletionResult {
        let message = format!(
            "Write a professional summary of this lead:\n\n{}\n\n\
             Cover the main contact details, academic interest, current status \
             in the process and recommended next steps.",
            format_lead(lead)
        );
        let request = CompletionRequest::new(SUMMARY_PROMPT, message).max_tokens(500).temperature(0.3);
        self.run("summarize_lead", "Error generating summary", request).await
    }

    pub async fn suggest_lead_actions(&self, lead: &OdooStruct) -> CompletionResult {
        let message = format!(
            "Based on this lead, suggest 3 to 5 specific actions:\n\n{}\n\n\
             Suggestions must be specific and actionable, fit a university \
             context, aim at conversion and take the contact channel and \
             program of interest into account.",
            format_lead(lead)
        );
        let request =
            CompletionRequest::new(SUGGESTION_PROMPT, message).max_tokens(600).temperature(0.4);
        self.run("suggest_lead_actions", "Error generating suggestions", request).await
    }

    /// Minimal round trip used by connection tests.
    pub async fn ping(&self) -> CompletionResult {
        let request =
            CompletionRequest::new(ASSISTANT_PROMPT, "Test connection").max_tokens(10).temperature(0.1);
        self.run("ping", "Error testing connection", request).await
    }

    async fn run(&self, operation: &str, prefix: &str, request: CompletionRequest) -> CompletionResult {
        match self.llm.complete(&request).await {
            Ok(completion) => {
                info!(
                    event_name = "assistant.completion.finished",
                    operation,
                    tokens_used = completion.tokens_used(),
                    "completion finished"
                );
                CompletionResult {
                    tokens_used: Some(completion.tokens_used()),
                    model: Some(completion.model),
                    response: completion.text,
                    timestamp: Utc::now().to_rfc3339(),
                    failed: false,
                }
            }
            Err(error) => {
                warn!(
                    event_name = "assistant.completion.failed",
                    operation,
                    error = %error,
                    "completion failed"
                );
                CompletionResult::failure(prefix, error)
            }
        }
    }
}

/// A JSON object is used as-is; anything else is wrapped under `fallback_key`.
pub fn parse_context(raw: Option<&str>, fallback_key: &str) -> Option<Map<String, Value>> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Some(map),
        _ => {
            let mut map = Map::new();
            map.insert(fallback_key.to_string(), Value::String(raw.to_string()));
            Some(map)
        }
    }
}

fn display_json(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn display_field(value: &OdooValue) -> Option<String> {
    if value.is_falsy() {
        return None;
    }
    match value {
        OdooValue::String(text) => Some(text.clone()),
        OdooValue::Int(number) => Some(number.to_string()),
        OdooValue::Double(number) => Some(number.to_string()),
        OdooValue::Bool(true) => Some("yes".to_string()),
        OdooValue::Array(items) => match items.as_slice() {
            [OdooValue::Int(_), OdooValue::String(name)] => Some(name.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Renders the fields of a lead that matter for follow-up, one per line.
pub fn format_lead(lead: &OdooStruct) -> String {
    const LINES: &[(&str, &str, &str)] = &[
        ("name", "Opportunity", ""),
        ("contact_name", "Contact", ""),
        ("email_from", "Email", ""),
        ("phone", "Phone", ""),
        ("x_studio_programa_de_interes", "Program of interest", ""),
        ("x_studio_canal_de_contacto", "Contact channel", ""),
        ("progress", "Progress", "%"),
        ("manage_reason", "Management reason", ""),
        ("stage_id", "Stage", ""),
        ("priority", "Priority", ""),
        ("expected_revenue", "Expected revenue", ""),
    ];

    let formatted: Vec<String> = LINES
        .iter()
        .filter_map(|(field, label, suffix)| {
            lead.get(*field)
                .and_then(display_field)
                .map(|value| format!("{label}: {value}{suffix}"))
        })
        .collect();

    if formatted.is_empty() {
        "No lead data available".to_string()
    } else {
        formatted.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use leadbridge_core::{OdooStruct, OdooValue};
    use serde_json::json;

    use super::{format_lead, parse_context, Assistant};
    use crate::llm::{CompletionError, ScriptedLlmClient};

    #[test]
    fn context_json_object_is_kept_and_text_is_wrapped() {
        let parsed = parse_context(Some(r#"{"program": "MBA"}"#), "additional_context");
        assert_eq!(parsed.map(serde_json::Value::Object), Some(json!({"program": "MBA"})));

        let wrapped = parse_context(Some("only leads from Bogotá"), "additional_context");
        assert_eq!(
            wrapped.map(serde_json::Value::Object),
            Some(json!({"additional_context": "only leads from Bogotá"}))
        );

        assert!(parse_context(Some("   "), "additional_context").is_none());
    }

    #[test]
    fn lead_formatting_skips_empty_fields_and_names_relations() {
        let mut lead = OdooStruct::new();
        lead.insert("name".to_string(), OdooValue::from("MBA Ejecutivo"));
        lead.insert("phone".to_string(), OdooValue::Bool(false));
        lead.insert("progress".to_string(), OdooValue::Int(40));
        lead.insert(
            "stage_id".to_string(),
            OdooValue::Array(vec![OdooValue::Int(2), OdooValue::from("Contactado")]),
        );

        assert_eq!(
            format_lead(&lead),
            "Opportunity: MBA Ejecutivo\nProgress: 40%\nStage: Contactado"
        );
        assert_eq!(format_lead(&OdooStruct::new()), "No lead data available");
    }

    #[tokio::test]
    async fn failures_become_error_text_without_accounting() {
        let llm = Arc::new(ScriptedLlmClient::new().fail(CompletionError::Http("timed out".to_string())));
        let assistant = Assistant::new(llm);

        let result = assistant.natural_language_query("how many leads?", None, 200).await;

        assert!(result.is_error());
        assert!(result.response.starts_with("Error processing query: "));
        assert_eq!(result.tokens_used, None);
        assert_eq!(result.model, None);
    }

    #[tokio::test]
    async fn connection_test_failures_have_their_own_prefix() {
        let llm = Arc::new(ScriptedLlmClient::new().fail(CompletionError::Unconfigured));
        let assistant = Assistant::new(llm);

        let result = assistant.ping().await;

        assert!(result.is_error());
        assert!(result.response.starts_with("Error testing connection: "));
        assert!(!result.response.starts_with("Error processing query"));
    }

    #[tokio::test]
    async fn query_uses_context_lines_and_requested_budget() {
        let llm = Arc::new(ScriptedLlmClient::new().reply("There are 8 leads."));
        let assistant = Assistant::new(llm.clone());

        let result = assistant
            .natural_language_query("how many leads?", Some(r#"{"city": "Bogotá"}"#), 300)
            .await;

        assert!(!result.is_error());
        assert_eq!(result.model.as_deref(), Some("scripted"));
        let requests = llm.requests().await;
        assert_eq!(requests[0].max_tokens, 300);
        assert!(requests[0].user.contains("- city: Bogotá"));
    }

    #[tokio::test]
    async fn summaries_and_suggestions_use_their_own_budgets() {
        let llm = Arc::new(ScriptedLlmClient::repeating("ok"));
        let assistant = Assistant::new(llm.clone());
        let lead = OdooStruct::new();

        assistant.summarize_lead(&lead).await;
        assistant.suggest_lead_actions(&lead).await;

        let requests = llm.requests().await;
        assert_eq!((requests[0].max_tokens, requests[0].temperature), (500, 0.3));
        assert_eq!((requests[1].max_tokens, requests[1].temperature), (600, 0.4));
    }
}
