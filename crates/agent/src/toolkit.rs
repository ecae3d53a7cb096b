//! The operations every surface exposes, bound to one backend session and
//! one completion client. Built once at startup and shared behind an `Arc`.

use std::sync::Arc;

use chrono::Utc;
use leadbridge_core::config::{AppConfig, PlannerConfig};
use leadbridge_core::{Lead, LeadSearchFilters, OperationResult, Partner, PartnerSearchFilters};
use leadbridge_odoo::{CrmService, GatewayError, OdooGateway};
use serde::Serialize;
use tracing::{info, warn};

use crate::assistant::{Assistant, CompletionResult};
use crate::guardrails::GuardrailPolicy;
use crate::llm::{AnthropicClient, LlmClient, UnconfiguredLlm};
use crate::planner::{BulkUpdatePlanner, BulkUpdateReport, BulkUpdateRequest};

pub const SERVICE_NAME: &str = "leadbridge";

/// Default completion budget for free-form questions.
pub const DEFAULT_QUERY_TOKENS: u32 = 1000;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub service: &'static str,
    pub odoo_connected: bool,
    pub anthropic_available: bool,
    pub checked_at: String,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.odoo_connected
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceCheck {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ConnectionReport {
    pub odoo: ServiceCheck,
    pub anthropic: ServiceCheck,
}

pub struct Toolkit {
    crm: CrmService,
    assistant: Assistant,
    planner: BulkUpdatePlanner,
    llm_available: bool,
}

impl Toolkit {
    pub fn new(
        gateway: Arc<OdooGateway>,
        llm: Arc<dyn LlmClient>,
        llm_available: bool,
        limits: PlannerConfig,
    ) -> Self {
        Self {
            crm: CrmService::new(gateway.clone()),
            assistant: Assistant::new(llm.clone()),
            planner: BulkUpdatePlanner::new(gateway, llm, GuardrailPolicy::default(), limits),
            llm_available,
        }
    }

    /// Connects to the backend and picks the completion client. Fails only
    /// when the backend session cannot be established.
    pub async fn from_config(config: &AppConfig) -> Result<Self, GatewayError> {
        let gateway = Arc::new(OdooGateway::from_config(&config.odoo).await?);

        let (llm, llm_available): (Arc<dyn LlmClient>, bool) = match AnthropicClient::new(&config.llm) {
            Ok(client) => (Arc::new(client), true),
            Err(error) => {
                warn!(
                    event_name = "toolkit.llm.unavailable",
                    error = %error,
                    "natural-language tools will report errors"
                );
                (Arc::new(UnconfiguredLlm::new(config.llm.model.clone())), false)
            }
        };

        info!(
            event_name = "toolkit.ready",
            database = %gateway.database(),
            model = %llm.model(),
            llm_available,
            "toolkit initialized"
        );
        Ok(Self::new(gateway, llm, llm_available, config.planner.clone()))
    }

    pub fn crm(&self) -> &CrmService {
        &self.crm
    }

    pub fn llm_available(&self) -> bool {
        self.llm_available
    }

    pub async fn test_connections(&self) -> ConnectionReport {
        let odoo = match self.crm.test_connection().await {
            Ok(outcome) => ServiceCheck {
                success: true,
                message: outcome.message.unwrap_or_default(),
                error: None,
                model: None,
            },
            Err(error) => ServiceCheck {
                success: false,
                message: "Odoo connection failed".to_string(),
                error: Some(error.to_string()),
                model: None,
            },
        };

        let anthropic = if self.llm_available {
            let ping = self.assistant.ping().await;
            if ping.is_error() {
                ServiceCheck { success: false, message: ping.response, error: None, model: None }
            } else {
                ServiceCheck {
                    success: true,
                    message: "Connection successful".to_string(),
                    error: None,
                    model: ping.model,
                }
            }
        } else {
            ServiceCheck {
                success: false,
                message: "Anthropic client not configured".to_string(),
                error: None,
                model: None,
            }
        };

        ConnectionReport { odoo, anthropic }
    }

    pub async fn get_leads(&self, filters: &LeadSearchFilters) -> OperationResult {
        OperationResult::from_outcome(self.crm.get_leads(filters).await)
    }

    pub async fn create_lead(&self, lead: &Lead) -> OperationResult {
        OperationResult::from_outcome(self.crm.create_lead(lead).await)
    }

    pub async fn update_lead(&self, id: i64, lead: &Lead) -> OperationResult {
        OperationResult::from_outcome(self.crm.update_lead(id, lead).await)
    }

    pub async fn get_partners(&self, filters: &PartnerSearchFilters) -> OperationResult {
        OperationResult::from_outcome(self.crm.get_partners(filters).await)
    }

    pub async fn create_partner(&self, partner: &Partner) -> OperationResult {
        OperationResult::from_outcome(self.crm.create_partner(partner).await)
    }

    pub async fn update_partner(&self, id: i64, partner: &Partner) -> OperationResult {
        OperationResult::from_outcome(self.crm.update_partner(id, partner).await)
    }

    pub async fn get_crm_stages(&self) -> OperationResult {
        OperationResult::from_outcome(self.crm.get_crm_stages().await)
    }

    pub async fn get_crm_teams(&self) -> OperationResult {
        OperationResult::from_outcome(self.crm.get_crm_teams().await)
    }

    pub async fn get_countries(&self) -> OperationResult {
        OperationResult::from_outcome(self.crm.get_countries().await)
    }

    pub async fn natural_language_query(
        &self,
        query: &str,
        context: Option<&str>,
        max_tokens: Option<u32>,
    ) -> CompletionResult {
        let max_tokens = max_tokens.filter(|tokens| *tokens > 0).unwrap_or(DEFAULT_QUERY_TOKENS);
        self.assistant.natural_language_query(query, context, max_tokens).await
    }

    pub async fn interpret_odoo_action(&self, query: &str, context: Option<&str>) -> CompletionResult {
        self.assistant.interpret_odoo_action(query, context).await
    }

    pub async fn execute_natural_update(&self, request: &BulkUpdateRequest) -> BulkUpdateReport {
        self.planner.execute(request).await
    }

    /// Summary of one lead. A missing lead is reported as error text.
    pub async fn summarize_lead(&self, lead_id: i64) -> CompletionResult {
        match self.crm.read_lead(lead_id).await {
            Ok(lead) => self.assistant.summarize_lead(&lead).await,
            Err(error) => CompletionResult::failure("Error generating summary", error),
        }
    }

    pub async fn suggest_lead_actions(&self, lead_id: i64) -> CompletionResult {
        match self.crm.read_lead(lead_id).await {
            Ok(lead) => self.assistant.suggest_lead_actions(&lead).await,
            Err(error) => CompletionResult::failure("Error generating suggestions", error),
        }
    }

    pub async fn health_check(&self) -> HealthReport {
        let odoo_connected = match self.crm.gateway().server_version().await {
            Ok(_) => true,
            Err(error) => {
                warn!(event_name = "toolkit.health.odoo_unreachable", error = %error, "health probe failed");
                false
            }
        };

        HealthReport {
            status: if odoo_connected { "healthy" } else { "unhealthy" },
            service: SERVICE_NAME,
            odoo_connected,
            anthropic_available: self.llm_available,
            checked_at: Utc::now().to_rfc3339(),
        }
    }
}
