//! MCP server for leadbridge.
//!
//! Every tool answers with JSON text. Failures are still JSON (an error
//! envelope or error text) and are flagged with `is_error`.

use std::sync::Arc;

use leadbridge_agent::{BulkUpdateRequest, Toolkit};
use leadbridge_core::wire::encode_text;
use leadbridge_core::{
    Lead, LeadSearchFilters, OperationResult, Partner, PartnerSearchFilters, ValidationError,
};
use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::tools::{
    Arguments, InterpretActionInput, LeadIdInput, NaturalLanguageQueryInput, NaturalUpdateInput,
    UpdateLeadInput, UpdatePartnerInput,
};

const INSTRUCTIONS: &str = "\
Leadbridge exposes an Odoo CRM: search, create and update leads (crm.lead) and \
partners (res.partner), list stages, teams and countries, ask questions in natural \
language, and plan bulk updates from an instruction. execute_natural_update is a \
dry run unless dry_run is false; review the preview before applying.";

#[derive(Clone)]
pub struct LeadbridgeMcpServer {
    toolkit: Arc<Toolkit>,
    tool_router: ToolRouter<Self>,
}

fn respond<T: Serialize>(payload: &T, failed: bool) -> Result<CallToolResult, McpError> {
    let content = vec![Content::text(encode_text(payload))];
    Ok(if failed { CallToolResult::error(content) } else { CallToolResult::success(content) })
}

fn envelope(result: OperationResult) -> Result<CallToolResult, McpError> {
    let failed = !result.success();
    respond(&result, failed)
}

fn rejected(tool: &str, error: ValidationError) -> Result<CallToolResult, McpError> {
    warn!(event_name = "mcp.tool.invalid_arguments", tool, error = %error, "rejected tool arguments");
    envelope(OperationResult::failure(&error))
}

macro_rules! decode_or_reject {
    ($tool:literal, $arguments:expr) => {
        match $arguments.decode() {
            Ok(decoded) => decoded,
            Err(error) => return rejected($tool, error),
        }
    };
}

#[tool_router]
impl LeadbridgeMcpServer {
    pub fn new(toolkit: Arc<Toolkit>) -> Self {
        Self { toolkit, tool_router: Self::tool_router() }
    }

    /// Serves on stdin/stdout until the client disconnects.
    pub async fn run_stdio(self) -> anyhow::Result<()> {
        info!(event_name = "mcp.server.starting", "serving MCP over stdio");
        let service = self.serve(rmcp::transport::io::stdio()).await?;
        service.waiting().await?;
        info!(event_name = "mcp.server.stopped", "MCP client disconnected");
        Ok(())
    }

    #[tool(description = "Check the Odoo session and the language model connection")]
    async fn test_connections(&self) -> Result<CallToolResult, McpError> {
        let report = self.toolkit.test_connections().await;
        respond(&report, false)
    }

    #[tool(description = "Search CRM leads by stage, owner, team, type, priority, contact data, city or country. Newest first.")]
    async fn get_leads(
        &self,
        Parameters(arguments): Parameters<Arguments<LeadSearchFilters>>,
    ) -> Result<CallToolResult, McpError> {
        let filters: LeadSearchFilters = decode_or_reject!("get_leads", arguments);
        debug!(event_name = "mcp.tool.called", tool = "get_leads", "tool called");
        envelope(self.toolkit.get_leads(&filters).await)
    }

    #[tool(description = "Create a CRM lead. `name` is required.")]
    async fn create_lead(
        &self,
        Parameters(arguments): Parameters<Arguments<Lead>>,
    ) -> Result<CallToolResult, McpError> {
        let lead: Lead = decode_or_reject!("create_lead", arguments);
        debug!(event_name = "mcp.tool.called", tool = "create_lead", "tool called");
        envelope(self.toolkit.create_lead(&lead).await)
    }

    #[tool(description = "Update fields of an existing lead. Only the fields given are changed.")]
    async fn update_lead(
        &self,
        Parameters(arguments): Parameters<Arguments<UpdateLeadInput>>,
    ) -> Result<CallToolResult, McpError> {
        let input: UpdateLeadInput = decode_or_reject!("update_lead", arguments);
        debug!(event_name = "mcp.tool.called", tool = "update_lead", lead_id = input.lead_id, "tool called");
        envelope(self.toolkit.update_lead(input.lead_id, &input.fields).await)
    }

    #[tool(description = "Search partners (contacts and companies). Only active partners unless active is false.")]
    async fn get_partners(
        &self,
        Parameters(arguments): Parameters<Arguments<PartnerSearchFilters>>,
    ) -> Result<CallToolResult, McpError> {
        let filters: PartnerSearchFilters = decode_or_reject!("get_partners", arguments);
        debug!(event_name = "mcp.tool.called", tool = "get_partners", "tool called");
        envelope(self.toolkit.get_partners(&filters).await)
    }

    #[tool(description = "Create a partner. `name` is required.")]
    async fn create_partner(
        &self,
        Parameters(arguments): Parameters<Arguments<Partner>>,
    ) -> Result<CallToolResult, McpError> {
        let partner: Partner = decode_or_reject!("create_partner", arguments);
        debug!(event_name = "mcp.tool.called", tool = "create_partner", "tool called");
        envelope(self.toolkit.create_partner(&partner).await)
    }

    #[tool(description = "Update fields of an existing partner. Only the fields given are changed.")]
    async fn update_partner(
        &self,
        Parameters(arguments): Parameters<Arguments<UpdatePartnerInput>>,
    ) -> Result<CallToolResult, McpError> {
        let input: UpdatePartnerInput = decode_or_reject!("update_partner", arguments);
        debug!(event_name = "mcp.tool.called", tool = "update_partner", partner_id = input.partner_id, "tool called");
        envelope(self.toolkit.update_partner(input.partner_id, &input.fields).await)
    }

    #[tool(description = "Ask a question about the CRM in natural language")]
    async fn natural_language_query(
        &self,
        Parameters(arguments): Parameters<Arguments<NaturalLanguageQueryInput>>,
    ) -> Result<CallToolResult, McpError> {
        let input: NaturalLanguageQueryInput = decode_or_reject!("natural_language_query", arguments);
        let result = self
            .toolkit
            .natural_language_query(&input.query, input.context.as_deref(), input.max_tokens)
            .await;
        respond(&result, result.is_error())
    }

    #[tool(description = "Translate a request into the CRM action, model and parameters it needs, as JSON")]
    async fn interpret_odoo_action(
        &self,
        Parameters(arguments): Parameters<Arguments<InterpretActionInput>>,
    ) -> Result<CallToolResult, McpError> {
        let input: InterpretActionInput = decode_or_reject!("interpret_odoo_action", arguments);
        let result = self.toolkit.interpret_odoo_action(&input.query, input.context.as_deref()).await;
        respond(&result, result.is_error())
    }

    #[tool(description = "Plan a bulk update from a natural-language instruction. Dry run by default: shows matching records without writing.")]
    async fn execute_natural_update(
        &self,
        Parameters(arguments): Parameters<Arguments<NaturalUpdateInput>>,
    ) -> Result<CallToolResult, McpError> {
        let input: NaturalUpdateInput = decode_or_reject!("execute_natural_update", arguments);
        let request = BulkUpdateRequest::from(input);
        let report = self.toolkit.execute_natural_update(&request).await;
        respond(&report, !report.success)
    }

    #[tool(description = "List CRM pipeline stages")]
    async fn get_crm_stages(&self) -> Result<CallToolResult, McpError> {
        envelope(self.toolkit.get_crm_stages().await)
    }

    #[tool(description = "List sales teams")]
    async fn get_crm_teams(&self) -> Result<CallToolResult, McpError> {
        envelope(self.toolkit.get_crm_teams().await)
    }

    #[tool(description = "List countries with their codes")]
    async fn get_countries(&self) -> Result<CallToolResult, McpError> {
        envelope(self.toolkit.get_countries().await)
    }

    #[tool(description = "Report whether the Odoo backend answers and a language model is configured")]
    async fn health_check(&self) -> Result<CallToolResult, McpError> {
        let report = self.toolkit.health_check().await;
        respond(&report, !report.is_healthy())
    }

    #[tool(description = "Summarize a lead for commercial follow-up")]
    async fn summarize_lead(
        &self,
        Parameters(arguments): Parameters<Arguments<LeadIdInput>>,
    ) -> Result<CallToolResult, McpError> {
        let input: LeadIdInput = decode_or_reject!("summarize_lead", arguments);
        let result = self.toolkit.summarize_lead(input.lead_id).await;
        respond(&result, result.is_error())
    }

    #[tool(description = "Suggest 3 to 5 concrete next actions for a lead")]
    async fn suggest_lead_actions(
        &self,
        Parameters(arguments): Parameters<Arguments<LeadIdInput>>,
    ) -> Result<CallToolResult, McpError> {
        let input: LeadIdInput = decode_or_reject!("suggest_lead_actions", arguments);
        let result = self.toolkit.suggest_lead_actions(input.lead_id).await;
        respond(&result, result.is_error())
    }
}

#[tool_handler]
impl ServerHandler for LeadbridgeMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
