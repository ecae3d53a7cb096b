//! HTTP surface. Handlers only unpack bodies and pick a status code; every
//! operation runs through the shared [`Toolkit`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use leadbridge_agent::{BulkUpdateRequest, Toolkit};
use leadbridge_core::config::AppConfig;
use leadbridge_core::errors::ErrorClass;
use leadbridge_core::{to_wire, Lead, LeadSearchFilters, OperationResult, PartnerSearchFilters};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

const ENDPOINTS: &[&str] = &[
    "GET /health",
    "GET /debug",
    "POST /mcp/get_leads",
    "POST /mcp/create_lead",
    "POST /mcp/get_partners",
    "POST /mcp/natural_query",
    "POST /mcp/execute_natural_update",
];

#[derive(Clone)]
pub struct AppState {
    toolkit: Arc<Toolkit>,
    settings: Arc<Vec<(&'static str, String)>>,
}

impl AppState {
    pub fn new(toolkit: Arc<Toolkit>, config: &AppConfig) -> Self {
        Self { toolkit, settings: Arc::new(config.redacted_entries()) }
    }
}

#[derive(Debug, Deserialize)]
pub struct NaturalQueryBody {
    pub query: String,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/debug", get(debug))
        .route("/mcp/get_leads", post(get_leads))
        .route("/mcp/create_lead", post(create_lead))
        .route("/mcp/get_partners", post(get_partners))
        .route("/mcp/natural_query", post(natural_query))
        .route("/mcp/execute_natural_update", post(execute_natural_update))
        .with_state(state)
}

async fn index() -> Json<Value> {
    Json(json!({
        "service": "leadbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": ENDPOINTS,
    }))
}

async fn health(State(state): State<AppState>) -> Response {
    let report = state.toolkit.health_check().await;
    let status = if report.is_healthy() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status, Json(report)).into_response()
}

async fn debug(State(state): State<AppState>) -> Json<Value> {
    let config: Map<String, Value> = state
        .settings
        .iter()
        .map(|(key, value)| (key.to_string(), Value::String(value.clone())))
        .collect();

    let backend_version = match state.toolkit.crm().gateway().server_version().await {
        Ok(version) => to_wire(version).unwrap_or_else(|error| json!({ "error": error.to_string() })),
        Err(error) => json!({ "error": error.to_string() }),
    };

    Json(json!({
        "service": "leadbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "llm_available": state.toolkit.llm_available(),
        "config": config,
        "backend_version": backend_version,
    }))
}

async fn get_leads(
    State(state): State<AppState>,
    body: Result<Json<LeadSearchFilters>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(filters)) => envelope("get_leads", state.toolkit.get_leads(&filters).await),
        Err(rejection) => malformed("get_leads", rejection),
    }
}

async fn create_lead(
    State(state): State<AppState>,
    body: Result<Json<Lead>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(lead)) => envelope("create_lead", state.toolkit.create_lead(&lead).await),
        Err(rejection) => malformed("create_lead", rejection),
    }
}

async fn get_partners(
    State(state): State<AppState>,
    body: Result<Json<PartnerSearchFilters>, JsonRejection>,
) -> Response {
    match body {
        Ok(Json(filters)) => envelope("get_partners", state.toolkit.get_partners(&filters).await),
        Err(rejection) => malformed("get_partners", rejection),
    }
}

async fn natural_query(
    State(state): State<AppState>,
    body: Result<Json<NaturalQueryBody>, JsonRejection>,
) -> Response {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => return malformed("natural_query", rejection),
    };

    let context = body.context.as_ref().map(context_text);
    let result = state
        .toolkit
        .natural_language_query(&body.query, context.as_deref(), body.max_tokens)
        .await;
    let status = if result.is_error() { StatusCode::BAD_GATEWAY } else { StatusCode::OK };
    (status, Json(result)).into_response()
}

async fn execute_natural_update(
    State(state): State<AppState>,
    body: Result<Json<BulkUpdateRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return malformed("execute_natural_update", rejection),
    };

    let report = state.toolkit.execute_natural_update(&request).await;
    info!(
        event_name = "http.bulk_update.finished",
        status = ?report.status,
        found_records = report.found_records,
        dry_run = report.dry_run,
        "bulk update request handled"
    );
    (status_code(report.status_code()), Json(report)).into_response()
}

fn envelope(route: &str, result: OperationResult) -> Response {
    if !result.success() {
        warn!(
            event_name = "http.request.failed",
            route,
            status = result.status_code(),
            error = result.error().unwrap_or_default(),
            "request failed"
        );
    }
    (status_code(result.status_code()), Json(result)).into_response()
}

fn malformed(route: &str, rejection: JsonRejection) -> Response {
    let detail = rejection.body_text();
    warn!(event_name = "http.request.malformed", route, detail = %detail, "rejected request body");
    let payload = json!({
        "success": false,
        "error": detail,
        "message": ErrorClass::Validation.user_message(),
    });
    (StatusCode::BAD_REQUEST, Json(payload)).into_response()
}

fn status_code(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Strings pass through; any other JSON value is handed on as its text.
fn context_text(context: &Value) -> String {
    match context {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use leadbridge_agent::llm::{LlmClient, ScriptedLlmClient, UnconfiguredLlm};
    use leadbridge_agent::Toolkit;
    use leadbridge_core::config::{AppConfig, PlannerConfig};
    use leadbridge_odoo::fixtures::demo_transport;
    use leadbridge_odoo::{Credentials, OdooGateway};
    use secrecy::SecretString;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, AppState};

    async fn app_with(llm: Arc<dyn LlmClient>, llm_available: bool) -> Router {
        let credentials = Credentials {
            database: "demo".to_string(),
            username: "bot@demo.test".to_string(),
            password: SecretString::from("odoo-secret-value"),
        };
        let gateway = OdooGateway::connect(Arc::new(demo_transport()), credentials)
            .await
            .expect("connects");
        let limits = PlannerConfig { default_max_records: 10, max_records_ceiling: 100 };
        let toolkit = Toolkit::new(Arc::new(gateway), llm, llm_available, limits);

        let mut config = AppConfig::default();
        config.odoo.mock = true;
        config.odoo.password = "odoo-secret-value".to_string().into();
        router(AppState::new(Arc::new(toolkit), &config))
    }

    async fn app() -> Router {
        app_with(Arc::new(UnconfiguredLlm::new("claude-test")), false).await
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("router answers");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        let body = serde_json::from_slice(&bytes).expect("json body");
        (status, body)
    }

    fn post(uri: &str, body: impl Into<String>) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.into()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn health_reports_backend_and_llm_availability() {
        let (status, body) = send(app().await, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["odoo_connected"], true);
        assert_eq!(body["anthropic_available"], false);
        assert!(body["checked_at"].is_string());
    }

    #[tokio::test]
    async fn index_lists_endpoints() {
        let (status, body) = send(app().await, get("/")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "leadbridge");
        let endpoints = body["endpoints"].as_array().expect("endpoint list");
        assert!(endpoints.contains(&json!("POST /mcp/execute_natural_update")));
    }

    #[tokio::test]
    async fn debug_redacts_secrets() {
        let (status, body) = send(app().await, get("/debug")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["config"]["odoo.password"], "<redacted>");
        assert_eq!(body["config"]["odoo.mock"], "true");
        assert_eq!(body["backend_version"]["server_version"], "16.0");
        assert!(!body.to_string().contains("odoo-secret-value"));
    }

    #[tokio::test]
    async fn lead_search_returns_the_envelope() {
        let request = post("/mcp/get_leads", r#"{"city": "Bogotá", "limit": 2}"#);
        let (status, body) = send(app().await, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["count"], 4);
        assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn malformed_body_is_a_bad_request_envelope() {
        let request = post("/mcp/get_leads", r#"{"limit": "many""#);
        let (status, body) = send(app().await, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn lead_without_name_is_rejected_before_the_backend() {
        let (status, body) = send(app().await, post("/mcp/create_lead", "{}")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn partner_search_defaults_to_active_records() {
        let request = post("/mcp/get_partners", r#"{"is_company": true}"#);
        let (status, body) = send(app().await, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 2);
    }

    #[tokio::test]
    async fn natural_query_without_llm_is_a_bad_gateway() {
        let request = post("/mcp/natural_query", r#"{"query": "how many leads?"}"#);
        let (status, body) = send(app().await, request).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["response"].as_str().is_some_and(|text| text.starts_with("Error processing query")));
    }

    #[tokio::test]
    async fn bulk_update_defaults_to_a_dry_run() {
        let plan = json!({
            "search_criteria": [["phone", "=", false]],
            "updates": {"phone": "555"},
            "description": "fill phones"
        });
        let llm = Arc::new(ScriptedLlmClient::new().reply(plan.to_string()));
        let request = post(
            "/mcp/execute_natural_update",
            r#"{"instruction": "set phone to '555' for leads with empty phone"}"#,
        );

        let (status, body) = send(app_with(llm, true).await, request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "dry_run");
        assert_eq!(body["dry_run"], true);
        assert_eq!(body["found_records"], 3);
    }

    #[tokio::test]
    async fn invalid_plan_is_a_bad_request() {
        let llm = Arc::new(ScriptedLlmClient::new().reply(r#"{"description": "nothing"}"#));
        let request = post(
            "/mcp/execute_natural_update",
            r#"{"instruction": "do something", "dry_run": false}"#,
        );

        let (status, body) = send(app_with(llm, true).await, request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["error_kind"], "invalid_plan");
        assert_eq!(body["instruction"], "do something");
    }
}
