use std::sync::Arc;

use leadbridge_agent::guardrails::GuardrailPolicy;
use leadbridge_agent::llm::{CompletionError, ScriptedLlmClient};
use leadbridge_agent::planner::{BulkUpdatePlanner, BulkUpdateRequest, BulkUpdateStatus};
use leadbridge_core::config::PlannerConfig;
use leadbridge_core::{OdooValue, ValidationError};
use leadbridge_odoo::fixtures::{demo_transport, record};
use leadbridge_odoo::{Credentials, InMemoryTransport, OdooGateway};
use secrecy::SecretString;
use serde_json::{json, Value};

const FILL_PHONES: &str = "set phone to '555' for leads with empty phone";

fn limits() -> PlannerConfig {
    PlannerConfig { default_max_records: 10, max_records_ceiling: 100 }
}

async fn planner_over(
    transport: Arc<InMemoryTransport>,
    llm: Arc<ScriptedLlmClient>,
) -> BulkUpdatePlanner {
    let credentials = Credentials {
        database: "university".to_string(),
        username: "bot@demo.test".to_string(),
        password: SecretString::from("secret"),
    };
    let gateway = OdooGateway::connect(transport, credentials).await.expect("connects");
    BulkUpdatePlanner::new(Arc::new(gateway), llm, GuardrailPolicy::default(), limits())
}

fn fill_phones_plan() -> String {
    json!({
        "action": "update_records",
        "model": "crm.lead",
        "search_criteria": [["phone", "=", false]],
        "updates": {"phone": "555"},
        "description": "Set phone to 555 on leads without one",
        "estimated_impact": "Leads with no phone number"
    })
    .to_string()
}

fn request(instruction: &str, dry_run: bool) -> BulkUpdateRequest {
    BulkUpdateRequest { dry_run, ..BulkUpdateRequest::preview(instruction) }
}

#[tokio::test]
async fn dry_run_previews_matches_without_writing() {
    let transport = Arc::new(demo_transport());
    let llm = Arc::new(ScriptedLlmClient::new().reply(fill_phones_plan()));
    let planner = planner_over(transport.clone(), llm).await;

    let report = planner.execute(&BulkUpdateRequest::preview(FILL_PHONES)).await;

    assert_eq!(report.status, BulkUpdateStatus::DryRun, "{:?}", report.error);
    assert!(report.success);
    assert_eq!(report.found_records, 3);
    let mut ids = report.record_ids.clone();
    ids.sort_unstable();
    assert_eq!(ids, vec![2, 4, 6]);
    assert_eq!(report.planned_updates.as_ref().map(|updates| updates["phone"].clone()), Some(json!("555")));

    let preview = report.preview_current_data.as_ref().expect("preview rows");
    assert_eq!(preview.len(), 3);
    assert!(preview.iter().all(|row| row["phone"] == Value::Bool(false)));
    assert!(report.message.contains("3 records would be updated"));

    assert_eq!(transport.count_calls("write").await, 0);
    let untouched = transport.record("crm.lead", 2).await.expect("lead 2");
    assert_eq!(untouched.get("phone"), Some(&OdooValue::Bool(false)));
}

#[tokio::test]
async fn execution_writes_once_and_reports_updated_records() {
    let transport = Arc::new(demo_transport());
    let llm = Arc::new(ScriptedLlmClient::new().reply(fill_phones_plan()));
    let planner = planner_over(transport.clone(), llm).await;

    let report = planner.execute(&request(FILL_PHONES, false)).await;

    assert_eq!(report.status, BulkUpdateStatus::Success, "{:?}", report.error);
    assert_eq!(report.found_records, 3);
    assert_eq!(report.message, "Updated 3 records.");
    assert_eq!(report.status_code(), 200);
    assert_eq!(transport.count_calls("write").await, 1);

    let updated = report.updated_records.as_ref().expect("updated rows");
    assert_eq!(updated.len(), 3);
    assert!(updated.iter().all(|row| row["phone"] == "555"));
    for id in [2, 4, 6] {
        let lead = transport.record("crm.lead", id).await.expect("lead exists");
        assert_eq!(lead.get("phone"), Some(&OdooValue::from("555")));
    }
    let other = transport.record("crm.lead", 1).await.expect("lead 1");
    assert_eq!(other.get("phone"), Some(&OdooValue::from("+57 300 111 2233")));
}

#[tokio::test]
async fn dry_runs_never_write_whatever_the_plan() {
    let criteria = [
        json!([["phone", "=", false]]),
        json!([["city", "ilike", "bogot"]]),
        json!([["stage_id", "in", [1, 2]]]),
        json!([["probability", ">=", 20]]),
        json!([["email_from", "!=", false], ["city", "not ilike", "cali"]]),
    ];
    let updates = [
        json!({"phone": "555"}),
        json!({"priority": "3"}),
        json!({"x_studio_canal_de_contacto": "Evento"}),
        json!({"probability": 50, "active": true}),
    ];

    let mut llm = ScriptedLlmClient::new();
    for index in 0..100 {
        let plan = json!({
            "search_criteria": criteria[index % criteria.len()],
            "updates": updates[index % updates.len()],
            "description": format!("plan {index}"),
        });
        llm = llm.reply(plan.to_string());
    }
    let transport = Arc::new(demo_transport());
    let planner = planner_over(transport.clone(), Arc::new(llm)).await;

    for index in 0..100 {
        let instruction = format!("instruction number {index}");
        let report = planner.execute(&BulkUpdateRequest::preview(instruction)).await;
        assert_ne!(report.status, BulkUpdateStatus::Success);
        assert_ne!(report.status, BulkUpdateStatus::Error, "{:?}", report.error);
    }

    assert_eq!(transport.count_calls("write").await, 0);
}

#[tokio::test]
async fn record_cap_bounds_search_and_preview() {
    let leads = (1..=12).map(|id| {
        record([
            ("id", OdooValue::Int(id)),
            ("name", OdooValue::from(format!("Lead {id}"))),
            ("phone", OdooValue::Bool(false)),
        ])
    });
    let transport = Arc::new(InMemoryTransport::new().with_records("crm.lead", leads));
    let llm = Arc::new(ScriptedLlmClient::repeating(fill_phones_plan()));
    let planner = planner_over(transport.clone(), llm).await;

    let capped = BulkUpdateRequest { max_records: Some(8), ..BulkUpdateRequest::preview(FILL_PHONES) };
    let report = planner.execute(&capped).await;

    assert_eq!(report.found_records, 8);
    assert_eq!(report.preview_current_data.as_ref().map(Vec::len), Some(3));

    let calls = transport.calls().await;
    let search = calls.iter().find(|call| call.method == "search").expect("search call");
    assert_eq!(search.kwargs.get("limit"), Some(&OdooValue::Int(8)));
    let read = calls.iter().find(|call| call.method == "read").expect("preview read");
    assert_eq!(read.args[0].ids().len(), 5);
}

#[tokio::test]
async fn requested_cap_is_clamped_to_the_ceiling() {
    let planner =
        planner_over(Arc::new(demo_transport()), Arc::new(ScriptedLlmClient::new())).await;

    assert_eq!(planner.effective_limit(None), Ok(10));
    assert_eq!(planner.effective_limit(Some(3)), Ok(3));
    assert_eq!(planner.effective_limit(Some(1000)), Ok(100));
    assert!(matches!(planner.effective_limit(Some(0)), Err(ValidationError::InvalidField { .. })));
}

#[tokio::test]
async fn plan_without_updates_is_rejected_before_any_backend_call() {
    let transport = Arc::new(demo_transport());
    let plan = json!({
        "search_criteria": [["phone", "=", false]],
        "description": "no updates here"
    });
    let llm = Arc::new(ScriptedLlmClient::new().reply(plan.to_string()));
    let planner = planner_over(transport.clone(), llm).await;

    let report = planner.execute(&request(FILL_PHONES, false)).await;

    assert_eq!(report.status, BulkUpdateStatus::Error);
    assert!(!report.success);
    assert_eq!(report.error_kind, Some("invalid_plan"));
    assert!(report.error.as_deref().is_some_and(|error| error.contains("updates")));
    assert_eq!(report.status_code(), 400);
    assert_eq!(report.plan, Some(plan));
    assert!(transport.calls().await.is_empty());
}

#[tokio::test]
async fn protected_fields_are_never_written() {
    let transport = Arc::new(demo_transport());
    let plan = json!({
        "search_criteria": [["phone", "=", false]],
        "updates": {"id": 99},
        "description": "renumber"
    });
    let llm = Arc::new(ScriptedLlmClient::new().reply(plan.to_string()));
    let planner = planner_over(transport.clone(), llm).await;

    let report = planner.execute(&request("renumber every lead", false)).await;

    assert_eq!(report.error_kind, Some("invalid_plan"));
    assert!(transport.calls().await.is_empty());
}

#[tokio::test]
async fn unparseable_reply_is_reported_with_its_raw_text() {
    let reply = "I'm sorry, I can't produce a plan for that.";
    let llm = Arc::new(ScriptedLlmClient::new().reply(reply));
    let planner = planner_over(Arc::new(demo_transport()), llm).await;

    let report = planner.execute(&BulkUpdateRequest::preview(FILL_PHONES)).await;

    assert_eq!(report.error_kind, Some("plan_parse"));
    assert_eq!(report.raw_response.as_deref(), Some(reply));
    assert_eq!(report.status_code(), 400);
}

#[tokio::test]
async fn completion_failure_is_a_bad_gateway() {
    let llm = Arc::new(ScriptedLlmClient::new().fail(CompletionError::Http("timed out".to_string())));
    let planner = planner_over(Arc::new(demo_transport()), llm).await;

    let report = planner.execute(&BulkUpdateRequest::preview(FILL_PHONES)).await;

    assert_eq!(report.error_kind, Some("completion"));
    assert_eq!(report.status_code(), 502);
    assert_eq!(report.plan, None);
}

#[tokio::test]
async fn no_matches_is_not_an_error() {
    let plan = json!({
        "search_criteria": [["city", "=", "Tokio"]],
        "updates": {"priority": "3"},
        "description": "prioritise Tokyo"
    });
    let llm = Arc::new(ScriptedLlmClient::new().reply(plan.to_string()));
    let transport = Arc::new(demo_transport());
    let planner = planner_over(transport.clone(), llm).await;

    let report = planner.execute(&request("prioritise leads from Tokyo", false)).await;

    assert_eq!(report.status, BulkUpdateStatus::NoMatches);
    assert!(report.success);
    assert_eq!(report.found_records, 0);
    assert_eq!(transport.count_calls("write").await, 0);
}

#[tokio::test]
async fn refused_write_is_reported_as_not_applied() {
    let transport = Arc::new(demo_transport());
    transport.refuse_writes().await;
    let llm = Arc::new(ScriptedLlmClient::new().reply(fill_phones_plan()));
    let planner = planner_over(transport.clone(), llm).await;

    let report = planner.execute(&request(FILL_PHONES, false)).await;

    assert_eq!(report.error_kind, Some("not_applied"));
    assert_eq!(report.status_code(), 502);
}

#[tokio::test]
async fn invalid_requests_fail_before_the_language_model() {
    let llm = Arc::new(ScriptedLlmClient::repeating(fill_phones_plan()));
    let planner = planner_over(Arc::new(demo_transport()), llm.clone()).await;

    let blank = planner.execute(&BulkUpdateRequest::preview("   ")).await;
    let wrong_model = planner
        .execute(&BulkUpdateRequest { model: "sale.order".to_string(), ..BulkUpdateRequest::preview(FILL_PHONES) })
        .await;

    assert_eq!(blank.error_kind, Some("validation"));
    assert_eq!(wrong_model.error_kind, Some("validation"));
    assert_eq!(wrong_model.status_code(), 400);
    assert!(llm.requests().await.is_empty());
}
