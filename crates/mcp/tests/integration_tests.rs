//! Server handshake data as a client sees it.

use std::sync::Arc;

use leadbridge_agent::llm::UnconfiguredLlm;
use leadbridge_agent::Toolkit;
use leadbridge_core::config::PlannerConfig;
use leadbridge_mcp::{LeadbridgeMcpServer, ASSISTANT_TOOLS, DIAGNOSTIC_TOOLS, RECORD_TOOLS};
use leadbridge_odoo::fixtures::demo_transport;
use leadbridge_odoo::{Credentials, OdooGateway};
use rmcp::ServerHandler;
use secrecy::SecretString;

async fn test_server() -> LeadbridgeMcpServer {
    let credentials = Credentials {
        database: "demo".to_string(),
        username: "bot@demo.test".to_string(),
        password: SecretString::from("secret"),
    };
    let gateway =
        OdooGateway::connect(Arc::new(demo_transport()), credentials).await.expect("connects");
    let toolkit = Toolkit::new(
        Arc::new(gateway),
        Arc::new(UnconfiguredLlm::new("claude-test")),
        false,
        PlannerConfig { default_max_records: 10, max_records_ceiling: 100 },
    );
    LeadbridgeMcpServer::new(Arc::new(toolkit))
}

#[tokio::test]
async fn test_server_info_advertises_tools() {
    let info = test_server().await.get_info();

    assert!(info.capabilities.tools.is_some());
    let instructions = info.instructions.expect("instructions");
    assert!(instructions.contains("dry run"));
}

#[test]
fn test_tool_catalogue_has_no_duplicates() {
    let mut names: Vec<&str> =
        RECORD_TOOLS.iter().chain(ASSISTANT_TOOLS).chain(DIAGNOSTIC_TOOLS).copied().collect();
    let total = names.len();
    names.sort_unstable();
    names.dedup();

    assert_eq!(names.len(), total);
    assert!(names.contains(&"execute_natural_update"));
}
