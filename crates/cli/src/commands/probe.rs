//! Finds which database name the configured login works against.
//!
//! Every candidate gets one authentication attempt; authenticated
//! candidates also get a `crm.lead` count to confirm the CRM app answers.

use std::sync::Arc;
use std::time::Duration;

use leadbridge_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use leadbridge_odoo::fixtures::demo_transport;
use leadbridge_odoo::{Credentials, OdooGateway, OdooTransport, XmlRpcTransport};
use serde::Serialize;

use super::CommandResult;

/// Tried after the configured name when no candidate is given.
pub const COMMON_DATABASE_NAMES: &[&str] = &["odoo", "odoo_prod", "odoo_dev", "main", "default"];

#[derive(Debug, Serialize)]
pub struct CandidateOutcome {
    pub database: String,
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProbeReport {
    pub username: String,
    pub matched: Option<String>,
    pub candidates: Vec<CandidateOutcome>,
}

pub fn run(candidates: Vec<String>) -> CommandResult {
    let overrides = ConfigOverrides {
        odoo_database: candidates.first().cloned(),
        ..ConfigOverrides::default()
    };
    let config = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("probe", "config", error.to_string(), 2),
    };

    let transport: Arc<dyn OdooTransport> = if config.odoo.mock {
        Arc::new(demo_transport())
    } else {
        match XmlRpcTransport::new(&config.odoo.url, Duration::from_secs(config.odoo.timeout_secs)) {
            Ok(transport) => Arc::new(transport),
            Err(error) => {
                return CommandResult::failure("probe", "transport", error.to_string(), 2);
            }
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => return CommandResult::failure("probe", "runtime", error.to_string(), 2),
    };

    let names = candidate_names(&config.odoo.database, candidates);
    let report = runtime.block_on(probe(
        transport,
        &config.odoo.username,
        &config.odoo.password,
        &names,
    ));
    let exit_code = if report.matched.is_some() { 0 } else { 1 };

    CommandResult::json("probe", &report, exit_code)
}

/// Explicit candidates win; otherwise the configured name, then the common
/// ones. Duplicates and blanks are dropped.
pub fn candidate_names(configured: &str, explicit: Vec<String>) -> Vec<String> {
    let source: Vec<String> = if explicit.is_empty() {
        std::iter::once(configured.to_string())
            .chain(COMMON_DATABASE_NAMES.iter().map(|name| name.to_string()))
            .collect()
    } else {
        explicit
    };

    let mut names: Vec<String> = Vec::with_capacity(source.len());
    for name in source {
        let name = name.trim().to_string();
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

pub async fn probe(
    transport: Arc<dyn OdooTransport>,
    username: &str,
    password: &secrecy::SecretString,
    databases: &[String],
) -> ProbeReport {
    let mut candidates = Vec::with_capacity(databases.len());

    for database in databases {
        let credentials = Credentials {
            database: database.clone(),
            username: username.to_string(),
            password: password.clone(),
        };

        let outcome = match OdooGateway::connect(transport.clone(), credentials).await {
            Ok(gateway) => {
                let (lead_count, error) = match gateway.search_count("crm.lead", &[]).await {
                    Ok(count) => (Some(count), None),
                    Err(error) => (None, Some(format!("CRM check failed: {error}"))),
                };
                CandidateOutcome {
                    database: database.clone(),
                    authenticated: true,
                    uid: Some(gateway.uid()),
                    lead_count,
                    error,
                }
            }
            Err(error) => CandidateOutcome {
                database: database.clone(),
                authenticated: false,
                uid: None,
                lead_count: None,
                error: Some(error.to_string()),
            },
        };
        candidates.push(outcome);
    }

    let matched =
        candidates.iter().find(|outcome| outcome.authenticated).map(|outcome| outcome.database.clone());
    ProbeReport { username: username.to_string(), matched, candidates }
}

#[cfg(test)]
mod tests {
    use leadbridge_odoo::InMemoryTransport;
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn configured_name_leads_the_defaults() {
        let names = candidate_names("crm", Vec::new());

        assert_eq!(names[0], "crm");
        assert_eq!(names.len(), 1 + COMMON_DATABASE_NAMES.len());
    }

    #[test]
    fn explicit_candidates_are_deduplicated() {
        let names = candidate_names(
            "crm",
            vec!["a".to_string(), " a ".to_string(), String::new(), "b".to_string()],
        );

        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn only_the_accepting_database_matches() {
        let transport = InMemoryTransport::new().with_login("crm_prod", "bot@demo.test", "secret");
        let databases = vec!["odoo".to_string(), "crm_prod".to_string()];

        let report = probe(
            Arc::new(transport),
            "bot@demo.test",
            &SecretString::from("secret"),
            &databases,
        )
        .await;

        assert_eq!(report.matched.as_deref(), Some("crm_prod"));
        assert!(!report.candidates[0].authenticated);
        assert!(report.candidates[0].error.is_some());
        assert_eq!(report.candidates[1].uid, Some(2));
        assert_eq!(report.candidates[1].lead_count, Some(0));
    }

    #[tokio::test]
    async fn unreachable_backend_matches_nothing() {
        let transport = InMemoryTransport::new().unreachable();

        let report = probe(
            Arc::new(transport),
            "bot@demo.test",
            &SecretString::from("secret"),
            &["odoo".to_string()],
        )
        .await;

        assert!(report.matched.is_none());
        assert!(!report.candidates[0].authenticated);
    }
}
