use std::env;
use std::sync::{Mutex, OnceLock};

use leadbridge_cli::commands::{config, doctor, probe};
use leadbridge_core::config::ENV_BINDINGS;
use serde_json::Value;

#[test]
fn doctor_passes_against_the_mock_backend() {
    with_env(&[("LEADBRIDGE_ODOO_MOCK", "true"), ("LEADBRIDGE_ODOO_USERNAME", "bot@demo.test")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "expected passing doctor run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks array");
        assert_eq!(checks.len(), 3);
        assert_eq!(checks[1]["name"], "llm_key_presence");
        assert_eq!(checks[1]["status"], "skipped");
        assert_eq!(checks[2]["name"], "odoo_authentication");
        assert_eq!(checks[2]["status"], "pass");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_human_output_lists_checks() {
    with_env(&[("LEADBRIDGE_ODOO_MOCK", "true")], || {
        let result = doctor::run(false);

        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] odoo_authentication"));
    });
}

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(
        &[
            ("LEADBRIDGE_ODOO_MOCK", "true"),
            ("ODOO_PASSWORD", "hunter2"),
            ("ANTHROPIC_API_KEY", "sk-ant-test"),
        ],
        || {
            let output = config::run();

            assert!(!output.contains("hunter2"));
            assert!(!output.contains("sk-ant-test"));
            assert!(output.contains("- odoo.password = <redacted> (source: env (ODOO_PASSWORD))"));
            assert!(output.contains("- llm.api_key = <redacted> (source: env (ANTHROPIC_API_KEY))"));
            assert!(output.contains("- odoo.mock = true (source: env (LEADBRIDGE_ODOO_MOCK))"));
            assert!(output.contains("- server.port = 8000 (source: default)"));
        },
    );
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed:"));
    });
}

#[test]
fn probe_matches_first_accepted_candidate_in_mock_mode() {
    with_env(&[("LEADBRIDGE_ODOO_MOCK", "true")], || {
        let result = probe::run(vec!["crm".to_string(), "crm_dev".to_string()]);
        assert_eq!(result.exit_code, 0, "expected a match: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["matched"], "crm");
        assert_eq!(payload["candidates"].as_array().map(Vec::len), Some(2));
        assert_eq!(payload["candidates"][0]["lead_count"], 8);
    });
}

#[test]
fn probe_fails_with_config_error_without_backend_settings() {
    with_env(&[], || {
        let result = probe::run(Vec::new());
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "probe");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys: Vec<&str> = ENV_BINDINGS.iter().flat_map(|(_, keys)| keys.iter().copied()).collect();

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
