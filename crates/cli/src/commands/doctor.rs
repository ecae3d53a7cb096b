use leadbridge_core::config::{AppConfig, LoadOptions};
use leadbridge_odoo::OdooGateway;
use serde::Serialize;

use super::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    if json_output {
        CommandResult::json("doctor", &report, exit_code)
    } else {
        CommandResult::text(render_human(&report), exit_code)
    }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_key(&config));
            checks.push(check_odoo_authentication(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["llm_key_presence", "odoo_authentication"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_llm_key(config: &AppConfig) -> DoctorCheck {
    if config.llm_available() {
        return DoctorCheck {
            name: "llm_key_presence",
            status: CheckStatus::Pass,
            details: format!("api key present for model `{}`", config.llm.model),
        };
    }

    // Only mock mode loads without a key.
    DoctorCheck {
        name: "llm_key_presence",
        status: CheckStatus::Skipped,
        details: "no api key configured; language model tools will report errors".to_string(),
    }
}

fn check_odoo_authentication(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck {
                name: "odoo_authentication",
                status: CheckStatus::Fail,
                details: format!("failed to initialize async runtime: {error}"),
            };
        }
    };

    let result = runtime.block_on(async {
        let gateway = OdooGateway::from_config(&config.odoo).await?;
        Ok::<i64, leadbridge_odoo::GatewayError>(gateway.uid())
    });

    match result {
        Ok(uid) => {
            let target = if config.odoo.mock { "mock backend" } else { config.odoo.url.as_str() };
            DoctorCheck {
                name: "odoo_authentication",
                status: CheckStatus::Pass,
                details: format!(
                    "authenticated as `{}` (uid {uid}) on `{}` via {target}",
                    config.odoo.username, config.odoo.database
                ),
            }
        }
        Err(error) => DoctorCheck {
            name: "odoo_authentication",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_output_marks_each_check() {
        let report = DoctorReport {
            overall_status: CheckStatus::Fail,
            summary: "doctor: one or more readiness checks failed".to_string(),
            checks: vec![
                DoctorCheck {
                    name: "config_validation",
                    status: CheckStatus::Fail,
                    details: "odoo.url is required".to_string(),
                },
                DoctorCheck {
                    name: "odoo_authentication",
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                },
            ],
        };

        let rendered = render_human(&report);

        assert!(rendered.starts_with("doctor: one or more"));
        assert!(rendered.contains("- [fail] config_validation: odoo.url is required"));
        assert!(rendered.contains("- [skip] odoo_authentication"));
    }
}
