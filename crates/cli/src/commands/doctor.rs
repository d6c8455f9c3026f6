use secrecy::ExposeSecret;
use serde::Serialize;
use switchboard_core::config::AppConfig;
use switchboard_db::migrations;

use crate::commands::{load_config, with_database, Failure};

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

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Skipped, details: details.into() }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: &'static str,
    checks: Vec<DoctorCheck>,
}

const DEPENDENT_CHECKS: [&str; 3] =
    ["assistant_credentials", "telephony_readiness", "database_schema"];

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let checks = match load_config() {
        Ok(config) => vec![
            DoctorCheck::pass("config_validation", "configuration loaded and validated"),
            check_assistant_credentials(&config),
            check_telephony(&config),
            check_database_schema(&config),
        ],
        Err(failure) => {
            let mut checks = vec![DoctorCheck::fail("config_validation", failure.message)];
            checks.extend(DEPENDENT_CHECKS.into_iter().map(|name| {
                DoctorCheck::skipped(name, "skipped because configuration did not load")
            }));
            checks
        }
    };

    // Skipped checks (telephony off) do not fail the report.
    let healthy = checks.iter().all(|check| check.status != CheckStatus::Fail);
    DoctorReport {
        overall_status: if healthy { CheckStatus::Pass } else { CheckStatus::Fail },
        summary: if healthy {
            "doctor: all readiness checks passed"
        } else {
            "doctor: one or more readiness checks failed"
        },
        checks,
    }
}

fn check_assistant_credentials(config: &AppConfig) -> DoctorCheck {
    if config.assistant.api_key.expose_secret().trim().is_empty() {
        return DoctorCheck::fail("assistant_credentials", "assistant api key is empty");
    }
    DoctorCheck::pass(
        "assistant_credentials",
        format!("api key present for `{}`", config.assistant.base_url),
    )
}

fn check_telephony(config: &AppConfig) -> DoctorCheck {
    if !config.telephony.enabled {
        return DoctorCheck::skipped(
            "telephony_readiness",
            "telephony disabled; /telephony routes are not mounted",
        );
    }
    DoctorCheck::pass(
        "telephony_readiness",
        format!(
            "credentials present; replies sent from {}",
            config.telephony.phone_number.as_deref().unwrap_or("<unset>")
        ),
    )
}

fn check_database_schema(config: &AppConfig) -> DoctorCheck {
    let outcome = with_database(config, |pool| async move {
        let status = migrations::status(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), 5))?;
        if status.is_current() {
            Ok(format!("connected; {} migrations applied", status.applied))
        } else {
            Err(Failure::new(
                "migration",
                format!("{} pending migrations; run `switchboard migrate`", status.pending),
                5,
            ))
        }
    });

    match outcome {
        Ok(details) => DoctorCheck::pass("database_schema", details),
        Err(failure) => DoctorCheck::fail("database_schema", failure.message),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.to_string()];

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
