use std::env;
use std::sync::{Mutex, OnceLock};

use switchboard_cli::commands::{correspondent, doctor, migrate};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[("SWITCHBOARD_ASSISTANT_API_KEY", "sk-test"), ("SWITCHBOARD_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_returns_config_failure_without_api_key() {
    with_env(&[("SWITCHBOARD_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_reports_pending_migrations_until_migrate_runs() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("switchboard.db").display());

    with_env(&[("OPENAI_API_KEY", "sk-test"), ("SWITCHBOARD_DATABASE_URL", &url)], || {
        let report: Value = serde_json::from_str(&doctor::run(true)).expect("doctor json");
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][3]["name"], "database_schema");
        assert!(report["checks"][3]["details"].as_str().unwrap_or("").contains("pending migrations"));

        let migrated = migrate::run();
        assert_eq!(migrated.exit_code, 0, "expected migrate to succeed");
        assert!(parse_payload(&migrated.output)["message"]
            .as_str()
            .unwrap_or("")
            .starts_with("applied"));

        let report: Value = serde_json::from_str(&doctor::run(true)).expect("doctor json");
        assert_eq!(report["overall_status"], "pass");

        let statuses: Vec<(&str, &str)> = report["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .map(|check| {
                (check["name"].as_str().unwrap_or(""), check["status"].as_str().unwrap_or(""))
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("config_validation", "pass"),
                ("assistant_credentials", "pass"),
                ("telephony_readiness", "skipped"),
                ("database_schema", "pass"),
            ]
        );

        let again = migrate::run();
        assert!(parse_payload(&again.output)["message"]
            .as_str()
            .unwrap_or("")
            .starts_with("schema up to date"));
    });
}

#[test]
fn doctor_fails_when_config_does_not_load() {
    with_env(&[], || {
        let report: Value = serde_json::from_str(&doctor::run(true)).expect("doctor json");
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(report["checks"][0]["name"], "config_validation");
        assert_eq!(report["checks"][0]["status"], "fail");

        let human = doctor::run(false);
        assert!(human.starts_with("doctor: one or more readiness checks failed"));
        assert!(human.contains("- [skip] database_schema"));
    });
}

#[test]
fn add_correspondent_registers_once() {
    let dir = tempfile::tempdir().expect("temp dir");
    let url = format!("sqlite://{}", dir.path().join("switchboard.db").display());

    with_env(&[("SWITCHBOARD_ASSISTANT_API_KEY", "sk-test"), ("SWITCHBOARD_DATABASE_URL", &url)], || {
        let first = correspondent::run("+15551234567", "Ada", "ada@example.com");
        assert_eq!(first.exit_code, 0, "expected first registration to succeed");
        let payload = parse_payload(&first.output);
        assert_eq!(payload["command"], "add-correspondent");
        assert_eq!(payload["status"], "ok");

        let second = correspondent::run(" +15551234567 ", "Ada", "ada@example.com");
        assert_eq!(second.exit_code, 6, "expected duplicate phone to conflict");
        let payload = parse_payload(&second.output);
        assert_eq!(payload["error_class"], "conflict");
        assert_eq!(payload["message"], "User already exists");
    });
}

#[test]
fn add_correspondent_requires_every_field() {
    with_env(
        &[("SWITCHBOARD_ASSISTANT_API_KEY", "sk-test"), ("SWITCHBOARD_DATABASE_URL", "sqlite::memory:")],
        || {
            let result = correspondent::run("+15551234567", "  ", "ada@example.com");
            assert_eq!(result.exit_code, 2);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["error_class"], "invalid_input");
            assert_eq!(payload["message"], "Missing required fields");
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SWITCHBOARD_DATABASE_URL",
        "SWITCHBOARD_DATABASE_MAX_CONNECTIONS",
        "SWITCHBOARD_DATABASE_TIMEOUT_SECS",
        "SWITCHBOARD_ASSISTANT_API_KEY",
        "SWITCHBOARD_ASSISTANT_BASE_URL",
        "SWITCHBOARD_ASSISTANT_MAX_POLL_ATTEMPTS",
        "SWITCHBOARD_TELEPHONY_ENABLED",
        "SWITCHBOARD_TELEPHONY_ACCOUNT_SID",
        "SWITCHBOARD_TELEPHONY_AUTH_TOKEN",
        "SWITCHBOARD_TELEPHONY_PHONE_NUMBER",
        "SWITCHBOARD_SERVER_BIND_ADDRESS",
        "SWITCHBOARD_SERVER_PORT",
        "SWITCHBOARD_LOGGING_LEVEL",
        "SWITCHBOARD_LOGGING_FORMAT",
        "SWITCHBOARD_LOG_LEVEL",
        "SWITCHBOARD_LOG_FORMAT",
        "OPENAI_API_KEY",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_PHONE_NUMBER",
    ];

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
