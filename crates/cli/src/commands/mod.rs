pub mod config;
pub mod correspondent;
pub mod doctor;
pub mod migrate;

use std::future::Future;

use serde::Serialize;
use switchboard_core::config::{AppConfig, LoadOptions};
use switchboard_db::{connect_with_settings, DbPool};

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: &'static str,
    error_class: Option<&'a str>,
    message: String,
}

/// A command failure with its error class and process exit code.
#[derive(Debug)]
pub struct Failure {
    pub error_class: &'static str,
    pub message: String,
    pub exit_code: u8,
}

impl Failure {
    pub fn new(error_class: &'static str, message: impl Into<String>, exit_code: u8) -> Self {
        Self { error_class, message: message.into(), exit_code }
    }
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload =
            CommandOutcome { command, status: "ok", error_class: None, message: message.into() };
        Self { exit_code: 0, output: serialize_payload(&payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command,
            status: "error",
            error_class: Some(error_class),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(&payload) }
    }

    pub fn from_outcome(command: &str, outcome: Result<String, Failure>) -> Self {
        match outcome {
            Ok(message) => Self::success(command, message),
            Err(failure) => {
                Self::failure(command, failure.error_class, failure.message, failure.exit_code)
            }
        }
    }
}

pub fn load_config() -> Result<AppConfig, Failure> {
    AppConfig::load(LoadOptions::default())
        .map_err(|error| Failure::new("config_validation", format!("configuration issue: {error}"), 2))
}

/// Runs `work` against a freshly opened pool on a single-threaded runtime, closing the pool after.
pub fn with_database<F, Fut>(config: &AppConfig, work: F) -> Result<String, Failure>
where
    F: FnOnce(DbPool) -> Fut,
    Fut: Future<Output = Result<String, Failure>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(
        |error| Failure::new("runtime_init", format!("failed to initialize async runtime: {error}"), 3),
    )?;

    runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| Failure::new("db_connectivity", error.to_string(), 4))?;
        let outcome = work(pool.clone()).await;
        pool.close().await;
        outcome
    })
}

/// Loads config, then runs `work` through [`with_database`], rendering the JSON outcome.
pub fn run_with_database<F, Fut>(command: &str, work: F) -> CommandResult
where
    F: FnOnce(DbPool) -> Fut,
    Fut: Future<Output = Result<String, Failure>>,
{
    let outcome = load_config().and_then(|config| with_database(&config, work));
    CommandResult::from_outcome(command, outcome)
}

fn serialize_payload(payload: &CommandOutcome<'_>) -> String {
    serde_json::to_string(payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
