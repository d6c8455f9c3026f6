use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use switchboard_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    render(&config, config_file_doc.as_ref(), config_file_path.as_deref())
}

pub fn render(config: &AppConfig, config_file_doc: Option<&Value>, config_file_path: Option<&Path>) -> String {
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc, config_file_path)
    };
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["SWITCHBOARD_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["SWITCHBOARD_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["SWITCHBOARD_DATABASE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "assistant.api_key",
        &redact_token(config.assistant.api_key.expose_secret()),
        source("assistant.api_key", &["SWITCHBOARD_ASSISTANT_API_KEY", "OPENAI_API_KEY"]),
    ));
    lines.push(render_line(
        "assistant.base_url",
        &config.assistant.base_url,
        source("assistant.base_url", &["SWITCHBOARD_ASSISTANT_BASE_URL"]),
    ));
    lines.push(render_line(
        "assistant.poll_interval_ms",
        &config.assistant.poll_interval_ms.to_string(),
        source("assistant.poll_interval_ms", &["SWITCHBOARD_ASSISTANT_POLL_INTERVAL_MS"]),
    ));
    lines.push(render_line(
        "assistant.max_poll_attempts",
        &optional(config.assistant.max_poll_attempts),
        source("assistant.max_poll_attempts", &["SWITCHBOARD_ASSISTANT_MAX_POLL_ATTEMPTS"]),
    ));
    lines.push(render_line(
        "assistant.max_run_secs",
        &optional(config.assistant.max_run_secs),
        source("assistant.max_run_secs", &["SWITCHBOARD_ASSISTANT_MAX_RUN_SECS"]),
    ));

    lines.push(render_line(
        "telephony.enabled",
        &config.telephony.enabled.to_string(),
        source("telephony.enabled", &["SWITCHBOARD_TELEPHONY_ENABLED"]),
    ));
    lines.push(render_line(
        "telephony.account_sid",
        config.telephony.account_sid.as_deref().unwrap_or("<unset>"),
        source("telephony.account_sid", &["SWITCHBOARD_TELEPHONY_ACCOUNT_SID", "TWILIO_ACCOUNT_SID"]),
    ));
    let auth_token = if config.telephony.auth_token.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "telephony.auth_token",
        auth_token,
        source("telephony.auth_token", &["SWITCHBOARD_TELEPHONY_AUTH_TOKEN", "TWILIO_AUTH_TOKEN"]),
    ));
    lines.push(render_line(
        "telephony.phone_number",
        config.telephony.phone_number.as_deref().unwrap_or("<unset>"),
        source(
            "telephony.phone_number",
            &["SWITCHBOARD_TELEPHONY_PHONE_NUMBER", "TWILIO_PHONE_NUMBER"],
        ),
    ));
    lines.push(render_line(
        "telephony.responder_assistant",
        &config.telephony.responder_assistant,
        source("telephony.responder_assistant", &["SWITCHBOARD_TELEPHONY_RESPONDER_ASSISTANT"]),
    ));

    lines.push(render_line(
        "threads.expiration_days",
        &config.threads.expiration_days.to_string(),
        source("threads.expiration_days", &["SWITCHBOARD_THREADS_EXPIRATION_DAYS"]),
    ));

    let search_key = if config.search.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "search.api_key",
        search_key,
        source("search.api_key", &["SWITCHBOARD_SEARCH_API_KEY", "GOOGLE_SEARCH_DEVELOPER_KEY"]),
    ));
    lines.push(render_line(
        "search.cx",
        config.search.cx.as_deref().unwrap_or("<unset>"),
        source("search.cx", &["SWITCHBOARD_SEARCH_CX", "GOOGLE_SEARCH_CX_ID"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["SWITCHBOARD_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["SWITCHBOARD_SERVER_PORT"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["SWITCHBOARD_LOGGING_LEVEL", "SWITCHBOARD_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["SWITCHBOARD_LOGGING_FORMAT", "SWITCHBOARD_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn optional<T: ToString>(value: Option<T>) -> String {
    value.map(|value| value.to_string()).unwrap_or_else(|| "<unbounded>".to_string())
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("switchboard.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/switchboard.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
