use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub assistant: AssistantConfig,
    pub telephony: TelephonyConfig,
    pub threads: ThreadsConfig,
    pub search: SearchConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AssistantConfig {
    pub api_key: SecretString,
    pub base_url: String,
    pub timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_poll_attempts: Option<u32>,
    pub max_run_secs: Option<u64>,
    pub transcription_model: String,
}

#[derive(Clone, Debug)]
pub struct TelephonyConfig {
    pub enabled: bool,
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
    pub phone_number: Option<String>,
    pub responder_assistant: String,
    pub api_base_url: String,
}

#[derive(Clone, Debug)]
pub struct ThreadsConfig {
    pub expiration_days: u32,
}

#[derive(Clone, Debug)]
pub struct SearchConfig {
    pub api_key: Option<SecretString>,
    pub cx: Option<String>,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub assistant_api_key: Option<String>,
    pub assistant_base_url: Option<String>,
    pub server_port: Option<u16>,
    pub telephony_enabled: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://switchboard.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            assistant: AssistantConfig {
                api_key: String::new().into(),
                base_url: "https://api.openai.com/v1".to_string(),
                timeout_secs: 60,
                poll_interval_ms: 1000,
                max_poll_attempts: None,
                max_run_secs: None,
                transcription_model: "whisper-1".to_string(),
            },
            telephony: TelephonyConfig {
                enabled: false,
                account_sid: None,
                auth_token: None,
                phone_number: None,
                responder_assistant: "Text Responder".to_string(),
                api_base_url: "https://api.twilio.com".to_string(),
            },
            threads: ThreadsConfig { expiration_days: 60 },
            search: SearchConfig {
                api_key: None,
                cx: None,
                base_url: "https://www.googleapis.com/customsearch/v1".to_string(),
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 3000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("switchboard.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn thread_expiration(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.threads.expiration_days))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(assistant) = patch.assistant {
            if let Some(api_key) = assistant.api_key {
                self.assistant.api_key = secret_value(api_key);
            }
            if let Some(base_url) = assistant.base_url {
                self.assistant.base_url = base_url;
            }
            if let Some(timeout_secs) = assistant.timeout_secs {
                self.assistant.timeout_secs = timeout_secs;
            }
            if let Some(poll_interval_ms) = assistant.poll_interval_ms {
                self.assistant.poll_interval_ms = poll_interval_ms;
            }
            if let Some(max_poll_attempts) = assistant.max_poll_attempts {
                self.assistant.max_poll_attempts = Some(max_poll_attempts);
            }
            if let Some(max_run_secs) = assistant.max_run_secs {
                self.assistant.max_run_secs = Some(max_run_secs);
            }
            if let Some(transcription_model) = assistant.transcription_model {
                self.assistant.transcription_model = transcription_model;
            }
        }

        if let Some(telephony) = patch.telephony {
            if let Some(enabled) = telephony.enabled {
                self.telephony.enabled = enabled;
            }
            if let Some(account_sid) = telephony.account_sid {
                self.telephony.account_sid = Some(account_sid);
            }
            if let Some(auth_token) = telephony.auth_token {
                self.telephony.auth_token = Some(secret_value(auth_token));
            }
            if let Some(phone_number) = telephony.phone_number {
                self.telephony.phone_number = Some(phone_number);
            }
            if let Some(responder_assistant) = telephony.responder_assistant {
                self.telephony.responder_assistant = responder_assistant;
            }
            if let Some(api_base_url) = telephony.api_base_url {
                self.telephony.api_base_url = api_base_url;
            }
        }

        if let Some(threads) = patch.threads {
            if let Some(expiration_days) = threads.expiration_days {
                self.threads.expiration_days = expiration_days;
            }
        }

        if let Some(search) = patch.search {
            if let Some(api_key) = search.api_key {
                self.search.api_key = Some(secret_value(api_key));
            }
            if let Some(cx) = search.cx {
                self.search.cx = Some(cx);
            }
            if let Some(base_url) = search.base_url {
                self.search.base_url = base_url;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SWITCHBOARD_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SWITCHBOARD_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SWITCHBOARD_DATABASE_TIMEOUT_SECS", &value)?;
        }

        let api_key =
            read_env("SWITCHBOARD_ASSISTANT_API_KEY").or_else(|| read_env("OPENAI_API_KEY"));
        if let Some(value) = api_key {
            self.assistant.api_key = secret_value(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_ASSISTANT_BASE_URL") {
            self.assistant.base_url = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_ASSISTANT_TIMEOUT_SECS") {
            self.assistant.timeout_secs = parse_u64("SWITCHBOARD_ASSISTANT_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_ASSISTANT_POLL_INTERVAL_MS") {
            self.assistant.poll_interval_ms =
                parse_u64("SWITCHBOARD_ASSISTANT_POLL_INTERVAL_MS", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_ASSISTANT_MAX_POLL_ATTEMPTS") {
            self.assistant.max_poll_attempts =
                Some(parse_u32("SWITCHBOARD_ASSISTANT_MAX_POLL_ATTEMPTS", &value)?);
        }
        if let Some(value) = read_env("SWITCHBOARD_ASSISTANT_MAX_RUN_SECS") {
            self.assistant.max_run_secs =
                Some(parse_u64("SWITCHBOARD_ASSISTANT_MAX_RUN_SECS", &value)?);
        }
        if let Some(value) = read_env("SWITCHBOARD_ASSISTANT_TRANSCRIPTION_MODEL") {
            self.assistant.transcription_model = value;
        }

        if let Some(value) = read_env("SWITCHBOARD_TELEPHONY_ENABLED") {
            self.telephony.enabled = parse_bool("SWITCHBOARD_TELEPHONY_ENABLED", &value)?;
        }
        let account_sid =
            read_env("SWITCHBOARD_TELEPHONY_ACCOUNT_SID").or_else(|| read_env("TWILIO_ACCOUNT_SID"));
        if let Some(value) = account_sid {
            self.telephony.account_sid = Some(value);
        }
        let auth_token =
            read_env("SWITCHBOARD_TELEPHONY_AUTH_TOKEN").or_else(|| read_env("TWILIO_AUTH_TOKEN"));
        if let Some(value) = auth_token {
            self.telephony.auth_token = Some(secret_value(value));
        }
        let phone_number = read_env("SWITCHBOARD_TELEPHONY_PHONE_NUMBER")
            .or_else(|| read_env("TWILIO_PHONE_NUMBER"));
        if let Some(value) = phone_number {
            self.telephony.phone_number = Some(value);
        }
        if let Some(value) = read_env("SWITCHBOARD_TELEPHONY_RESPONDER_ASSISTANT") {
            self.telephony.responder_assistant = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_TELEPHONY_API_BASE_URL") {
            self.telephony.api_base_url = value;
        }

        if let Some(value) = read_env("SWITCHBOARD_THREADS_EXPIRATION_DAYS") {
            self.threads.expiration_days =
                parse_u32("SWITCHBOARD_THREADS_EXPIRATION_DAYS", &value)?;
        }

        let search_key = read_env("SWITCHBOARD_SEARCH_API_KEY")
            .or_else(|| read_env("GOOGLE_SEARCH_DEVELOPER_KEY"));
        if let Some(value) = search_key {
            self.search.api_key = Some(secret_value(value));
        }
        let search_cx =
            read_env("SWITCHBOARD_SEARCH_CX").or_else(|| read_env("GOOGLE_SEARCH_CX_ID"));
        if let Some(value) = search_cx {
            self.search.cx = Some(value);
        }

        if let Some(value) = read_env("SWITCHBOARD_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SWITCHBOARD_SERVER_PORT") {
            self.server.port = parse_u16("SWITCHBOARD_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SWITCHBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SWITCHBOARD_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("SWITCHBOARD_LOGGING_LEVEL").or_else(|| read_env("SWITCHBOARD_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SWITCHBOARD_LOGGING_FORMAT").or_else(|| read_env("SWITCHBOARD_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(api_key) = overrides.assistant_api_key {
            self.assistant.api_key = secret_value(api_key);
        }
        if let Some(base_url) = overrides.assistant_base_url {
            self.assistant.base_url = base_url;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(enabled) = overrides.telephony_enabled {
            self.telephony.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_assistant(&self.assistant)?;
        validate_telephony(&self.telephony)?;
        validate_threads(&self.threads)?;
        validate_search(&self.search)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("switchboard.toml"), PathBuf::from("config/switchboard.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_assistant(assistant: &AssistantConfig) -> Result<(), ConfigError> {
    if assistant.api_key.expose_secret().trim().is_empty() {
        return Err(ConfigError::Validation(
            "assistant.api_key is required. Set SWITCHBOARD_ASSISTANT_API_KEY or OPENAI_API_KEY"
                .to_string(),
        ));
    }

    validate_http_url("assistant.base_url", &assistant.base_url)?;

    if assistant.timeout_secs == 0 || assistant.timeout_secs > 600 {
        return Err(ConfigError::Validation(
            "assistant.timeout_secs must be in range 1..=600".to_string(),
        ));
    }

    if assistant.poll_interval_ms == 0 || assistant.poll_interval_ms > 60_000 {
        return Err(ConfigError::Validation(
            "assistant.poll_interval_ms must be in range 1..=60000".to_string(),
        ));
    }

    if assistant.max_poll_attempts == Some(0) {
        return Err(ConfigError::Validation(
            "assistant.max_poll_attempts must be greater than zero when set".to_string(),
        ));
    }

    if assistant.max_run_secs == Some(0) {
        return Err(ConfigError::Validation(
            "assistant.max_run_secs must be greater than zero when set".to_string(),
        ));
    }

    if assistant.transcription_model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "assistant.transcription_model must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_telephony(telephony: &TelephonyConfig) -> Result<(), ConfigError> {
    validate_http_url("telephony.api_base_url", &telephony.api_base_url)?;

    if telephony.responder_assistant.trim().is_empty() {
        return Err(ConfigError::Validation(
            "telephony.responder_assistant must not be empty".to_string(),
        ));
    }

    if !telephony.enabled {
        return Ok(());
    }

    let missing_sid =
        telephony.account_sid.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
    if missing_sid {
        return Err(ConfigError::Validation(
            "telephony.account_sid is required when telephony.enabled is true".to_string(),
        ));
    }

    let missing_token = telephony
        .auth_token
        .as_ref()
        .map(|value| value.expose_secret().trim().is_empty())
        .unwrap_or(true);
    if missing_token {
        return Err(ConfigError::Validation(
            "telephony.auth_token is required when telephony.enabled is true".to_string(),
        ));
    }

    let missing_number =
        telephony.phone_number.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
    if missing_number {
        return Err(ConfigError::Validation(
            "telephony.phone_number is required when telephony.enabled is true".to_string(),
        ));
    }

    Ok(())
}

fn validate_threads(threads: &ThreadsConfig) -> Result<(), ConfigError> {
    if threads.expiration_days == 0 {
        return Err(ConfigError::Validation(
            "threads.expiration_days must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_search(search: &SearchConfig) -> Result<(), ConfigError> {
    validate_http_url("search.base_url", &search.base_url)
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn validate_http_url(key: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must start with http:// or https://")))
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    assistant: Option<AssistantPatch>,
    telephony: Option<TelephonyPatch>,
    threads: Option<ThreadsPatch>,
    search: Option<SearchPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AssistantPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    max_poll_attempts: Option<u32>,
    max_run_secs: Option<u64>,
    transcription_model: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct TelephonyPatch {
    enabled: Option<bool>,
    account_sid: Option<String>,
    auth_token: Option<String>,
    phone_number: Option<String>,
    responder_assistant: Option<String>,
    api_base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ThreadsPatch {
    expiration_days: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SearchPatch {
    api_key: Option<String>,
    cx: Option<String>,
    base_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
