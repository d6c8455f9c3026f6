use std::sync::Arc;

use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::info;

use switchboard_agent::openai::OpenAiAssistants;
use switchboard_agent::tools::{demo, scrape, ToolRegistryError};
use switchboard_agent::{
    AssistantsApi, CompletionHooks, ProviderError, RunOrchestrator, RunSettings, ToolRegistry,
};
use switchboard_core::config::{AppConfig, ConfigError, LoadOptions};
use switchboard_db::repositories::SqlCorrespondentRepository;
use switchboard_db::{connect_with_settings, migrations, DbPool, ThreadDirectory};
use switchboard_telephony::{TelephonyClient, TelephonyError, TwilioClient};

use crate::state::{AppState, TelephonyState};

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
    pub tracker: TaskTracker,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("assistant client setup failed: {0}")]
    Provider(#[from] ProviderError),
    #[error("telephony client setup failed: {0}")]
    Telephony(#[from] TelephonyError),
    #[error("tool registry setup failed: {0}")]
    Tools(#[from] ToolRegistryError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let api: Arc<dyn AssistantsApi> = Arc::new(OpenAiAssistants::new(&config.assistant)?);
    let telephony: Option<Arc<dyn TelephonyClient>> = if config.telephony.enabled {
        Some(Arc::new(TwilioClient::new(&config.telephony)?))
    } else {
        None
    };

    let tracker = TaskTracker::new();
    let state = assemble_state(&config, db_pool, api, telephony, tracker.clone())?;
    info!(
        event_name = "system.bootstrap.ready",
        correlation_id = "bootstrap",
        tools = ?state.orchestrator.tools().names(),
        telephony = state.telephony.is_some(),
        "application assembled"
    );

    Ok(Application { config, state, tracker })
}

/// Wires the runtime graph around already-constructed provider clients.
pub fn assemble_state(
    config: &AppConfig,
    db_pool: DbPool,
    api: Arc<dyn AssistantsApi>,
    telephony: Option<Arc<dyn TelephonyClient>>,
    tracker: TaskTracker,
) -> Result<AppState, ToolRegistryError> {
    let settings = RunSettings::from_config(&config.assistant);

    // Nested research runs get no tools of their own.
    let research =
        RunOrchestrator::new(api.clone(), Arc::new(ToolRegistry::empty()), settings).with_tracker(tracker.clone());
    let registry = ToolRegistry::from_modules([
        demo::tools(research),
        scrape::tools(reqwest::Client::new(), &config.search),
    ])?;
    let orchestrator = RunOrchestrator::new(api.clone(), Arc::new(registry), settings).with_tracker(tracker);

    let directory = ThreadDirectory::new(
        Arc::new(SqlCorrespondentRepository::new(db_pool.clone())),
        config.thread_expiration(),
    );

    let telephony = telephony.map(|client| TelephonyState {
        client,
        responder_assistant: config.telephony.responder_assistant.clone(),
        service_number: config.telephony.phone_number.clone().unwrap_or_default(),
        transcription_model: config.assistant.transcription_model.clone(),
    });

    Ok(AppState {
        db_pool,
        directory,
        orchestrator,
        hooks: Arc::new(CompletionHooks::with_defaults(api)),
        telephony,
    })
}

#[cfg(test)]
mod tests {
    use switchboard_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    fn overrides(database_url: &str, telephony_enabled: bool) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                database_url: Some(database_url.to_string()),
                assistant_api_key: Some("sk-test".to_string()),
                telephony_enabled: Some(telephony_enabled),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_registers_tools_and_creates_schema() {
        let app = bootstrap(overrides("sqlite::memory:", false)).await.expect("bootstrap");

        assert_eq!(
            app.state.orchestrator.tools().names(),
            vec!["company_research", "google_search", "webscrape"]
        );
        assert!(app.state.telephony.is_none());

        let tables: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'correspondent'",
        )
        .fetch_one(&app.state.db_pool)
        .await
        .expect("schema query");
        assert_eq!(tables, 1);

        app.state.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_when_telephony_credentials_are_missing() {
        let result = bootstrap(overrides("sqlite::memory:", true)).await;

        let message = result.err().expect("error").to_string();
        assert!(message.contains("telephony"));
    }
}
