use std::sync::Arc;

use switchboard_agent::{AssistantsApi, CompletionHooks, RunOrchestrator, ThreadPreparer};
use switchboard_db::{DbPool, ThreadDirectory};
use switchboard_telephony::TelephonyClient;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub directory: ThreadDirectory,
    pub orchestrator: RunOrchestrator,
    pub hooks: Arc<CompletionHooks>,
    pub telephony: Option<TelephonyState>,
}

impl AppState {
    pub fn api(&self) -> &Arc<dyn AssistantsApi> {
        self.orchestrator.api()
    }

    pub fn preparer(&self) -> &ThreadPreparer {
        self.orchestrator.preparer()
    }
}

#[derive(Clone)]
pub struct TelephonyState {
    pub client: Arc<dyn TelephonyClient>,
    /// Assistant that answers texts and voicemails.
    pub responder_assistant: String,
    /// Our own number, recorded as `to` on phone-originated threads.
    pub service_number: String,
    pub transcription_model: String,
}
