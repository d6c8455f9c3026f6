//! Assistant routes.
//!
//! - `POST /assistant/{assistant_name}` — run a named assistant, waiting or fire-and-forget
//! - `GET  /assistants`                 — list assistants with tool availability

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use switchboard_agent::assistants::list_assistant_summaries;
use switchboard_agent::{Metadata, RunMode, RunRequest};
use switchboard_core::domain::file::FileInput;
use switchboard_core::domain::run::AssistantRef;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantCallRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file_ids: Vec<FileInput>,
    #[serde(default)]
    pub when_done: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantCallResponse {
    pub response: Value,
    pub status_code: u16,
    pub thread_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/assistant/{assistant_name}", post(call_assistant))
        .route("/assistants", get(list_assistants))
}

/// Thread metadata values are strings; other JSON values keep their JSON text.
pub fn metadata_from_json(raw: Option<Map<String, Value>>) -> Metadata {
    raw.unwrap_or_default()
        .into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => (key, text),
            other => (key, other.to_string()),
        })
        .collect()
}

async fn call_assistant(
    Path(assistant_name): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<AssistantCallRequest>,
) -> Result<Response, ApiError> {
    let mode = match body.when_done.as_deref().filter(|name| !name.is_empty()) {
        None => RunMode::Synchronous,
        Some(name) => match state.hooks.get(name) {
            Some(hook) => RunMode::FireAndForget(hook),
            None => return Err(ApiError::bad_request(format!("Unknown whenDone hook '{name}'"))),
        },
    };

    let attachments = state.preparer().resolve_files(body.file_ids).await;
    let request = RunRequest::new(AssistantRef::Name(assistant_name), body.content)
        .with_metadata(metadata_from_json(body.metadata))
        .with_attachments(attachments);
    let reply = state.orchestrator.execute(request, mode).await?;

    let status_code = reply.status_code();
    let status = StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let payload = AssistantCallResponse {
        response: reply.response_value(),
        status_code,
        thread_id: reply.thread_id().to_string(),
    };
    Ok((status, Json(payload)).into_response())
}

async fn list_assistants(State(state): State<AppState>) -> Response {
    match list_assistant_summaries(state.api().as_ref(), state.orchestrator.tools()).await {
        Ok(assistants) => Json(assistants).into_response(),
        Err(error) => {
            tracing::warn!(
                event_name = "assistants.list_failed",
                error = %error,
                "could not list assistants"
            );
            Json(json!({ "assistants": [] })).into_response()
        }
    }
}
