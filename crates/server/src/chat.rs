//! Direct chat routes addressed by assistant id.
//!
//! - `POST /chat`   — post a message and wait for the reply
//! - `POST /upload` — upload a file into a thread without starting a run

use axum::{
    extract::{Multipart, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use switchboard_agent::{PrepareRequest, RunMode, RunRequest};
use switchboard_core::domain::run::AssistantRef;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub assistant_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub response: Value,
    pub thread_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat)).route("/upload", post(upload))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let (Some(content), Some(assistant_id)) = (non_empty(body.content), non_empty(body.assistant_id))
    else {
        return Err(ApiError::bad_request("Content and Assistant ID are required"));
    };

    let request = RunRequest::new(AssistantRef::Id(assistant_id), content)
        .with_thread(non_empty(body.thread_id));
    let reply = state.orchestrator.execute(request, RunMode::Synchronous).await?;

    Ok(Json(ChatResponse {
        response: reply.response_value(),
        thread_id: reply.thread_id().to_string(),
    }))
}

struct UploadForm {
    assistant_id: Option<String>,
    thread_id: Option<String>,
    file: Option<(String, Vec<u8>)>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm { assistant_id: None, thread_id: None, file: None };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "assistantId" => form.assistant_id = non_empty(field.text().await.ok()),
            // Browsers send the literal string "null" for an unset thread.
            "threadId" => {
                form.thread_id = non_empty(field.text().await.ok()).filter(|value| value != "null")
            }
            "file" => {
                let filename = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("invalid file part: {e}")))?;
                form.file = Some((filename, bytes.to_vec()));
            }
            _ => {}
        }
    }
    Ok(form)
}

async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ChatResponse>, ApiError> {
    let form = read_upload_form(multipart).await?;
    if form.assistant_id.is_none() {
        return Err(ApiError::bad_request("Assistant ID is required"));
    }
    let Some((filename, bytes)) = form.file else {
        return Err(ApiError::bad_request("No file uploaded"));
    };

    let failed = |error: ApiError| error.public("Error handling file upload");
    let file = state.preparer().upload(&filename, bytes).await.map_err(|e| failed(e.into()))?;
    let content = format!("file uploaded {filename}");
    let thread = state
        .preparer()
        .prepare(PrepareRequest {
            thread_id: form.thread_id,
            content: content.clone(),
            attachments: vec![file],
            ..PrepareRequest::default()
        })
        .await
        .map_err(|e| failed(e.into()))?;

    Ok(Json(ChatResponse { response: Value::String(content), thread_id: thread.id }))
}
