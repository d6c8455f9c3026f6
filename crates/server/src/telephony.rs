//! Telephony webhook routes, mounted under `/telephony` when telephony is enabled.
//!
//! - `POST /telephony/in`         — inbound call: greet known callers and record a voicemail
//! - `POST /telephony/sms`        — inbound text (with media) answered by SMS
//! - `POST /telephony/transcribe` — finished recording: transcribe and answer by SMS
//! - `POST /telephony/adduser`    — register a correspondent

use std::sync::Arc;

use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use switchboard_agent::{Metadata, RunMode, RunRequest};
use switchboard_core::domain::correspondent::{Correspondent, CorrespondentKey};
use switchboard_core::domain::file::FileRef;
use switchboard_core::domain::run::AssistantRef;
use switchboard_db::repositories::RepositoryError;
use switchboard_telephony::twiml::{self, Record, VoiceResponse};
use switchboard_telephony::webhooks::{
    CallEvent, FormFields, InboundSms, MediaItem, RecordingCallback,
};
use switchboard_telephony::SmsReply;

use crate::error::ApiError;
use crate::state::{AppState, TelephonyState};

pub const TRANSCRIBE_CALLBACK: &str = "/telephony/transcribe";
const RECORD_TIMEOUT_SECS: u32 = 10;

#[derive(Debug, Serialize)]
pub struct Ack {
    pub status: &'static str,
    pub response: &'static str,
}

impl Ack {
    fn success(response: &'static str) -> Json<Self> {
        Json(Self { status: "success", response })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AddUserRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/in", post(incoming_call))
        .route("/sms", post(inbound_sms))
        .route("/transcribe", post(transcription))
        .route("/adduser", post(add_user))
        .fallback(invalid_endpoint)
}

async fn invalid_endpoint() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Invalid endpoint" }))).into_response()
}

fn telephony(state: &AppState) -> Result<&TelephonyState, ApiError> {
    state.telephony.as_ref().ok_or_else(|| ApiError::not_found("Invalid endpoint"))
}

fn voice(response: VoiceResponse) -> Response {
    ([(header::CONTENT_TYPE, twiml::CONTENT_TYPE)], response.to_xml()).into_response()
}

fn conversation_metadata(from: &str, to: &str) -> Metadata {
    Metadata::from([("from".to_string(), from.to_string()), ("to".to_string(), to.to_string())])
}

async fn incoming_call(
    State(state): State<AppState>,
    Form(form): Form<FormFields>,
) -> Result<Response, ApiError> {
    match CallEvent::from_form(&form)? {
        CallEvent::Inbound { from } => {
            let key = CorrespondentKey::new(&from);
            let response = match state.directory.correspondent(&key).await? {
                None => {
                    tracing::info!(event_name = "telephony.call_refused", caller = %key, "unknown caller");
                    VoiceResponse::new().say("No access to this number. Goodbye.").hangup()
                }
                Some(correspondent) => VoiceResponse::new()
                    .say(format!(
                        "Hi {}, this is a bot. How can I help you today?",
                        correspondent.display_name()
                    ))
                    .record(Record::new(RECORD_TIMEOUT_SECS, TRANSCRIBE_CALLBACK)),
            };
            Ok(voice(response))
        }
        CallEvent::Hangup => Ok(Ack::success("Call ended").into_response()),
    }
}

/// Downloads and re-uploads MMS media. Items that fail either step are logged and dropped.
async fn upload_media(
    state: &AppState,
    telephony: &TelephonyState,
    media: &[MediaItem],
) -> Vec<FileRef> {
    let millis = Utc::now().timestamp_millis();
    let mut files = Vec::with_capacity(media.len());
    for item in media {
        let bytes = match telephony.client.download(&item.url).await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::warn!(
                    event_name = "telephony.media_download_failed",
                    url = %item.url,
                    error = %error,
                    "skipping media"
                );
                continue;
            }
        };
        match state.preparer().upload(&item.filename(millis), bytes).await {
            Ok(file) => files.push(file),
            Err(error) => tracing::warn!(
                event_name = "telephony.media_upload_failed",
                url = %item.url,
                error = %error,
                "skipping media"
            ),
        }
    }
    files
}

async fn inbound_sms(
    State(state): State<AppState>,
    Form(form): Form<FormFields>,
) -> Result<Json<Ack>, ApiError> {
    let telephony = telephony(&state)?;
    let sms = InboundSms::from_form(&form)?;
    let key = CorrespondentKey::new(&sms.from);
    let metadata = conversation_metadata(&sms.from, &sms.to);

    let thread_id = match state.directory.resolve(&key, Utc::now()).await? {
        Some(thread_id) => thread_id,
        None => {
            let thread = state.preparer().resolve_thread(None, None, metadata.clone()).await?;
            state.directory.bind(&key, &thread.id, Utc::now()).await?;
            thread.id
        }
    };

    let attachments = upload_media(&state, telephony, &sms.media).await;
    let reply = SmsReply::new(state.api().clone(), telephony.client.clone(), sms.from.clone());
    let request = RunRequest::new(AssistantRef::Name(telephony.responder_assistant.clone()), sms.body)
        .with_thread(Some(thread_id.clone()))
        .with_metadata(metadata)
        .with_attachments(attachments);
    let queued = state.orchestrator.execute(request, RunMode::FireAndForget(Arc::new(reply))).await?;

    if queued.thread_id() != thread_id {
        state.directory.bind(&key, queued.thread_id(), Utc::now()).await?;
    }
    Ok(Ack::success("SMS received"))
}

async fn transcription(
    State(state): State<AppState>,
    Form(form): Form<FormFields>,
) -> Result<Json<Ack>, ApiError> {
    let telephony = telephony(&state)?;
    let callback = RecordingCallback::from_form(&form)?;
    let failed = |error: ApiError| error.public("Error processing transcription");

    let caller = telephony.client.caller_number(&callback.call_sid).await.map_err(|e| failed(e.into()))?;
    let key = CorrespondentKey::new(&caller);
    if state.directory.correspondent(&key).await?.is_none() {
        return Err(ApiError::not_found("Caller ID not allowed to use the service"));
    }

    let audio = telephony.client.download(&callback.recording_url).await.map_err(|e| failed(e.into()))?;
    let filename = format!("voicemail_{}.wav", Utc::now().timestamp_millis());
    let transcript = state
        .api()
        .transcribe(audio, &filename, &telephony.transcription_model)
        .await
        .map_err(|e| failed(e.into()))?;

    if transcript.trim().is_empty() {
        tracing::info!(event_name = "telephony.empty_transcript", caller = %key, "no transcription text");
        return Ok(Ack::success("Transcription received"));
    }

    let live_thread = state.directory.resolve(&key, Utc::now()).await?;
    let reply = SmsReply::new(state.api().clone(), telephony.client.clone(), key.as_str());
    let request = RunRequest::new(AssistantRef::Name(telephony.responder_assistant.clone()), transcript)
        .with_thread(live_thread.clone())
        .with_metadata(conversation_metadata(key.as_str(), &telephony.service_number));
    let queued = state
        .orchestrator
        .execute(request, RunMode::FireAndForget(Arc::new(reply)))
        .await
        .map_err(|e| failed(e.into()))?;

    if live_thread.as_deref() != Some(queued.thread_id()) {
        state.directory.bind(&key, queued.thread_id(), Utc::now()).await?;
    }
    Ok(Ack::success("Transcription received"))
}

async fn add_user(
    State(state): State<AppState>,
    Json(body): Json<AddUserRequest>,
) -> Result<Response, ApiError> {
    let present = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let (Some(name), Some(phone), Some(email)) =
        (present(body.name), present(body.phone), present(body.email))
    else {
        return Err(ApiError::bad_request("Missing required fields"));
    };

    let correspondent = Correspondent::new(CorrespondentKey::new(&phone), Some(name), Some(email), Utc::now());
    match state.directory.register(correspondent.clone()).await {
        Ok(()) => {}
        Err(RepositoryError::Conflict(_)) => return Err(ApiError::bad_request("User already exists")),
        Err(error) => return Err(ApiError::from(error).public("Error adding user")),
    }

    tracing::info!(event_name = "telephony.user_added", phone = %correspondent.phone, "registered correspondent");
    Ok((StatusCode::CREATED, Json(json!({ "status": "success", "user": correspondent }))).into_response())
}
