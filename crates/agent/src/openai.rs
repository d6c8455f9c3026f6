use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;

use switchboard_core::config::AssistantConfig;
use switchboard_core::domain::run::ToolOutput;

use crate::client::{
    Assistant, AssistantsApi, FileObject, FileUpload, Metadata, NewMessage, ProviderError, Run,
    Thread, ThreadMessage,
};

const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// Assistants v2 REST client.
pub struct OpenAiAssistants {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

#[derive(Deserialize)]
struct ListEnvelope<T> {
    data: Vec<T>,
}

#[derive(Deserialize)]
struct Transcription {
    text: String,
}

#[derive(Serialize)]
struct ToolOutputsBody<'a> {
    tool_outputs: Vec<ToolOutputWire<'a>>,
}

#[derive(Serialize)]
struct ToolOutputWire<'a> {
    tool_call_id: &'a str,
    output: &'a str,
}

impl OpenAiAssistants {
    pub fn new(config: &AssistantConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(http, config.base_url.clone(), config.api_key.clone()))
    }

    pub fn with_client(http: reqwest::Client, base_url: String, api_key: SecretString) -> Self {
        Self { http, base_url: base_url.trim_end_matches('/').to_string(), api_key }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(
                event_name = "provider.request_failed",
                status = status.as_u16(),
                "assistant provider rejected request"
            );
            return Err(ProviderError::Status { status: status.as_u16(), body });
        }

        serde_json::from_str(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AssistantsApi for OpenAiAssistants {
    async fn list_assistants(&self, limit: u32) -> Result<Vec<Assistant>, ProviderError> {
        let limit = limit.to_string();
        let request = self.get("assistants").query(&[("order", "asc"), ("limit", limit.as_str())]);
        let envelope: ListEnvelope<Assistant> = self.send(request).await?;
        Ok(envelope.data)
    }

    async fn create_thread(&self, metadata: &Metadata) -> Result<Thread, ProviderError> {
        self.send(self.post("threads").json(&json!({ "metadata": metadata }))).await
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ProviderError> {
        self.send(self.get(&format!("threads/{thread_id}"))).await
    }

    async fn create_message(
        &self,
        thread_id: &str,
        message: NewMessage,
    ) -> Result<ThreadMessage, ProviderError> {
        self.send(self.post(&format!("threads/{thread_id}/messages")).json(&message)).await
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, ProviderError> {
        let limit = limit.to_string();
        let request = self
            .get(&format!("threads/{thread_id}/messages"))
            .query(&[("order", "desc"), ("limit", limit.as_str())]);
        let envelope: ListEnvelope<ThreadMessage> = self.send(request).await?;
        Ok(envelope.data)
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ProviderError> {
        let request = self
            .post(&format!("threads/{thread_id}/runs"))
            .json(&json!({ "assistant_id": assistant_id }));
        self.send(request).await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ProviderError> {
        self.send(self.get(&format!("threads/{thread_id}/runs/{run_id}"))).await
    }

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ProviderError> {
        let body = ToolOutputsBody {
            tool_outputs: outputs
                .iter()
                .map(|output| ToolOutputWire {
                    tool_call_id: &output.tool_call_id,
                    output: &output.output,
                })
                .collect(),
        };
        let request =
            self.post(&format!("threads/{thread_id}/runs/{run_id}/submit_tool_outputs")).json(&body);
        self.send(request).await
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<FileObject, ProviderError> {
        let part = Part::bytes(upload.bytes).file_name(upload.filename.clone());
        let form = Form::new().text("purpose", upload.purpose.as_str()).part("file", part);
        self.send(self.post("files").multipart(form)).await
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ProviderError> {
        self.send(self.get(&format!("files/{file_id}"))).await
    }

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        model: &str,
    ) -> Result<String, ProviderError> {
        let part = Part::bytes(audio).file_name(filename.to_string());
        let form = Form::new().text("model", model.to_string()).part("file", part);
        let transcription: Transcription =
            self.send(self.post("audio/transcriptions").multipart(form)).await?;
        Ok(transcription.text)
    }
}
