//! Contract for the remote assistant provider and the wire types it exchanges.
//!
//! The orchestrator only ever talks to [`AssistantsApi`]; the reqwest implementation lives in
//! [`crate::openai`] and a scriptable fake in [`crate::memory`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use thiserror::Error;

use switchboard_core::domain::file::{FilePurpose, FileRef};
use switchboard_core::domain::run::{RunStatus, ToolCall, ToolOutput};

pub type Metadata = BTreeMap<String, String>;

/// Thread metadata key carrying the name of the assistant the thread was created for.
pub const ASSISTANT_NAME_METADATA_KEY: &str = "assistant_name";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assistant {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub model: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tools: Vec<AssistantTool>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AssistantTool {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDefinition>,
}

impl AssistantTool {
    pub fn function(name: impl Into<String>) -> Self {
        Self {
            kind: "function".to_string(),
            function: Some(FunctionDefinition { name: name.into(), description: None }),
        }
    }

    pub fn builtin(kind: impl Into<String>) -> Self {
        Self { kind: kind.into(), function: None }
    }

    /// Name shown to users: the function name for function tools, the tool type otherwise.
    pub fn display_name(&self) -> &str {
        self.function.as_ref().map(|function| function.name.as_str()).unwrap_or(&self.kind)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: Metadata,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub thread_id: String,
    #[serde(default)]
    pub assistant_id: String,
    pub status: RunStatus,
    #[serde(default)]
    pub required_action: Option<RequiredAction>,
    #[serde(default)]
    pub last_error: Option<Value>,
}

impl Run {
    /// Tool calls the run is waiting on, if the required action carries any.
    pub fn pending_tool_calls(&self) -> Option<Vec<ToolCall>> {
        let outputs = self.required_action.as_ref()?.submit_tool_outputs.as_ref()?;
        Some(outputs.tool_calls.iter().map(RunToolCall::to_tool_call).collect())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RequiredAction {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub submit_tool_outputs: Option<SubmitToolOutputs>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SubmitToolOutputs {
    pub tool_calls: Vec<RunToolCall>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl RunToolCall {
    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            call_id: self.id.clone(),
            function_name: self.function.name.clone(),
            arguments: self.function.arguments.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThreadMessage {
    pub id: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Vec<MessageContent>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<MessageText>,
}

impl MessageContent {
    pub fn text(value: impl Into<String>, annotations: Vec<Annotation>) -> Self {
        Self { kind: "text".to_string(), text: Some(MessageText { value: value.into(), annotations }) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageText {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub text: String,
    #[serde(rename = "type", default)]
    pub kind: String,
}

/// User message posted to a thread.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewMessage {
    pub role: &'static str,
    pub content: MessageBody,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<MessageAttachment>,
}

impl NewMessage {
    pub fn user_text(content: impl Into<String>, attachments: Vec<MessageAttachment>) -> Self {
        Self { role: "user", content: MessageBody::Text(content.into()), attachments }
    }

    pub fn user_image(file_id: impl Into<String>) -> Self {
        Self {
            role: "user",
            content: MessageBody::Parts(vec![ContentPart::ImageFile {
                image_file: ImageFile { file_id: file_id.into() },
            }]),
            attachments: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    ImageFile { image_file: ImageFile },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ImageFile {
    pub file_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MessageAttachment {
    pub file_id: String,
    pub tools: Vec<AttachmentTool>,
}

impl MessageAttachment {
    pub fn for_file(file: &FileRef) -> Self {
        Self {
            file_id: file.file_id.clone(),
            tools: vec![AttachmentTool { kind: file.capability().as_str() }],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AttachmentTool {
    #[serde(rename = "type")]
    pub kind: &'static str,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FileObject {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Clone, Debug)]
pub struct FileUpload {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub purpose: FilePurpose,
}

impl FileUpload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        let filename = filename.into();
        let purpose = switchboard_core::domain::file::purpose_for(&filename);
        Self { filename, bytes, purpose }
    }
}

#[async_trait]
pub trait AssistantsApi: Send + Sync {
    /// Assistants in ascending creation order.
    async fn list_assistants(&self, limit: u32) -> Result<Vec<Assistant>, ProviderError>;

    async fn create_thread(&self, metadata: &Metadata) -> Result<Thread, ProviderError>;

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ProviderError>;

    async fn create_message(
        &self,
        thread_id: &str,
        message: NewMessage,
    ) -> Result<ThreadMessage, ProviderError>;

    /// Messages newest first.
    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, ProviderError>;

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ProviderError>;

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> Result<Run, ProviderError>;

    async fn submit_tool_outputs(
        &self,
        thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ProviderError>;

    async fn upload_file(&self, upload: FileUpload) -> Result<FileObject, ProviderError>;

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ProviderError>;

    async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        model: &str,
    ) -> Result<String, ProviderError>;
}
