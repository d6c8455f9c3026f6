//! Scriptable in-process stand-in for the assistant provider.
//!
//! Each created run consumes one script from the queue; every status poll advances the script by
//! one step. Everything the orchestrator sends is recorded for inspection.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use switchboard_core::domain::run::{RunStatus, ToolCall, ToolOutput};

use crate::client::{
    Annotation, Assistant, AssistantTool, AssistantsApi, FileObject, FileUpload, FunctionCall,
    MessageBody, MessageContent, Metadata, NewMessage, ProviderError, RequiredAction, Run,
    RunToolCall, SubmitToolOutputs, Thread, ThreadMessage,
};

#[derive(Clone, Debug)]
pub enum ScriptStep {
    Status(RunStatus),
    ToolCalls(Vec<ToolCall>),
    /// `requires_action` without a tool-call payload.
    MissingToolCalls,
    Fail { status: RunStatus, error: Option<Value> },
    Complete { reply: String, annotations: Vec<String> },
}

impl ScriptStep {
    pub fn reply(text: impl Into<String>) -> Self {
        Self::Complete { reply: text.into(), annotations: Vec::new() }
    }

    pub fn call(call_id: &str, function_name: &str, arguments: &str) -> Self {
        Self::ToolCalls(vec![ToolCall {
            call_id: call_id.to_string(),
            function_name: function_name.to_string(),
            arguments: arguments.to_string(),
        }])
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostedMessage {
    pub thread_id: String,
    pub message: NewMessage,
}

struct RunState {
    steps: VecDeque<ScriptStep>,
    current: Run,
}

#[derive(Default)]
struct State {
    assistants: Vec<Assistant>,
    list_fails: bool,
    submit_advances: bool,
    thread_retrieval_fails: bool,
    threads: HashMap<String, Thread>,
    messages: HashMap<String, Vec<ThreadMessage>>,
    posted: Vec<PostedMessage>,
    scripts: VecDeque<Vec<ScriptStep>>,
    runs: HashMap<String, RunState>,
    created_runs: Vec<(String, String)>,
    submitted: Vec<Vec<ToolOutput>>,
    uploads: Vec<FileUpload>,
    files: Vec<FileObject>,
    transcript: String,
    sequence: u64,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}_{}", self.sequence)
    }

    fn push_message(&mut self, thread_id: &str, role: &str, content: Vec<MessageContent>) {
        let id = self.next_id("msg");
        self.messages.entry(thread_id.to_string()).or_default().push(ThreadMessage {
            id,
            role: role.to_string(),
            content,
        });
    }

    fn advance(&mut self, run_id: &str) -> Result<Run, ProviderError> {
        let (thread_id, step) = {
            let state = self.runs.get_mut(run_id).ok_or_else(|| not_found("run", run_id))?;
            (state.current.thread_id.clone(), state.steps.pop_front())
        };

        let Some(step) = step else {
            return self
                .runs
                .get(run_id)
                .map(|state| state.current.clone())
                .ok_or_else(|| not_found("run", run_id));
        };

        let mut required_action = None;
        let mut last_error = None;
        let status = match step {
            ScriptStep::Status(status) => status,
            ScriptStep::ToolCalls(calls) => {
                required_action = Some(RequiredAction {
                    kind: "submit_tool_outputs".to_string(),
                    submit_tool_outputs: Some(SubmitToolOutputs {
                        tool_calls: calls
                            .into_iter()
                            .map(|call| RunToolCall {
                                id: call.call_id,
                                kind: "function".to_string(),
                                function: FunctionCall {
                                    name: call.function_name,
                                    arguments: call.arguments,
                                },
                            })
                            .collect(),
                    }),
                });
                RunStatus::RequiresAction
            }
            ScriptStep::MissingToolCalls => RunStatus::RequiresAction,
            ScriptStep::Fail { status, error } => {
                last_error = error;
                status
            }
            ScriptStep::Complete { reply, annotations } => {
                let annotations = annotations
                    .into_iter()
                    .map(|text| Annotation { text, kind: "file_citation".to_string() })
                    .collect();
                self.push_message(
                    &thread_id,
                    "assistant",
                    vec![MessageContent::text(reply, annotations)],
                );
                RunStatus::Completed
            }
        };

        let state = self.runs.get_mut(run_id).ok_or_else(|| not_found("run", run_id))?;
        state.current.status = status;
        state.current.required_action = required_action;
        state.current.last_error = last_error;
        Ok(state.current.clone())
    }
}

fn not_found(kind: &str, id: &str) -> ProviderError {
    ProviderError::Status { status: 404, body: format!("No {kind} found with id '{id}'.") }
}

#[derive(Default)]
pub struct InMemoryAssistants {
    state: Mutex<State>,
}

impl InMemoryAssistants {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_assistant(&self, id: &str, name: &str, tools: Vec<AssistantTool>) {
        self.state.lock().await.assistants.push(Assistant {
            id: id.to_string(),
            name: Some(name.to_string()),
            instructions: None,
            model: "gpt-4o".to_string(),
            tools,
        });
    }

    /// Queues the step sequence the next created run will walk through.
    pub async fn script_run(&self, steps: Vec<ScriptStep>) {
        self.state.lock().await.scripts.push_back(steps);
    }

    pub async fn insert_thread(&self, thread_id: &str, metadata: Metadata) {
        self.state
            .lock()
            .await
            .threads
            .insert(thread_id.to_string(), Thread { id: thread_id.to_string(), metadata });
    }

    pub async fn fail_thread_retrieval(&self) {
        self.state.lock().await.thread_retrieval_fails = true;
    }

    /// Makes each tool-output submission consume the next script step, as a provider answering
    /// synchronously would.
    pub async fn advance_on_submit(&self) {
        self.state.lock().await.submit_advances = true;
    }

    pub async fn fail_listing(&self) {
        self.state.lock().await.list_fails = true;
    }

    pub async fn set_transcript(&self, transcript: &str) {
        self.state.lock().await.transcript = transcript.to_string();
    }

    pub async fn created_runs(&self) -> Vec<(String, String)> {
        self.state.lock().await.created_runs.clone()
    }

    pub async fn submitted_outputs(&self) -> Vec<Vec<ToolOutput>> {
        self.state.lock().await.submitted.clone()
    }

    pub async fn posted_messages(&self) -> Vec<PostedMessage> {
        self.state.lock().await.posted.clone()
    }

    pub async fn threads(&self) -> Vec<Thread> {
        let state = self.state.lock().await;
        let mut threads: Vec<Thread> = state.threads.values().cloned().collect();
        threads.sort_by(|left, right| left.id.cmp(&right.id));
        threads
    }

    pub async fn uploaded_filenames(&self) -> Vec<String> {
        self.state.lock().await.uploads.iter().map(|upload| upload.filename.clone()).collect()
    }
}

#[async_trait]
impl AssistantsApi for InMemoryAssistants {
    async fn list_assistants(&self, limit: u32) -> Result<Vec<Assistant>, ProviderError> {
        let state = self.state.lock().await;
        if state.list_fails {
            return Err(ProviderError::Status { status: 503, body: "unavailable".to_string() });
        }
        Ok(state.assistants.iter().take(limit as usize).cloned().collect())
    }

    async fn create_thread(&self, metadata: &Metadata) -> Result<Thread, ProviderError> {
        let mut state = self.state.lock().await;
        let id = state.next_id("thread");
        let thread = Thread { id: id.clone(), metadata: metadata.clone() };
        state.threads.insert(id, thread.clone());
        Ok(thread)
    }

    async fn retrieve_thread(&self, thread_id: &str) -> Result<Thread, ProviderError> {
        let state = self.state.lock().await;
        if state.thread_retrieval_fails {
            return Err(not_found("thread", thread_id));
        }
        state.threads.get(thread_id).cloned().ok_or_else(|| not_found("thread", thread_id))
    }

    async fn create_message(
        &self,
        thread_id: &str,
        message: NewMessage,
    ) -> Result<ThreadMessage, ProviderError> {
        let mut state = self.state.lock().await;
        if !state.threads.contains_key(thread_id) {
            return Err(not_found("thread", thread_id));
        }
        state.posted.push(PostedMessage { thread_id: thread_id.to_string(), message: message.clone() });

        let content = match message.content {
            MessageBody::Text(text) => vec![MessageContent::text(text, Vec::new())],
            MessageBody::Parts(_) => {
                vec![MessageContent { kind: "image_file".to_string(), text: None }]
            }
        };
        state.push_message(thread_id, message.role, content);
        state
            .messages
            .get(thread_id)
            .and_then(|messages| messages.last().cloned())
            .ok_or_else(|| not_found("message", thread_id))
    }

    async fn list_messages(
        &self,
        thread_id: &str,
        limit: u32,
    ) -> Result<Vec<ThreadMessage>, ProviderError> {
        let state = self.state.lock().await;
        let messages = state.messages.get(thread_id).cloned().unwrap_or_default();
        Ok(messages.into_iter().rev().take(limit as usize).collect())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> Result<Run, ProviderError> {
        let mut state = self.state.lock().await;
        if !state.threads.contains_key(thread_id) {
            return Err(not_found("thread", thread_id));
        }
        let run_id = state.next_id("run");
        let steps = state.scripts.pop_front().unwrap_or_else(|| vec![ScriptStep::reply("ok")]);
        let current = Run {
            id: run_id.clone(),
            thread_id: thread_id.to_string(),
            assistant_id: assistant_id.to_string(),
            status: RunStatus::Queued,
            required_action: None,
            last_error: None,
        };
        state.created_runs.push((thread_id.to_string(), assistant_id.to_string()));
        state.runs.insert(run_id, RunState { steps: steps.into(), current: current.clone() });
        Ok(current)
    }

    async fn retrieve_run(&self, _thread_id: &str, run_id: &str) -> Result<Run, ProviderError> {
        self.state.lock().await.advance(run_id)
    }

    async fn submit_tool_outputs(
        &self,
        _thread_id: &str,
        run_id: &str,
        outputs: &[ToolOutput],
    ) -> Result<Run, ProviderError> {
        let mut state = self.state.lock().await;
        state.submitted.push(outputs.to_vec());
        if state.submit_advances {
            return state.advance(run_id);
        }
        let run = state.runs.get_mut(run_id).ok_or_else(|| not_found("run", run_id))?;
        run.current.status = RunStatus::Queued;
        run.current.required_action = None;
        Ok(run.current.clone())
    }

    async fn upload_file(&self, upload: FileUpload) -> Result<FileObject, ProviderError> {
        let mut state = self.state.lock().await;
        let id = state.next_id("file");
        let object = FileObject {
            id,
            filename: upload.filename.clone(),
            purpose: upload.purpose.as_str().to_string(),
        };
        state.uploads.push(upload);
        state.files.push(object.clone());
        Ok(object)
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<FileObject, ProviderError> {
        let state = self.state.lock().await;
        state
            .files
            .iter()
            .find(|file| file.id == file_id)
            .cloned()
            .ok_or_else(|| not_found("file", file_id))
    }

    async fn transcribe(
        &self,
        _audio: Vec<u8>,
        _filename: &str,
        _model: &str,
    ) -> Result<String, ProviderError> {
        Ok(self.state.lock().await.transcript.clone())
    }
}
