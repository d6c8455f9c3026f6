//! Drives an assistant run from creation to a terminal state.
//!
//! A run is polled until it completes, fails or asks for tool output. Tool calls are answered from
//! the [`ToolRegistry`] and submitted as one batch. Callers either wait for the [`RunResult`] or
//! hand the run to a background task that invokes a [`Continuation`] when it settles.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use futures_util::FutureExt;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::task::TaskTracker;

use switchboard_core::config::AssistantConfig;
use switchboard_core::domain::file::FileRef;
use switchboard_core::domain::run::{
    AssistantRef, RunOutcome, RunResult, RunStatus, ToolCall, ToolOutput,
};
use switchboard_core::errors::ApplicationError;

use crate::assistants::resolve_assistant_id;
use crate::client::{Annotation, AssistantsApi, Metadata, ProviderError, Run};
use crate::hooks::Continuation;
use crate::preparer::{PrepareRequest, ThreadPreparer};
use crate::tools::{panic_message, ToolRegistry};

#[derive(Clone, Debug)]
pub struct RunRequest {
    pub assistant: AssistantRef,
    pub thread_id: Option<String>,
    pub metadata: Metadata,
    pub content: String,
    pub attachments: Vec<FileRef>,
}

impl RunRequest {
    pub fn new(assistant: AssistantRef, content: impl Into<String>) -> Self {
        Self {
            assistant,
            thread_id: None,
            metadata: Metadata::new(),
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    pub fn with_thread(mut self, thread_id: Option<String>) -> Self {
        self.thread_id = thread_id;
        self
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_attachments(mut self, attachments: Vec<FileRef>) -> Self {
        self.attachments = attachments;
        self
    }
}

#[derive(Clone)]
pub enum RunMode {
    Synchronous,
    FireAndForget(Arc<dyn Continuation>),
}

/// Bounds on how long a run is polled. `None` leaves that dimension unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunLimits {
    pub max_polls: Option<u32>,
    pub max_duration: Option<Duration>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunSettings {
    pub poll_interval: Duration,
    pub limits: RunLimits,
}

impl RunSettings {
    pub fn from_config(config: &AssistantConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            limits: RunLimits {
                max_polls: config.max_poll_attempts,
                max_duration: config.max_run_secs.map(Duration::from_secs),
            },
        }
    }
}

impl Default for RunSettings {
    fn default() -> Self {
        Self { poll_interval: Duration::from_secs(1), limits: RunLimits::default() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum RunReply {
    Finished(RunResult),
    Queued { thread_id: String },
}

impl RunReply {
    pub fn thread_id(&self) -> &str {
        match self {
            Self::Finished(result) => &result.thread_id,
            Self::Queued { thread_id } => thread_id,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            Self::Finished(result) => result.status_code(),
            Self::Queued { .. } => 200,
        }
    }

    pub fn response_value(&self) -> Value {
        match self {
            Self::Finished(result) => result.response_value(),
            Self::Queued { thread_id } => json!(format!("Thread {thread_id} queued for execution")),
        }
    }
}

#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Assistant '{0}' not found")]
    AssistantNotFound(String),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("{0}")]
    Protocol(String),
    #[error("run {run_id} was still active after {polls} status checks")]
    PollLimitExceeded { run_id: String, polls: u32 },
}

impl From<OrchestrationError> for ApplicationError {
    fn from(error: OrchestrationError) -> Self {
        match error {
            OrchestrationError::AssistantNotFound(_) => Self::NotFound(error.to_string()),
            OrchestrationError::Provider(_) => Self::Provider(error.to_string()),
            OrchestrationError::Protocol(_) | OrchestrationError::PollLimitExceeded { .. } => {
                Self::Protocol(error.to_string())
            }
        }
    }
}

#[derive(Clone)]
pub struct RunOrchestrator {
    api: Arc<dyn AssistantsApi>,
    tools: Arc<ToolRegistry>,
    preparer: ThreadPreparer,
    settings: RunSettings,
    tracker: TaskTracker,
}

impl RunOrchestrator {
    pub fn new(api: Arc<dyn AssistantsApi>, tools: Arc<ToolRegistry>, settings: RunSettings) -> Self {
        Self {
            preparer: ThreadPreparer::new(api.clone()),
            api,
            tools,
            settings,
            tracker: TaskTracker::new(),
        }
    }

    /// Shares a task tracker so shutdown can wait on runs started by several orchestrators.
    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    pub fn api(&self) -> &Arc<dyn AssistantsApi> {
        &self.api
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn preparer(&self) -> &ThreadPreparer {
        &self.preparer
    }

    pub fn settings(&self) -> RunSettings {
        self.settings
    }

    /// Background runs spawned in fire-and-forget mode.
    pub fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    pub async fn resolve_assistant(&self, assistant: &AssistantRef) -> Result<String, OrchestrationError> {
        resolve_assistant_id(self.api.as_ref(), assistant).await?.ok_or_else(|| {
            OrchestrationError::AssistantNotFound(assistant.name().unwrap_or_default().to_string())
        })
    }

    /// Resolves the assistant, prepares the thread and starts a run on it.
    pub async fn execute(&self, request: RunRequest, mode: RunMode) -> Result<RunReply, OrchestrationError> {
        let RunRequest { assistant, thread_id, metadata, content, attachments } = request;
        let assistant_id = self.resolve_assistant(&assistant).await?;

        let thread = self
            .preparer
            .prepare(PrepareRequest {
                thread_id,
                assistant_name: assistant.name().map(str::to_string),
                metadata,
                content,
                attachments,
            })
            .await?;
        let run = self.api.create_run(&thread.id, &assistant_id).await?;
        tracing::info!(
            event_name = "run.started",
            thread_id = %thread.id,
            run_id = %run.id,
            assistant_id = %assistant_id,
            "started assistant run"
        );

        match mode {
            RunMode::Synchronous => Ok(RunReply::Finished(self.drive(run).await?)),
            RunMode::FireAndForget(continuation) => {
                let orchestrator = self.clone();
                let thread_id = thread.id.clone();
                self.tracker.spawn(async move {
                    let run_id = run.id.clone();
                    match orchestrator.drive(run).await {
                        Ok(result) => notify(continuation, result).await,
                        Err(error) => tracing::error!(
                            event_name = "run.background_failed",
                            thread_id = %thread_id,
                            run_id = %run_id,
                            error = %error,
                            "background run failed"
                        ),
                    }
                });
                Ok(RunReply::Queued { thread_id: thread.id })
            }
        }
    }

    /// Polls the run to a terminal state, answering tool calls along the way.
    pub async fn drive(&self, mut run: Run) -> Result<RunResult, OrchestrationError> {
        let started = Instant::now();
        let mut polls: u32 = 0;

        while !run.status.is_terminal() {
            // Tool-output rounds count against the limits like status polls.
            let polls_exhausted = self.settings.limits.max_polls.is_some_and(|max| polls >= max);
            let time_exhausted =
                self.settings.limits.max_duration.is_some_and(|max| started.elapsed() >= max);
            if polls_exhausted || time_exhausted {
                tracing::warn!(
                    event_name = "run.poll_limit_exceeded",
                    thread_id = %run.thread_id,
                    run_id = %run.id,
                    polls,
                    "giving up on run"
                );
                return Err(OrchestrationError::PollLimitExceeded { run_id: run.id, polls });
            }
            polls += 1;

            if run.status == RunStatus::RequiresAction {
                let calls = run.pending_tool_calls().ok_or_else(|| {
                    OrchestrationError::Protocol("Required action is missing necessary data.".to_string())
                })?;
                let outputs = self.answer_tool_calls(calls).await;
                run = self.api.submit_tool_outputs(&run.thread_id, &run.id, &outputs).await?;
                continue;
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            run = self.api.retrieve_run(&run.thread_id, &run.id).await?;
            tracing::debug!(event_name = "run.polled", run_id = %run.id, status = %run.status, polls);
        }

        let outcome = match run.status {
            RunStatus::Completed => RunOutcome::Completed { text: self.latest_reply(&run.thread_id).await? },
            status => {
                tracing::warn!(
                    event_name = "run.unsuccessful",
                    thread_id = %run.thread_id,
                    run_id = %run.id,
                    status = %status,
                    "run ended without completing"
                );
                RunOutcome::Failed { status, error_detail: run.last_error }
            }
        };
        Ok(RunResult { thread_id: run.thread_id, outcome })
    }

    async fn answer_tool_calls(&self, calls: Vec<ToolCall>) -> Vec<ToolOutput> {
        join_all(calls.into_iter().map(|call| self.answer_tool_call(call))).await
    }

    async fn answer_tool_call(&self, call: ToolCall) -> ToolOutput {
        let output = match serde_json::from_str::<Value>(&call.arguments) {
            Ok(args) => match self.tools.invoke(&call.function_name, args).await {
                Ok(output) => output,
                Err(error) => error.to_string(),
            },
            Err(error) => format!("SyntaxError: {error}"),
        };
        tracing::debug!(
            event_name = "run.tool_answered",
            call_id = %call.call_id,
            function = %call.function_name,
            "answered tool call"
        );
        ToolOutput { tool_call_id: call.call_id, output }
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, OrchestrationError> {
        let messages = self.api.list_messages(thread_id, 1).await?;
        let content = messages
            .first()
            .and_then(|message| message.content.first())
            .ok_or_else(|| OrchestrationError::Protocol("Thread has no reply message.".to_string()))?;

        match (&content.kind[..], content.text.as_ref()) {
            ("text", Some(text)) => Ok(strip_annotations(&text.value, &text.annotations)),
            _ => Err(OrchestrationError::Protocol(
                "Expected the first content block to be of type 'text'.".to_string(),
            )),
        }
    }
}

async fn notify(continuation: Arc<dyn Continuation>, result: RunResult) {
    let thread_id = result.thread_id.clone();
    match AssertUnwindSafe(continuation.on_complete(result)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(error)) => tracing::error!(
            event_name = "run.continuation_failed",
            thread_id = %thread_id,
            error = %error,
            "continuation failed"
        ),
        Err(panic) => tracing::error!(
            event_name = "run.continuation_panicked",
            thread_id = %thread_id,
            detail = %panic_message(panic.as_ref()),
            "continuation panicked"
        ),
    }
}

/// Removes each annotation's first occurrence from the reply text.
pub fn strip_annotations(text: &str, annotations: &[Annotation]) -> String {
    annotations.iter().fold(text.to_string(), |text, annotation| {
        if annotation.text.is_empty() {
            text
        } else {
            text.replacen(&annotation.text, "", 1)
        }
    })
}
