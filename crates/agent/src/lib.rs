//! Assistant runtime - thread preparation, run orchestration and local tools
//!
//! This crate sits between the HTTP/telephony surfaces and the hosted assistant provider:
//! - Talks to the provider through the [`client::AssistantsApi`] trait (`openai` for HTTP,
//!   `memory` for tests)
//! - Prepares threads and posts user content, attachments and images
//! - Drives runs to a terminal state, answering tool calls from the [`tools::ToolRegistry`]
//! - Hands fire-and-forget results to a [`hooks::Continuation`]
//!
//! # Run loop
//!
//! 1. **Resolve** the assistant (`assistants`) by id or by exact name
//! 2. **Prepare** the thread (`preparer`), creating a new one when the old one is gone
//! 3. **Drive** the run (`orchestrator`), polling and submitting tool outputs in batches
//! 4. **Reply** with the latest assistant message, annotations stripped
//!
//! Tool failures never abort a run; they are reported back to the assistant as output text.

pub mod assistants;
pub mod client;
pub mod hooks;
pub mod memory;
pub mod openai;
pub mod orchestrator;
pub mod preparer;
pub mod tools;

pub use client::{AssistantsApi, Metadata, ProviderError};
pub use hooks::{CompletionHooks, Continuation};
pub use orchestrator::{
    OrchestrationError, RunLimits, RunMode, RunOrchestrator, RunReply, RunRequest, RunSettings,
};
pub use preparer::{PrepareRequest, ThreadPreparer};
pub use tools::{Tool, ToolError, ToolRegistry};
