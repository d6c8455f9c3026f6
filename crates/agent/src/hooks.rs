use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use switchboard_core::domain::run::RunResult;

use crate::client::AssistantsApi;

/// Work to perform once a fire-and-forget run reaches a terminal state.
#[async_trait]
pub trait Continuation: Send + Sync {
    async fn on_complete(&self, result: RunResult) -> anyhow::Result<()>;
}

/// Continuations that HTTP callers may select by name through `whenDone`.
#[derive(Default, Clone)]
pub struct CompletionHooks {
    hooks: HashMap<String, Arc<dyn Continuation>>,
}

impl CompletionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(api: Arc<dyn AssistantsApi>) -> Self {
        let mut hooks = Self::new();
        hooks.register("runAfter", Arc::new(LogThread::new(api)));
        hooks
    }

    pub fn register(&mut self, name: impl Into<String>, hook: Arc<dyn Continuation>) {
        self.hooks.insert(name.into(), hook);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Continuation>> {
        self.hooks.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Re-reads the finished thread and logs it.
pub struct LogThread {
    api: Arc<dyn AssistantsApi>,
}

impl LogThread {
    pub fn new(api: Arc<dyn AssistantsApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Continuation for LogThread {
    async fn on_complete(&self, result: RunResult) -> anyhow::Result<()> {
        let thread = self.api.retrieve_thread(&result.thread_id).await?;
        tracing::info!(
            event_name = "hook.run_after",
            thread_id = %thread.id,
            metadata = ?thread.metadata,
            success = result.is_success(),
            "run finished"
        );
        Ok(())
    }
}
