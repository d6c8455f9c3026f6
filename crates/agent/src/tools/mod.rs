use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde_json::Value;
use thiserror::Error;

pub mod demo;
pub mod scrape;

/// A local function an assistant run may call by name.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, args: Value) -> Result<String, ToolError>;
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ToolRegistryError {
    #[error("tool `{0}` is registered more than once")]
    DuplicateTool(String),
    #[error("Function {0} not supported")]
    ToolNotFound(String),
    #[error("{message}")]
    Invocation { name: String, message: String },
}

/// Name-keyed table of tools, assembled once at startup from per-module lists.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merges tool lists, failing on the first name that appears twice.
    pub fn from_modules(
        modules: impl IntoIterator<Item = Vec<Arc<dyn Tool>>>,
    ) -> Result<Self, ToolRegistryError> {
        let mut registry = Self::default();
        for tool in modules.into_iter().flatten() {
            registry.register(tool)?;
        }
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolRegistryError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolRegistryError::DuplicateTool(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs the named tool. Handler errors and panics come back as `Invocation` text.
    pub async fn invoke(&self, name: &str, args: Value) -> Result<String, ToolRegistryError> {
        let tool = self
            .tools
            .get(name)
            .cloned()
            .ok_or_else(|| ToolRegistryError::ToolNotFound(name.to_string()))?;

        let outcome = AssertUnwindSafe(tool.execute(args)).catch_unwind().await;
        match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(error)) => {
                tracing::warn!(
                    event_name = "tool.invocation_failed",
                    tool = name,
                    error = %error,
                    "tool returned an error"
                );
                Err(ToolRegistryError::Invocation {
                    name: name.to_string(),
                    message: format!("Error: {error}"),
                })
            }
            Err(panic) => {
                let detail = panic_message(panic.as_ref());
                tracing::error!(
                    event_name = "tool.invocation_panicked",
                    tool = name,
                    detail = %detail,
                    "tool panicked"
                );
                Err(ToolRegistryError::Invocation {
                    name: name.to_string(),
                    message: format!("Error: tool {name} panicked: {detail}"),
                })
            }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{Tool, ToolError, ToolRegistry, ToolRegistryError};

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn execute(&self, args: Value) -> Result<String, ToolError> {
            Ok(args["text"].as_str().unwrap_or_default().to_string())
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            Err(ToolError::Failed("upstream timed out".to_string()))
        }
    }

    struct Panicky;

    #[async_trait]
    impl Tool for Panicky {
        fn name(&self) -> &'static str {
            "panicky"
        }

        async fn execute(&self, _args: Value) -> Result<String, ToolError> {
            panic!("boom")
        }
    }

    fn registry() -> ToolRegistry {
        ToolRegistry::from_modules(vec![
            vec![Arc::new(Echo) as Arc<dyn Tool>],
            vec![Arc::new(Broken) as Arc<dyn Tool>, Arc::new(Panicky) as Arc<dyn Tool>],
        ])
        .expect("registry")
    }

    #[test]
    fn duplicate_names_fail_construction() {
        let error = ToolRegistry::from_modules(vec![
            vec![Arc::new(Echo) as Arc<dyn Tool>],
            vec![Arc::new(Echo) as Arc<dyn Tool>],
        ])
        .err()
        .expect("duplicate should fail");

        assert_eq!(error, ToolRegistryError::DuplicateTool("echo".to_string()));
    }

    #[test]
    fn has_and_names_reflect_registered_tools() {
        let registry = registry();
        assert!(registry.has("echo"));
        assert!(!registry.has("foo"));
        assert_eq!(registry.names(), vec!["broken", "echo", "panicky"]);
    }

    #[tokio::test]
    async fn invoke_returns_tool_output() {
        let output = registry().invoke("echo", json!({"text": "hi"})).await.expect("invoke");
        assert_eq!(output, "hi");
    }

    #[tokio::test]
    async fn missing_tool_reads_as_not_supported() {
        let error = registry().invoke("foo", json!({})).await.expect_err("missing tool");
        assert_eq!(error.to_string(), "Function foo not supported");
    }

    #[tokio::test]
    async fn errors_and_panics_are_captured_as_text() {
        let registry = registry();

        let failed = registry.invoke("broken", json!({})).await.expect_err("error");
        assert_eq!(failed.to_string(), "Error: upstream timed out");

        let panicked = registry.invoke("panicky", json!({})).await.expect_err("panic");
        assert!(panicked.to_string().contains("boom"));
    }
}
