use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use switchboard_core::domain::run::AssistantRef;

use super::{Tool, ToolError};
use crate::orchestrator::{OrchestrationError, RunMode, RunOrchestrator, RunReply, RunRequest};

pub const RESEARCH_ASSISTANT: &str = "Company Research Assistant";

/// `orchestrator` should carry an empty registry so the nested run cannot call back into this tool.
pub fn tools(orchestrator: RunOrchestrator) -> Vec<Arc<dyn Tool>> {
    vec![Arc::new(CompanyResearch::new(orchestrator))]
}

#[derive(Debug, Deserialize)]
struct CompanyResearchArgs {
    company_name: String,
    #[serde(default)]
    website: String,
}

/// Delegates a research question to a dedicated assistant and relays its answer.
pub struct CompanyResearch {
    orchestrator: RunOrchestrator,
}

impl CompanyResearch {
    pub fn new(orchestrator: RunOrchestrator) -> Self {
        Self { orchestrator }
    }
}

#[async_trait]
impl Tool for CompanyResearch {
    fn name(&self) -> &'static str {
        "company_research"
    }

    async fn execute(&self, args: Value) -> Result<String, ToolError> {
        let args: CompanyResearchArgs = serde_json::from_value(args)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let request = RunRequest::new(
            AssistantRef::Name(RESEARCH_ASSISTANT.to_string()),
            format!("Research this company: {} {}", args.company_name, args.website),
        );

        match self.orchestrator.execute(request, RunMode::Synchronous).await {
            Ok(RunReply::Finished(result)) => match result.text() {
                Some(text) if !text.is_empty() => Ok(text.to_string()),
                _ => Ok("No response received".to_string()),
            },
            Ok(RunReply::Queued { .. }) => Ok("No response received".to_string()),
            Err(error @ OrchestrationError::AssistantNotFound(_)) => Ok(error.to_string()),
            Err(error) => {
                tracing::warn!(
                    event_name = "tool.company_research_failed",
                    company = %args.company_name,
                    error = %error,
                    "company research failed"
                );
                Ok("An error occurred while researching the company.".to_string())
            }
        }
    }
}
