use serde::Serialize;

use switchboard_core::domain::run::AssistantRef;

use crate::client::{AssistantsApi, ProviderError};
use crate::tools::ToolRegistry;

/// Page size used when scanning assistants by name.
pub const ASSISTANT_PAGE_LIMIT: u32 = 100;

/// Resolves an assistant reference to an id. `Ok(None)` means no assistant carries that name.
pub async fn resolve_assistant_id(
    api: &dyn AssistantsApi,
    assistant: &AssistantRef,
) -> Result<Option<String>, ProviderError> {
    match assistant {
        AssistantRef::Id(id) => Ok(Some(id.clone())),
        AssistantRef::Name(name) => {
            let assistants = api.list_assistants(ASSISTANT_PAGE_LIMIT).await?;
            Ok(assistants
                .into_iter()
                .find(|candidate| candidate.name.as_deref() == Some(name.as_str()))
                .map(|candidate| candidate.id))
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ToolAvailability {
    pub name: String,
    pub enabled: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssistantSummary {
    pub id: String,
    pub name: String,
    pub instructions: Option<String>,
    pub model: String,
    pub tools: Vec<ToolAvailability>,
}

/// Lists assistants sorted by name, flagging function tools that have no local handler.
pub async fn list_assistant_summaries(
    api: &dyn AssistantsApi,
    registry: &ToolRegistry,
) -> Result<Vec<AssistantSummary>, ProviderError> {
    let mut summaries: Vec<AssistantSummary> = api
        .list_assistants(ASSISTANT_PAGE_LIMIT)
        .await?
        .into_iter()
        .map(|assistant| AssistantSummary {
            tools: assistant
                .tools
                .iter()
                .map(|tool| ToolAvailability {
                    name: tool.display_name().to_string(),
                    enabled: match tool.function.as_ref() {
                        Some(function) => registry.has(&function.name),
                        None => true,
                    },
                })
                .collect(),
            id: assistant.id,
            name: assistant.name.unwrap_or_default(),
            instructions: assistant.instructions,
            model: assistant.model,
        })
        .collect();

    summaries.sort_by(|left, right| {
        left.name.to_lowercase().cmp(&right.name.to_lowercase()).then(left.name.cmp(&right.name))
    });
    Ok(summaries)
}
