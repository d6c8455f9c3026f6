use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How a caller names the assistant a run should execute against.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AssistantRef {
    Id(String),
    Name(String),
}

impl AssistantRef {
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Id(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    InProgress,
    RequiresAction,
    Cancelling,
    Completed,
    Failed,
    Cancelled,
    Expired,
    Incomplete,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::Expired | Self::Incomplete
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::RequiresAction => "requires_action",
            Self::Cancelling => "cancelling",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
            Self::Incomplete => "incomplete",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single function call requested by a run. `arguments` is raw JSON text.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub function_name: String,
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub tool_call_id: String,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed { text: String },
    Failed { status: RunStatus, error_detail: Option<Value> },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub thread_id: String,
    pub outcome: RunOutcome,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Completed { .. })
    }

    pub fn status_code(&self) -> u16 {
        if self.is_success() {
            200
        } else {
            500
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Completed { text } => Some(text),
            RunOutcome::Failed { .. } => None,
        }
    }

    /// Value reported to callers as `response`: the answer text, or the provider's error detail.
    pub fn response_value(&self) -> Value {
        match &self.outcome {
            RunOutcome::Completed { text } => Value::String(text.clone()),
            RunOutcome::Failed { status, error_detail } => error_detail
                .clone()
                .unwrap_or_else(|| Value::String(format!("run finished with status {status}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{RunOutcome, RunResult, RunStatus};

    #[test]
    fn terminal_states_are_recognised() {
        let terminal: Vec<RunStatus> = [
            RunStatus::Queued,
            RunStatus::InProgress,
            RunStatus::RequiresAction,
            RunStatus::Cancelling,
            RunStatus::Completed,
            RunStatus::Failed,
            RunStatus::Cancelled,
            RunStatus::Expired,
            RunStatus::Incomplete,
        ]
        .into_iter()
        .filter(|status| status.is_terminal())
        .collect();

        assert_eq!(
            terminal,
            vec![
                RunStatus::Completed,
                RunStatus::Failed,
                RunStatus::Cancelled,
                RunStatus::Expired,
                RunStatus::Incomplete,
            ]
        );
    }

    #[test]
    fn status_parses_from_wire_format() {
        let status: RunStatus = serde_json::from_value(json!("requires_action")).expect("parse");
        assert_eq!(status, RunStatus::RequiresAction);
    }

    #[test]
    fn failed_result_reports_error_detail() {
        let result = RunResult {
            thread_id: "thread_1".to_string(),
            outcome: RunOutcome::Failed {
                status: RunStatus::Failed,
                error_detail: Some(json!({"code": "rate_limit_exceeded"})),
            },
        };

        assert_eq!(result.status_code(), 500);
        assert_eq!(result.response_value(), json!({"code": "rate_limit_exceeded"}));
        assert_eq!(result.text(), None);
    }
}
