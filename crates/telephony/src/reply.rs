use std::sync::Arc;

use async_trait::async_trait;

use switchboard_agent::client::AssistantsApi;
use switchboard_agent::hooks::Continuation;
use switchboard_core::domain::run::RunResult;

use crate::client::TelephonyClient;

pub const REPLY_TO_METADATA_KEY: &str = "from";

/// Texts a finished run's answer back to whoever started the conversation.
pub struct SmsReply {
    api: Arc<dyn AssistantsApi>,
    telephony: Arc<dyn TelephonyClient>,
    fallback_recipient: String,
}

impl SmsReply {
    /// `fallback_recipient` is used when the thread carries no `from` metadata.
    pub fn new(
        api: Arc<dyn AssistantsApi>,
        telephony: Arc<dyn TelephonyClient>,
        fallback_recipient: impl Into<String>,
    ) -> Self {
        Self { api, telephony, fallback_recipient: fallback_recipient.into() }
    }

    async fn recipient(&self, thread_id: &str) -> String {
        match self.api.retrieve_thread(thread_id).await {
            Ok(thread) => thread
                .metadata
                .get(REPLY_TO_METADATA_KEY)
                .filter(|value| !value.is_empty())
                .cloned()
                .unwrap_or_else(|| self.fallback_recipient.clone()),
            Err(error) => {
                tracing::warn!(
                    event_name = "sms_reply.thread_lookup_failed",
                    thread_id,
                    error = %error,
                    "replying to captured correspondent"
                );
                self.fallback_recipient.clone()
            }
        }
    }
}

#[async_trait]
impl Continuation for SmsReply {
    async fn on_complete(&self, result: RunResult) -> anyhow::Result<()> {
        let Some(text) = result.text() else {
            tracing::warn!(
                event_name = "sms_reply.skipped",
                thread_id = %result.thread_id,
                response = %result.response_value(),
                "run did not complete, no reply sent"
            );
            return Ok(());
        };

        let recipient = self.recipient(&result.thread_id).await;
        self.telephony.send_sms(&recipient, text).await?;
        tracing::info!(
            event_name = "sms_reply.sent",
            thread_id = %result.thread_id,
            to = %recipient,
            "replied over sms"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use switchboard_agent::client::Metadata;
    use switchboard_agent::hooks::Continuation;
    use switchboard_agent::memory::InMemoryAssistants;
    use switchboard_core::domain::run::{RunOutcome, RunResult, RunStatus};

    use super::SmsReply;
    use crate::memory::{InMemoryTelephony, SentSms};

    fn completed(thread_id: &str, text: &str) -> RunResult {
        RunResult {
            thread_id: thread_id.to_string(),
            outcome: RunOutcome::Completed { text: text.to_string() },
        }
    }

    #[tokio::test]
    async fn replies_to_thread_sender() {
        let api = Arc::new(InMemoryAssistants::new());
        let mut metadata = Metadata::new();
        metadata.insert("from".to_string(), "+1555".to_string());
        api.insert_thread("thread_1", metadata).await;
        let telephony = Arc::new(InMemoryTelephony::new());

        SmsReply::new(api, telephony.clone(), "+1999")
            .on_complete(completed("thread_1", "see you at 5"))
            .await
            .expect("reply");

        assert_eq!(
            telephony.sent().await,
            vec![SentSms { to: "+1555".to_string(), body: "see you at 5".to_string() }]
        );
    }

    #[tokio::test]
    async fn falls_back_to_captured_correspondent() {
        let api = Arc::new(InMemoryAssistants::new());
        api.insert_thread("thread_1", Metadata::new()).await;
        let telephony = Arc::new(InMemoryTelephony::new());

        SmsReply::new(api, telephony.clone(), "+1999")
            .on_complete(completed("thread_1", "hello"))
            .await
            .expect("reply");

        assert_eq!(telephony.sent().await[0].to, "+1999");
    }

    #[tokio::test]
    async fn failed_runs_send_nothing() {
        let api = Arc::new(InMemoryAssistants::new());
        let telephony = Arc::new(InMemoryTelephony::new());

        SmsReply::new(api, telephony.clone(), "+1999")
            .on_complete(RunResult {
                thread_id: "thread_1".to_string(),
                outcome: RunOutcome::Failed { status: RunStatus::Expired, error_detail: None },
            })
            .await
            .expect("skip");

        assert!(telephony.sent().await.is_empty());
    }
}
