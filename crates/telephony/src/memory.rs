use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::client::{TelephonyClient, TelephonyError};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentSms {
    pub to: String,
    pub body: String,
}

#[derive(Default)]
struct State {
    sent: Vec<SentSms>,
    callers: HashMap<String, String>,
    media: HashMap<String, Vec<u8>>,
    downloads: Vec<String>,
}

/// Telephony client that records outbound traffic and serves canned lookups.
#[derive(Default)]
pub struct InMemoryTelephony {
    state: Mutex<State>,
}

impl InMemoryTelephony {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_call(&self, call_sid: &str, from: &str) {
        self.state.lock().await.callers.insert(call_sid.to_string(), from.to_string());
    }

    pub async fn add_media(&self, url: &str, bytes: Vec<u8>) {
        self.state.lock().await.media.insert(url.to_string(), bytes);
    }

    pub async fn sent(&self) -> Vec<SentSms> {
        self.state.lock().await.sent.clone()
    }

    pub async fn downloads(&self) -> Vec<String> {
        self.state.lock().await.downloads.clone()
    }
}

fn not_found(what: &str) -> TelephonyError {
    TelephonyError::Status { status: 404, body: format!("{what} not found") }
}

#[async_trait]
impl TelephonyClient for InMemoryTelephony {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), TelephonyError> {
        self.state.lock().await.sent.push(SentSms { to: to.to_string(), body: body.to_string() });
        Ok(())
    }

    async fn caller_number(&self, call_sid: &str) -> Result<String, TelephonyError> {
        self.state.lock().await.callers.get(call_sid).cloned().ok_or_else(|| not_found(call_sid))
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TelephonyError> {
        let mut state = self.state.lock().await;
        state.downloads.push(url.to_string());
        state.media.get(url).cloned().ok_or_else(|| not_found(url))
    }
}
