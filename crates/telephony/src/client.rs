use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use thiserror::Error;

use switchboard_core::config::TelephonyConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum TelephonyError {
    #[error("telephony transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("telephony provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("telephony response could not be decoded: {0}")]
    Decode(String),
    #[error("telephony is not configured: missing {0}")]
    NotConfigured(&'static str),
}

/// Outbound operations against the telephony provider.
#[async_trait]
pub trait TelephonyClient: Send + Sync {
    /// Sends a text message from the configured service number.
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), TelephonyError>;
    /// Looks up the originating number of a call.
    async fn caller_number(&self, call_sid: &str) -> Result<String, TelephonyError>;
    /// Fetches provider-hosted media (recordings, MMS attachments).
    async fn download(&self, url: &str) -> Result<Vec<u8>, TelephonyError>;
}

#[derive(Deserialize)]
struct CallResource {
    from: String,
}

pub struct TwilioClient {
    http: reqwest::Client,
    api_base_url: String,
    account_sid: String,
    auth_token: SecretString,
    phone_number: String,
}

impl TwilioClient {
    pub fn new(config: &TelephonyConfig) -> Result<Self, TelephonyError> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Self::with_client(http, config)
    }

    pub fn with_client(http: reqwest::Client, config: &TelephonyConfig) -> Result<Self, TelephonyError> {
        let account_sid =
            config.account_sid.clone().ok_or(TelephonyError::NotConfigured("telephony.account_sid"))?;
        let auth_token =
            config.auth_token.clone().ok_or(TelephonyError::NotConfigured("telephony.auth_token"))?;
        let phone_number = config
            .phone_number
            .clone()
            .ok_or(TelephonyError::NotConfigured("telephony.phone_number"))?;

        Ok(Self {
            http,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            account_sid,
            auth_token,
            phone_number,
        })
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    fn account_url(&self, resource: &str) -> String {
        format!("{}/2010-04-01/Accounts/{}/{}", self.api_base_url, self.account_sid, resource)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(&self.account_sid, Some(self.auth_token.expose_secret()))
    }

    async fn checked(response: reqwest::Response) -> Result<reqwest::Response, TelephonyError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            event_name = "telephony.request_failed",
            status = status.as_u16(),
            "telephony provider rejected request"
        );
        Err(TelephonyError::Status { status: status.as_u16(), body })
    }
}

#[async_trait]
impl TelephonyClient for TwilioClient {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), TelephonyError> {
        let form = [("To", to), ("From", self.phone_number.as_str()), ("Body", body)];
        let request = self.authorized(self.http.post(self.account_url("Messages.json"))).form(&form);
        Self::checked(request.send().await?).await?;
        tracing::info!(event_name = "telephony.sms_sent", to, chars = body.chars().count(), "sent sms");
        Ok(())
    }

    async fn caller_number(&self, call_sid: &str) -> Result<String, TelephonyError> {
        let request = self.authorized(self.http.get(self.account_url(&format!("Calls/{call_sid}.json"))));
        let response = Self::checked(request.send().await?).await?;
        let body = response.text().await?;
        let call: CallResource =
            serde_json::from_str(&body).map_err(|e| TelephonyError::Decode(e.to_string()))?;
        Ok(call.from)
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, TelephonyError> {
        let response = Self::checked(self.authorized(self.http.get(url)).send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}
