use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use switchboard_agent::{OrchestrationError, ProviderError};
use switchboard_core::errors::{ApplicationError, InterfaceError};
use switchboard_db::repositories::RepositoryError;
use switchboard_telephony::webhooks::WebhookError;
use switchboard_telephony::TelephonyError;

pub const CORRELATION_HEADER: HeaderName = HeaderName::from_static("x-correlation-id");

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// HTTP-facing error. Client errors show their message; server errors show a fixed text and keep
/// the detail in the logs under the correlation id.
#[derive(Debug)]
pub struct ApiError {
    interface: InterfaceError,
    public_message: String,
}

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            public_message: message.clone(),
            interface: InterfaceError::bad_request(message, new_correlation_id()),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            public_message: message.clone(),
            interface: InterfaceError::not_found(message, new_correlation_id()),
        }
    }

    /// Replaces the text shown to the caller, keeping status and logged detail.
    pub fn public(mut self, message: impl Into<String>) -> Self {
        self.public_message = message.into();
        self
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.interface.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> &str {
        &self.public_message
    }

    pub fn correlation_id(&self) -> &str {
        self.interface.correlation_id()
    }
}

impl From<ApplicationError> for ApiError {
    fn from(error: ApplicationError) -> Self {
        let interface = error.into_interface(new_correlation_id());
        let public_message = match interface {
            InterfaceError::BadRequest { ref message, .. } | InterfaceError::NotFound { ref message, .. } => {
                message.clone()
            }
            InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
                interface.user_message().to_string()
            }
        };
        Self { interface, public_message }
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(error: OrchestrationError) -> Self {
        ApplicationError::from(error).into()
    }
}

impl From<ProviderError> for ApiError {
    fn from(error: ProviderError) -> Self {
        ApplicationError::Provider(error.to_string()).into()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(error: RepositoryError) -> Self {
        ApplicationError::Persistence(error.to_string()).into()
    }
}

impl From<TelephonyError> for ApiError {
    fn from(error: TelephonyError) -> Self {
        ApplicationError::Provider(error.to_string()).into()
    }
}

impl From<WebhookError> for ApiError {
    fn from(error: WebhookError) -> Self {
        Self::bad_request(error.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(
                event_name = "http.request_failed",
                correlation_id = %self.correlation_id(),
                status = status.as_u16(),
                detail = %self.interface.message(),
                "request failed"
            );
        } else {
            tracing::info!(
                event_name = "http.request_rejected",
                correlation_id = %self.correlation_id(),
                status = status.as_u16(),
                detail = %self.interface.message(),
                "request rejected"
            );
        }

        let mut response = (status, Json(ErrorBody { error: self.public_message })).into_response();
        if let Ok(value) = HeaderValue::from_str(self.interface.correlation_id()) {
            response.headers_mut().insert(CORRELATION_HEADER, value);
        }
        response
    }
}
