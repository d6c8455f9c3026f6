//! Typed views over the provider's form-encoded webhook payloads.

use std::collections::HashMap;

use thiserror::Error;

pub type FormFields = HashMap<String, String>;

pub const INBOUND_DIRECTION: &str = "inbound";
pub const HANGUP_DIGITS: &str = "hangup";
/// Provider cap on attachments per inbound message.
pub const MAX_MEDIA_PER_MESSAGE: usize = 10;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("No direction in payload")]
    MissingDirection,
    #[error("No From number in payload")]
    MissingCaller,
    #[error("Unknown request")]
    UnknownRequest,
    #[error("Missing required fields")]
    MissingFields,
}

fn field<'a>(form: &'a FormFields, name: &str) -> Option<&'a str> {
    form.get(name).map(String::as_str).filter(|value| !value.is_empty())
}

/// What a voice webhook asks for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallEvent {
    Inbound { from: String },
    Hangup,
}

impl CallEvent {
    pub fn from_form(form: &FormFields) -> Result<Self, WebhookError> {
        let direction = field(form, "Direction").ok_or(WebhookError::MissingDirection)?;
        if direction == INBOUND_DIRECTION {
            let from = field(form, "From").ok_or(WebhookError::MissingCaller)?;
            return Ok(Self::Inbound { from: from.to_string() });
        }
        match field(form, "Digits") {
            Some(HANGUP_DIGITS) => Ok(Self::Hangup),
            _ => Err(WebhookError::UnknownRequest),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaItem {
    pub index: usize,
    pub url: String,
    pub content_type: String,
}

impl MediaItem {
    /// File extension taken from the content-type subtype, `dat` when absent.
    pub fn extension(&self) -> &str {
        self.content_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .filter(|subtype| !subtype.is_empty())
            .unwrap_or("dat")
    }

    pub fn filename(&self, millis: i64) -> String {
        format!("media_{millis}_{}.{}", self.index, self.extension())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundSms {
    pub from: String,
    pub to: String,
    pub body: String,
    pub media: Vec<MediaItem>,
}

impl InboundSms {
    pub fn from_form(form: &FormFields) -> Result<Self, WebhookError> {
        let (Some(from), Some(to)) = (field(form, "From"), field(form, "To")) else {
            return Err(WebhookError::MissingFields);
        };
        let count = field(form, "NumMedia")
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0)
            .min(MAX_MEDIA_PER_MESSAGE);

        // Entries missing a url or content type are skipped.
        let media = (0..count)
            .filter_map(|index| {
                let url = field(form, &format!("MediaUrl{index}"))?;
                let content_type = field(form, &format!("MediaContentType{index}"))?;
                Some(MediaItem { index, url: url.to_string(), content_type: content_type.to_string() })
            })
            .collect();

        Ok(Self {
            from: from.trim().to_string(),
            to: to.trim().to_string(),
            body: field(form, "Body").unwrap_or_default().to_string(),
            media,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordingCallback {
    pub recording_url: String,
    pub call_sid: String,
}

impl RecordingCallback {
    pub fn from_form(form: &FormFields) -> Result<Self, WebhookError> {
        match (field(form, "RecordingUrl"), field(form, "CallSid")) {
            (Some(recording_url), Some(call_sid)) => Ok(Self {
                recording_url: recording_url.to_string(),
                call_sid: call_sid.to_string(),
            }),
            _ => Err(WebhookError::MissingFields),
        }
    }
}
