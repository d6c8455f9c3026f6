//! Telephony integration - Twilio voice and SMS
//!
//! This crate provides the phone surface for switchboard:
//! - **Client** (`client`) - Twilio REST calls: outbound SMS, call lookup, media download
//! - **Webhooks** (`webhooks`) - Typed views over Twilio's form-encoded callbacks
//! - **Markup** (`twiml`) - Voice response builder (`Say`, `Record`, `Hangup`)
//! - **Replies** (`reply`) - Continuation that texts a finished run back to the caller
//!
//! # Flow
//!
//! ```text
//! Call → /telephony/in → Record → /telephony/transcribe → transcript ─┐
//! SMS  → /telephony/sms → media upload ───────────────────────────────┴→ run → SmsReply
//! ```

pub mod client;
pub mod memory;
pub mod reply;
pub mod twiml;
pub mod webhooks;

pub use client::{TelephonyClient, TelephonyError, TwilioClient};
pub use reply::SmsReply;
pub use twiml::VoiceResponse;
