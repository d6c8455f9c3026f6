use std::fmt::Write as _;

pub const CONTENT_TYPE: &str = "text/xml";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Record {
    pub timeout: u32,
    pub transcribe: bool,
    pub status_callback: String,
    pub status_callback_event: String,
}

impl Record {
    pub fn new(timeout: u32, status_callback: impl Into<String>) -> Self {
        Self {
            timeout,
            transcribe: false,
            status_callback: status_callback.into(),
            status_callback_event: "completed".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verb {
    Say(String),
    Record(Record),
    Hangup,
}

/// Voice response document returned to the telephony provider for a live call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoiceResponse {
    verbs: Vec<Verb>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    pub fn record(mut self, record: Record) -> Self {
        self.verbs.push(Verb::Record(record));
        self
    }

    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn to_xml(&self) -> String {
        let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?><Response>"#);
        for verb in &self.verbs {
            match verb {
                Verb::Say(text) => {
                    let _ = write!(xml, "<Say>{}</Say>", escape(text));
                }
                Verb::Record(record) => {
                    let _ = write!(
                        xml,
                        r#"<Record timeout="{}" transcribe="{}" recordingStatusCallback="{}" recordingStatusCallbackEvent="{}"/>"#,
                        record.timeout,
                        record.transcribe,
                        escape(&record.status_callback),
                        escape(&record.status_callback_event),
                    );
                }
                Verb::Hangup => xml.push_str("<Hangup/>"),
            }
        }
        xml.push_str("</Response>");
        xml
    }
}

fn escape(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
