use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Phone number identifying an external correspondent. Always stored trimmed.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CorrespondentKey(String);

impl CorrespondentKey {
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CorrespondentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Association between a correspondent and a remote conversation thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadBinding {
    pub thread_id: String,
    pub created_at: DateTime<Utc>,
}

impl ThreadBinding {
    /// A binding is live until strictly more than `window` has elapsed since it was created.
    pub fn is_live(&self, now: DateTime<Utc>, window: Duration) -> bool {
        now.signed_duration_since(self.created_at) <= window
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondent {
    pub phone: CorrespondentKey,
    pub name: Option<String>,
    pub email: Option<String>,
    pub binding: Option<ThreadBinding>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Correspondent {
    pub fn new(
        phone: CorrespondentKey,
        name: Option<String>,
        email: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self { phone, name, email, binding: None, created_at: now, updated_at: now }
    }

    pub fn live_thread(&self, now: DateTime<Utc>, window: Duration) -> Option<&str> {
        self.binding
            .as_ref()
            .filter(|binding| binding.is_live(now, window))
            .map(|binding| binding.thread_id.as_str())
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.phone.as_str())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Correspondent, CorrespondentKey, ThreadBinding};

    #[test]
    fn key_is_trimmed() {
        assert_eq!(CorrespondentKey::new("  +15551234567 \n").as_str(), "+15551234567");
    }

    #[test]
    fn binding_expires_strictly_after_window() {
        let created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid date");
        let binding = ThreadBinding { thread_id: "thread_1".to_string(), created_at };
        let window = Duration::days(60);

        assert!(binding.is_live(created_at + Duration::days(60), window));
        assert!(!binding.is_live(created_at + Duration::days(60) + Duration::seconds(1), window));
    }

    #[test]
    fn live_thread_hides_expired_binding() {
        let now = Utc::now();
        let mut correspondent =
            Correspondent::new(CorrespondentKey::new("+1555"), Some("Ada".to_string()), None, now);
        correspondent.binding = Some(ThreadBinding {
            thread_id: "thread_old".to_string(),
            created_at: now - Duration::days(90),
        });

        assert_eq!(correspondent.live_thread(now, Duration::days(60)), None);
        assert_eq!(correspondent.display_name(), "Ada");
    }
}
