use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use switchboard_core::domain::correspondent::{Correspondent, CorrespondentKey};

use crate::repositories::{CorrespondentRepository, RepositoryError};

/// Maps correspondents to their live remote thread. Bindings older than the expiration
/// window are ignored but never deleted.
#[derive(Clone)]
pub struct ThreadDirectory {
    repository: Arc<dyn CorrespondentRepository>,
    expiration: Duration,
}

impl ThreadDirectory {
    pub fn new(repository: Arc<dyn CorrespondentRepository>, expiration: Duration) -> Self {
        Self { repository, expiration }
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    pub async fn resolve(
        &self,
        key: &CorrespondentKey,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, RepositoryError> {
        let Some(correspondent) = self.repository.find_by_phone(key).await? else {
            return Ok(None);
        };

        let live = correspondent.live_thread(now, self.expiration).map(str::to_string);
        if live.is_none() && correspondent.binding.is_some() {
            tracing::debug!(
                event_name = "directory.binding_expired",
                correspondent = %key,
                "ignoring expired thread binding"
            );
        }
        Ok(live)
    }

    pub async fn bind(
        &self,
        key: &CorrespondentKey,
        thread_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.repository.bind_thread(key, thread_id, now).await?;
        tracing::info!(
            event_name = "directory.thread_bound",
            correspondent = %key,
            thread_id,
            "bound correspondent to thread"
        );
        Ok(())
    }

    pub async fn correspondent(
        &self,
        key: &CorrespondentKey,
    ) -> Result<Option<Correspondent>, RepositoryError> {
        self.repository.find_by_phone(key).await
    }

    pub async fn register(&self, correspondent: Correspondent) -> Result<(), RepositoryError> {
        self.repository.create(correspondent).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};

    use switchboard_core::domain::correspondent::CorrespondentKey;

    use super::ThreadDirectory;
    use crate::repositories::InMemoryCorrespondentRepository;

    fn directory() -> ThreadDirectory {
        ThreadDirectory::new(Arc::new(InMemoryCorrespondentRepository::default()), Duration::days(60))
    }

    #[tokio::test]
    async fn unbound_key_resolves_to_none() {
        let directory = directory();
        let resolved =
            directory.resolve(&CorrespondentKey::new("+1999"), Utc::now()).await.expect("resolve");
        assert_eq!(resolved, None);
    }

    #[tokio::test]
    async fn binding_is_returned_until_window_elapses() {
        let directory = directory();
        let key = CorrespondentKey::new("+1555");
        let bound_at = Utc::now();
        directory.bind(&key, "thread_1", bound_at).await.expect("bind");

        let within = directory.resolve(&key, bound_at + Duration::days(59)).await.expect("resolve");
        assert_eq!(within.as_deref(), Some("thread_1"));

        let edge = directory.resolve(&key, bound_at + Duration::days(60)).await.expect("resolve");
        assert_eq!(edge.as_deref(), Some("thread_1"));

        let after = directory
            .resolve(&key, bound_at + Duration::days(60) + Duration::seconds(1))
            .await
            .expect("resolve");
        assert_eq!(after, None);

        let record = directory.correspondent(&key).await.expect("lookup").expect("present");
        assert!(record.binding.is_some(), "expired binding stays in storage");
    }

    #[tokio::test]
    async fn keys_are_trimmed_before_lookup() {
        let directory = directory();
        let now = Utc::now();
        directory.bind(&CorrespondentKey::new(" +1555 "), "thread_1", now).await.expect("bind");

        let resolved = directory.resolve(&CorrespondentKey::new("+1555"), now).await.expect("resolve");
        assert_eq!(resolved.as_deref(), Some("thread_1"));
    }

    #[tokio::test]
    async fn rebinding_replaces_expired_thread() {
        let directory = directory();
        let key = CorrespondentKey::new("+1555");
        let first = Utc::now() - Duration::days(61);
        directory.bind(&key, "thread_old", first).await.expect("bind old");

        let now = Utc::now();
        assert_eq!(directory.resolve(&key, now).await.expect("resolve"), None);

        directory.bind(&key, "thread_new", now).await.expect("bind new");
        assert_eq!(directory.resolve(&key, now).await.expect("resolve").as_deref(), Some("thread_new"));
    }
}
