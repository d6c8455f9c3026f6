use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use switchboard_core::domain::correspondent::{Correspondent, CorrespondentKey, ThreadBinding};

use super::{CorrespondentRepository, RepositoryError};

#[derive(Default)]
pub struct InMemoryCorrespondentRepository {
    correspondents: RwLock<HashMap<String, Correspondent>>,
}

#[async_trait::async_trait]
impl CorrespondentRepository for InMemoryCorrespondentRepository {
    async fn find_by_phone(
        &self,
        phone: &CorrespondentKey,
    ) -> Result<Option<Correspondent>, RepositoryError> {
        let correspondents = self.correspondents.read().await;
        Ok(correspondents.get(phone.as_str()).cloned())
    }

    async fn create(&self, correspondent: Correspondent) -> Result<(), RepositoryError> {
        let mut correspondents = self.correspondents.write().await;
        let key = correspondent.phone.as_str().to_string();
        if correspondents.contains_key(&key) {
            return Err(RepositoryError::Conflict(format!(
                "correspondent `{key}` already exists"
            )));
        }
        correspondents.insert(key, correspondent);
        Ok(())
    }

    async fn bind_thread(
        &self,
        phone: &CorrespondentKey,
        thread_id: &str,
        bound_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut correspondents = self.correspondents.write().await;
        let entry = correspondents
            .entry(phone.as_str().to_string())
            .or_insert_with(|| Correspondent::new(phone.clone(), None, None, bound_at));
        entry.binding =
            Some(ThreadBinding { thread_id: thread_id.to_string(), created_at: bound_at });
        entry.updated_at = bound_at;
        Ok(())
    }
}
