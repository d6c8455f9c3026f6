use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use switchboard_core::domain::correspondent::{Correspondent, CorrespondentKey};

pub mod correspondent;
pub mod memory;

pub use correspondent::SqlCorrespondentRepository;
pub use memory::InMemoryCorrespondentRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait]
pub trait CorrespondentRepository: Send + Sync {
    async fn find_by_phone(
        &self,
        phone: &CorrespondentKey,
    ) -> Result<Option<Correspondent>, RepositoryError>;

    /// Inserts a new correspondent; fails with `Conflict` when the phone is already registered.
    async fn create(&self, correspondent: Correspondent) -> Result<(), RepositoryError>;

    /// Points the correspondent at a thread, creating a bare record for unknown phones.
    async fn bind_thread(
        &self,
        phone: &CorrespondentKey,
        thread_id: &str,
        bound_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}
