use chrono::{DateTime, Utc};
use sqlx::Row;

use switchboard_core::domain::correspondent::{Correspondent, CorrespondentKey, ThreadBinding};

use super::{CorrespondentRepository, RepositoryError};
use crate::DbPool;

pub struct SqlCorrespondentRepository {
    pool: DbPool,
}

impl SqlCorrespondentRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{column}: {e}")))
}

fn row_to_correspondent(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<Correspondent, RepositoryError> {
    let phone: String = row.try_get("phone").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: Option<String> =
        row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: Option<String> =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let thread_id: Option<String> =
        row.try_get("thread_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let thread_created_at: Option<String> =
        row.try_get("thread_created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let binding = match (thread_id, thread_created_at) {
        (Some(thread_id), Some(created_at)) => Some(ThreadBinding {
            thread_id,
            created_at: parse_timestamp("thread_created_at", &created_at)?,
        }),
        _ => None,
    };

    Ok(Correspondent {
        phone: CorrespondentKey::new(phone),
        name,
        email,
        binding,
        created_at: parse_timestamp("created_at", &created_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}

#[async_trait::async_trait]
impl CorrespondentRepository for SqlCorrespondentRepository {
    async fn find_by_phone(
        &self,
        phone: &CorrespondentKey,
    ) -> Result<Option<Correspondent>, RepositoryError> {
        let row = sqlx::query(
            "SELECT phone, name, email, thread_id, thread_created_at, created_at, updated_at
             FROM correspondent WHERE phone = ?",
        )
        .bind(phone.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_correspondent(r)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, correspondent: Correspondent) -> Result<(), RepositoryError> {
        let binding = correspondent.binding.as_ref();
        let result = sqlx::query(
            "INSERT INTO correspondent (phone, name, email, thread_id, thread_created_at,
                                        created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(phone) DO NOTHING",
        )
        .bind(correspondent.phone.as_str())
        .bind(&correspondent.name)
        .bind(&correspondent.email)
        .bind(binding.map(|b| b.thread_id.clone()))
        .bind(binding.map(|b| b.created_at.to_rfc3339()))
        .bind(correspondent.created_at.to_rfc3339())
        .bind(correspondent.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "correspondent `{}` already exists",
                correspondent.phone
            )));
        }

        Ok(())
    }

    async fn bind_thread(
        &self,
        phone: &CorrespondentKey,
        thread_id: &str,
        bound_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let bound_at = bound_at.to_rfc3339();
        sqlx::query(
            "INSERT INTO correspondent (phone, thread_id, thread_created_at, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(phone) DO UPDATE SET
                 thread_id = excluded.thread_id,
                 thread_created_at = excluded.thread_created_at,
                 updated_at = excluded.updated_at",
        )
        .bind(phone.as_str())
        .bind(thread_id)
        .bind(&bound_at)
        .bind(&bound_at)
        .bind(&bound_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
