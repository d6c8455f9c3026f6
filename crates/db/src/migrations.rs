use std::collections::HashSet;

use sqlx::migrate::{MigrateError, Migrator};
use sqlx::Row;

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: usize,
    pub pending: usize,
}

impl MigrationStatus {
    pub fn is_current(&self) -> bool {
        self.pending == 0
    }
}

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Compares the embedded migrations with the ones recorded in the database.
pub async fn status(pool: &DbPool) -> Result<MigrationStatus, sqlx::Error> {
    let bookkeeping: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    let recorded: HashSet<i64> = if bookkeeping == 0 {
        HashSet::new()
    } else {
        sqlx::query("SELECT version FROM _sqlx_migrations WHERE success = 1")
            .fetch_all(pool)
            .await?
            .iter()
            .map(|row| row.get::<i64, _>("version"))
            .collect()
    };

    let (applied, pending) = MIGRATOR
        .iter()
        .filter(|migration| migration.migration_type.is_up_migration())
        .fold((0, 0), |(applied, pending), migration| {
            if recorded.contains(&migration.version) {
                (applied + 1, pending)
            } else {
                (applied, pending + 1)
            }
        });

    Ok(MigrationStatus { applied, pending })
}
