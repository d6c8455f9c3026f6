use switchboard_db::migrations;

use crate::commands::{run_with_database, CommandResult, Failure};

pub fn run() -> CommandResult {
    run_with_database("migrate", |pool| async move {
        let before = migrations::status(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), 5))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), 5))?;

        if before.is_current() {
            Ok(format!("schema up to date ({} migrations applied)", before.applied))
        } else {
            Ok(format!("applied {} pending migrations", before.pending))
        }
    })
}
