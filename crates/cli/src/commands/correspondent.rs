use std::sync::Arc;

use chrono::Utc;
use switchboard_core::config::AppConfig;
use switchboard_core::domain::correspondent::{Correspondent, CorrespondentKey};
use switchboard_db::repositories::{RepositoryError, SqlCorrespondentRepository};
use switchboard_db::{migrations, ThreadDirectory};

use crate::commands::{load_config, with_database, CommandResult, Failure};

const COMMAND: &str = "add-correspondent";

pub fn run(phone: &str, name: &str, email: &str) -> CommandResult {
    let outcome = load_config().and_then(|config| register(&config, phone, name, email));
    CommandResult::from_outcome(COMMAND, outcome)
}

fn register(config: &AppConfig, phone: &str, name: &str, email: &str) -> Result<String, Failure> {
    let fields = [phone.trim(), name.trim(), email.trim()];
    if fields.iter().any(|field| field.is_empty()) {
        return Err(Failure::new("invalid_input", "Missing required fields", 2));
    }
    let [phone, name, email] = fields;

    with_database(config, |pool| async move {
        migrations::run_pending(&pool)
            .await
            .map_err(|error| Failure::new("migration", error.to_string(), 5))?;

        let directory = ThreadDirectory::new(
            Arc::new(SqlCorrespondentRepository::new(pool)),
            config.thread_expiration(),
        );
        let correspondent = Correspondent::new(
            CorrespondentKey::new(phone),
            Some(name.to_string()),
            Some(email.to_string()),
            Utc::now(),
        );

        match directory.register(correspondent).await {
            Ok(()) => Ok(format!("registered correspondent {phone}")),
            Err(RepositoryError::Conflict(_)) => {
                Err(Failure::new("conflict", "User already exists", 6))
            }
            Err(other) => Err(Failure::new("repository", other.to_string(), 7)),
        }
    })
}
