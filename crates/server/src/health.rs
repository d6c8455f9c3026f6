use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use switchboard_db::{migrations, DbPool};
use tokio_util::task::TaskTracker;

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    background_runs: TaskTracker,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    /// Fire-and-forget runs still polling the provider.
    pub background_runs: usize,
    pub checked_at: String,
}

pub fn router<S>(db_pool: DbPool, background_runs: TaskTracker) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, background_runs })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let ready = database.status == "ready";

    let background_runs = state.background_runs.len();
    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: if state.background_runs.is_closed() { "draining" } else { "ready" },
            detail: format!("switchboard-server running; {background_runs} background runs"),
        },
        database,
        background_runs,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match migrations::status(pool).await {
        Ok(status) if status.is_current() => HealthCheck {
            status: "ready",
            detail: format!("{} migrations applied", status.applied),
        },
        Ok(status) => HealthCheck {
            status: "degraded",
            detail: format!("{} migrations pending", status.pending),
        },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use switchboard_db::{connect_with_settings, migrations};
    use tokio_util::task::TaskTracker;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_is_degraded_until_schema_is_current() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let state = HealthState { db_pool: pool.clone(), background_runs: TaskTracker::new() };

        let (status, Json(payload)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert!(payload.database.detail.ends_with("migrations pending"));

        migrations::run_pending(&pool).await.expect("migrations");
        let (status, Json(payload)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.database.status, "ready");

        pool.close().await;
    }

    #[tokio::test]
    async fn health_counts_background_runs() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");
        let tracker = TaskTracker::new();
        let (release, wait) = tokio::sync::oneshot::channel::<()>();
        tracker.spawn(async move {
            let _ = wait.await;
        });

        let (_, Json(payload)) =
            health(State(HealthState { db_pool: pool.clone(), background_runs: tracker.clone() })).await;
        assert_eq!(payload.background_runs, 1);
        assert_eq!(payload.service.status, "ready");

        let _ = release.send(());
        tracker.close();
        tracker.wait().await;
        pool.close().await;
    }

    #[tokio::test]
    async fn health_reports_degraded_when_pool_is_closed() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: pool, background_runs: TaskTracker::new() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(payload.database.detail.starts_with("database query failed"));
    }
}
