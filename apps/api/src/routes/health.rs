use axum::{extract::State, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::state::AppState;

/// GET /health
/// Reports service version and whether PostgreSQL answers. Always 200 so the
/// process stays up behind a load balancer while the database recovers.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => "ok",
        Err(e) => {
            warn!("Health check: database unreachable: {e}");
            "unavailable"
        }
    };

    Json(json!({
        "status": if database == "ok" { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
        "service": "jobs-api"
    }))
}
