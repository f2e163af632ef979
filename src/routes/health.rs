use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::AppState;

/// Liveness plus a round trip to each backing store.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let db = sqlx::query("SELECT 1").execute(&state.db).await;

    let mut redis = state.redis.clone();
    let cache: Result<String, _> = redis::cmd("PING").query_async(&mut redis).await;

    match (db, cache) {
        (Ok(_), Ok(_)) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "db": "connected", "redis": "connected" })),
        ),
        (db, cache) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "error",
                "db": db.err().map(|e| e.to_string()).unwrap_or_else(|| "connected".into()),
                "redis": cache.err().map(|e| e.to_string()).unwrap_or_else(|| "connected".into()),
            })),
        ),
    }
}
