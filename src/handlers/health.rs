use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;
use std::sync::OnceLock;
use std::time::Instant;

use crate::{errors::ServiceError, AppState};

/// Tracks application start time for uptime calculation
static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

/// Basic liveness probe - just checks if the service is running
pub async fn liveness() -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

// GET /api/v1/status
#[utoipa::path(
    get,
    path = "/api/v1/status",
    responses(
        (status = 200, description = "Service status and counters")
    ),
    tag = "Status"
)]
pub async fn api_status(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServiceError> {
    let bookings_recorded = state.store.count().await?;

    Ok(Json(json!({
        "service": "ldr-api",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "uptime_secs": uptime_secs(),
        "bookings_recorded": bookings_recorded,
        "wallet_passes_enabled": state.wallet.is_configured(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}
