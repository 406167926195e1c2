/**
 * Health Routes
 * Liveness and store connectivity checks
 */
use axum::{extract::State, response::IntoResponse, Json};
use serde::Serialize;

use crate::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
}

/// Outcome of one store round-trip.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreCheck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StoreCheck {
    fn healthy(millis: u64) -> Self {
        Self {
            status: "healthy",
            response_time: Some(millis),
            error: None,
        }
    }

    fn unhealthy(error: String) -> Self {
        Self {
            status: "unhealthy",
            response_time: None,
            error: Some(error),
        }
    }
}

/// GET /health
pub async fn health_ping() -> impl IntoResponse {
    Json(Liveness { status: "ok" })
}

/// GET /health/database - always 200; the body says whether the store answered.
pub async fn health_database(State(state): State<AppState>) -> Json<StoreCheck> {
    let check = match state.store.ping().await {
        Ok(elapsed) => StoreCheck::healthy(elapsed.as_millis() as u64),
        Err(e) => {
            tracing::error!("Store health check failed: {}", e);
            StoreCheck::unhealthy(e.to_string())
        }
    };
    Json(check)
}
