/**
 * Rwanda Locations Routes
 * Relays the provinces / districts / sectors / cells / villages tree from the
 * external locations API after checking the shape of its response
 */
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::routes::Envelope;
use crate::validation::{body_object, FieldErrors, Fields, NOT_NULL, REQUIRED};
use crate::AppState;

const API_KEY_HEADER: &str = "x-rapidapi-key";

/// Response body of the external locations API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationsResponse {
    pub status: String,
    #[serde(rename = "statusCode")]
    pub status_code: i64,
    pub message: String,
    /// Nested administrative divisions, relayed untouched.
    pub data: Value,
}

fn unexpected(error: impl std::fmt::Display) -> ApiError {
    ApiError::Upstream {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        detail: "An unexpected error occurred while fetching Rwanda locations.".to_string(),
        errors: None,
        error: Some(error.to_string()),
    }
}

/// Checks the upstream body field by field, collecting every mismatch.
pub fn check_shape(value: Value) -> Result<LocationsResponse, FieldErrors> {
    let body = body_object(value)?;
    let mut f = Fields::new(&body, false);

    let status = f.text("status", usize::MAX);
    let message = f.text("message", usize::MAX);
    let status_code = match body.get("statusCode") {
        None => {
            f.error("statusCode", REQUIRED);
            None
        }
        Some(Value::Number(n)) if n.is_i64() => n.as_i64(),
        Some(Value::String(s)) if s.trim().parse::<i64>().is_ok() => s.trim().parse().ok(),
        Some(_) => {
            f.error("statusCode", "A valid integer is required.");
            None
        }
    };
    let data = match body.get("data") {
        None => {
            f.error("data", REQUIRED);
            None
        }
        Some(Value::Null) => {
            f.error("data", NOT_NULL);
            None
        }
        Some(data) => Some(data.clone()),
    };

    f.build(|| {
        Some(LocationsResponse {
            status: status?,
            status_code: status_code?,
            message: message?,
            data: data?,
        })
    })
}

/// GET /api/rwanda-locations/
pub async fn get_rwanda_locations(
    State(state): State<AppState>,
) -> Result<Json<Envelope<LocationsResponse>>, ApiError> {
    let config = &state.config.locations;

    let mut request = state.http.get(&config.url).timeout(config.timeout);
    if let Some(key) = &config.api_key {
        request = request.header(API_KEY_HEADER, key);
    }

    let response = request.send().await.map_err(|e| {
        tracing::error!("Locations API request failed: {}", e);
        unexpected(e)
    })?;

    let status = response.status();
    if status != reqwest::StatusCode::OK {
        tracing::warn!("Locations API returned status {}", status.as_u16());
        return Err(ApiError::Upstream {
            status: StatusCode::BAD_REQUEST,
            detail: format!(
                "Error fetching Rwanda locations. External API returned status code {}.",
                status.as_u16()
            ),
            errors: None,
            error: None,
        });
    }

    let body: Value = response.json().await.map_err(|e| {
        tracing::error!("Locations API returned an unreadable body: {}", e);
        unexpected(e)
    })?;

    let locations = check_shape(body).map_err(|errors| {
        tracing::error!("Locations API response failed validation: {}", errors);
        ApiError::Upstream {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Data validation error from external API response.".to_string(),
            errors: serde_json::to_value(errors).ok(),
            error: None,
        }
    })?;

    Ok(Json(Envelope::new(
        "Successfully retrieved Rwanda locations.",
        locations,
    )))
}
