use axum::{extract::State, Json};
use common_http_errors::ApiError;
use serde::Serialize;
use serde_json::Value;

use crate::app::AppState;

#[derive(Serialize)]
pub struct IpLocationResponse {
    pub ip: String,
    pub location: Value,
    #[serde(rename = "detailedLocation")]
    pub detailed_location: Value,
}

/// Resolves the server's public address, then chains two location
/// providers. Any provider failure fails the request; there are no retries.
pub async fn get_ip_location(
    State(state): State<AppState>,
) -> Result<Json<IpLocationResponse>, ApiError> {
    let ip = state
        .geo
        .public_ip()
        .await
        .map_err(|err| ApiError::dependency("Failed to fetch IP location", err))?;

    let location = state
        .geo
        .lookup_raw(&ip)
        .await
        .map_err(|err| ApiError::dependency("Failed to fetch IP location", err))?;

    let detailed_location = state
        .geo
        .detailed_raw(&ip)
        .await
        .map_err(|err| ApiError::dependency("Failed to fetch IP location", err))?;

    Ok(Json(IpLocationResponse {
        ip,
        location,
        detailed_location,
    }))
}
