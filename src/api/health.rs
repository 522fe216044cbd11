use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::api::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub provider: String,
    pub merchant_configured: bool,
    pub store: String,
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, StatusCode> {
    let version = env!("CARGO_PKG_VERSION").to_string();
    let acquirer = state.processor.acquirer();

    let response = HealthResponse {
        status: "healthy".to_string(),
        version,
        environment: state.environment.clone(),
        provider: acquirer.provider().to_string(),
        merchant_configured: !acquirer.merchant_id().is_empty(),
        store: state.processor.store().backend().to_string(),
    };

    Ok(Json(response))
}
