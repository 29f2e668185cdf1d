pub mod automation;
pub mod refunds;
pub mod webhook;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = state.health.run().await;

    // Only a critical dependency failure takes the service out of rotation
    let status_code = if report.status == "unhealthy" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    (status_code, Json(report))
}
