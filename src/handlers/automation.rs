use axum::{extract::State, Json};
use chrono::Utc;

use crate::services::SweepSummary;
use crate::AppState;

/// Runs one automation sweep now and returns its counts.
pub async fn run_sweep(State(state): State<AppState>) -> Json<SweepSummary> {
    Json(state.executor.run_sweep(Utc::now()).await)
}
