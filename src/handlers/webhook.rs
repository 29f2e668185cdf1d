use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use crate::error::AppError;
use crate::services::GatewayCallback;
use crate::AppState;

/// Gateway payment callback. Unknown references still answer 200 so the gateway
/// stops retrying; the body says what happened.
pub async fn hesabe_callback(
    State(state): State<AppState>,
    payload: Result<Json<GatewayCallback>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(callback) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let outcome = state.reconciler.reconcile(callback).await?;

    Ok((StatusCode::OK, Json(outcome)))
}
