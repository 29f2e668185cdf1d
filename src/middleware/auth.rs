use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

/// Guards operator endpoints. Accepts `Authorization: Bearer <key>` or the bare key.
pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    let presented = auth_header.map(|auth| auth.strip_prefix("Bearer ").unwrap_or(auth));

    match presented {
        Some(key) if !key.is_empty() && key == &*state.admin_api_key => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!("Rejected admin request with an invalid API key");
            Err(AppError::Unauthorized("invalid API key".to_string()))
        }
        None => Err(AppError::Unauthorized("missing API key".to_string())),
    }
}
