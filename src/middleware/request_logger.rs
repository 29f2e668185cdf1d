use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::utils::sanitize::sanitize_json;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_BODY_LOG_SIZE: usize = 16 * 1024;
const MAX_INBOUND_REQUEST_ID_LEN: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogSettings {
    /// Log sanitized request bodies. Gateway callbacks carry payment tokens, so the
    /// body only reaches the log after masking.
    pub log_body: bool,
}

/// Reuses a caller-supplied request id when it is short and printable.
fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty() && id.len() <= MAX_INBOUND_REQUEST_ID_LEN)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn describe_body(bytes: &[u8]) -> String {
    match serde_json::from_slice::<serde_json::Value>(bytes) {
        Ok(json) => serde_json::to_string(&sanitize_json(&json))
            .unwrap_or_else(|_| "[invalid json]".to_string()),
        Err(_) => format!("[non-json, {} bytes]", bytes.len()),
    }
}

pub async fn request_logger(
    State(settings): State<RequestLogSettings>,
    mut req: Request,
    next: Next,
) -> Response {
    let request_id = request_id_from(req.headers());
    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %req.method(),
        uri = %req.uri().path(),
    );

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    async move {
        let start = Instant::now();

        if settings.log_body {
            let (parts, body) = req.into_parts();
            let bytes = match axum::body::to_bytes(body, MAX_BODY_LOG_SIZE).await {
                Ok(bytes) => bytes,
                Err(_) => {
                    tracing::warn!("Request body too large or failed to read");
                    return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
                }
            };
            tracing::info!(body_size = bytes.len(), body = %describe_body(&bytes), "Incoming request");
            req = Request::from_parts(parts, Body::from(bytes));
        } else {
            tracing::info!("Incoming request");
        }

        let mut response = next.run(req).await;

        let status = response.status().as_u16();
        let latency_ms = start.elapsed().as_millis() as u64;
        if response.status().is_server_error() {
            tracing::error!(status, latency_ms, "Outgoing response");
        } else if response.status().is_client_error() {
            tracing::warn!(status, latency_ms, "Outgoing response");
        } else {
            tracing::info!(status, latency_ms, "Outgoing response");
        }

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use tower::ServiceExt;

    fn echo_app(settings: RequestLogSettings) -> Router {
        Router::new()
            .route(
                "/echo",
                post(|headers: HeaderMap, body: String| async move {
                    let id = headers
                        .get(REQUEST_ID_HEADER)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    format!("{}|{}", id, body)
                }),
            )
            .layer(axum::middleware::from_fn_with_state(settings, request_logger))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), 4096).await.unwrap();
        String::from_utf8_lossy(&bytes).to_string()
    }

    #[tokio::test]
    async fn test_generated_request_id_reaches_handler_and_response() {
        let response = echo_app(RequestLogSettings::default())
            .oneshot(Request::builder().method("POST").uri("/echo").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let header = response.headers()[REQUEST_ID_HEADER].to_str().unwrap().to_string();
        assert!(Uuid::parse_str(&header).is_ok());
        assert_eq!(body_text(response).await, format!("{}|", header));
    }

    #[tokio::test]
    async fn test_inbound_request_id_is_kept() {
        let response = echo_app(RequestLogSettings::default())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .header(REQUEST_ID_HEADER, "hesabe-7731")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "hesabe-7731");
    }

    #[tokio::test]
    async fn test_logged_body_is_still_delivered() {
        let payload = r#"{"token":"tok_8462917455120038","status":"SUCCESSFUL"}"#;
        let response = echo_app(RequestLogSettings { log_body: true })
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_text(response).await.ends_with(payload));
    }

    #[test]
    fn test_described_body_masks_tokens() {
        let described = describe_body(br#"{"token":"tok_8462917455120038","amount":"25.000"}"#);
        assert!(described.contains("tok_****0038"));
        assert!(described.contains("25.000"));
        assert_eq!(describe_body(b"status=ok"), "[non-json, 9 bytes]");
    }
}
