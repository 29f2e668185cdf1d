use base64::{engine::general_purpose::STANDARD, Engine as _};
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::time::Duration;
use thiserror::Error;

use crate::config::GatewayConfig;

type HmacSha256 = Hmac<Sha256>;

const REFUND_PATH: &str = "/api/refund";

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Gateway returned HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },
    #[error("Invalid response from gateway: {0}")]
    InvalidResponse(String),
    #[error("Failed to sign request: {0}")]
    Signing(String),
    #[error("Circuit breaker open: {0}")]
    CircuitBreakerOpen(String),
}

/// Refund instruction as the gateway expects it before encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub merchant_code: String,
    pub payment_token: String,
    pub amount: String,
    pub currency: String,
    pub order_reference_number: String,
    pub reason: String,
}

/// Wire body: the encoded request plus its hex HMAC.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    pub data: String,
    pub signature: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefundResponse {
    #[serde(alias = "responseCode", alias = "response_code")]
    pub code: Option<String>,
    #[serde(alias = "refundId", alias = "refund_id")]
    pub refund_id: Option<String>,
    pub message: Option<String>,
    /// Full response body, kept for the refund audit trail.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

/// HTTP client for the Hesabe payment gateway.
#[derive(Clone)]
pub struct HesabeClient {
    client: Client,
    config: GatewayConfig,
    circuit_breaker: StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>,
}

impl HesabeClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_circuit_breaker(config, 3, 60)
    }

    pub fn with_circuit_breaker(
        config: GatewayConfig,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        HesabeClient {
            client,
            config,
            circuit_breaker,
        }
    }

    pub fn merchant_code(&self) -> &str {
        &self.config.merchant_code
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    /// Serializes, encodes and signs a refund request.
    pub fn sign(&self, request: &RefundRequest) -> Result<SignedEnvelope, GatewayError> {
        sign_with_secret(&self.config.secret_key, request)
    }

    /// Sends a signed refund request. A response the gateway rejects is still `Ok`;
    /// only transport, HTTP-level and decoding failures are errors.
    pub async fn request_refund(
        &self,
        request: &RefundRequest,
    ) -> Result<RefundResponse, GatewayError> {
        let envelope = self.sign(request)?;
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), REFUND_PATH);
        let client = self.client.clone();
        let access_code = self.config.access_code.clone();

        let result = self
            .circuit_breaker
            .call(async move {
                let response = client
                    .post(&url)
                    .header("accessCode", access_code)
                    .json(&envelope)
                    .send()
                    .await?;

                let status = response.status();
                let body = response.text().await?;
                if !status.is_success() {
                    return Err(GatewayError::UnexpectedStatus {
                        status: status.as_u16(),
                        body,
                    });
                }

                let raw: serde_json::Value = serde_json::from_str(&body)
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                let mut parsed: RefundResponse = serde_json::from_value(raw.clone())
                    .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
                parsed.raw = raw;
                Ok(parsed)
            })
            .await;

        match result {
            Ok(response) => Ok(response),
            Err(FailsafeError::Rejected) => Err(GatewayError::CircuitBreakerOpen(
                "Hesabe API circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }
}

pub fn sign_with_secret(
    secret: &str,
    request: &RefundRequest,
) -> Result<SignedEnvelope, GatewayError> {
    let json = serde_json::to_vec(request).map_err(|e| GatewayError::Signing(e.to_string()))?;
    let data = STANDARD.encode(json);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| GatewayError::Signing(e.to_string()))?;
    mac.update(data.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(SignedEnvelope { data, signature })
}
