//! Notification Dispatcher: email, push and in-app records for affected parties.
//!
//! Dispatch is best-effort. A failed notification is logged and reported in the
//! returned outcome, never as an error to the caller.

pub mod recording;

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::config::NotificationConfig;
use crate::domain::{Booking, BookingStatus, Payment};

pub use recording::RecordingDispatcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BookingStatusChange,
    PaymentReceipt,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub booking_id: Uuid,
    pub notification_type: NotificationType,
    pub status_label: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_details: Option<serde_json::Value>,
}

impl NotificationRequest {
    pub fn status_change(user_id: Uuid, booking: &Booking, status: &BookingStatus, message: impl Into<String>) -> Self {
        Self {
            user_id,
            booking_id: booking.id,
            notification_type: NotificationType::BookingStatusChange,
            status_label: status.label().to_string(),
            message: message.into(),
            booking_details: Some(booking_details(booking)),
        }
    }

    pub fn payment_receipt(booking: &Booking, payment: &Payment) -> Self {
        Self {
            user_id: booking.customer_id,
            booking_id: booking.id,
            notification_type: NotificationType::PaymentReceipt,
            status_label: payment.status.as_str().to_string(),
            message: format!(
                "We received your payment of {} {} for booking {}.",
                payment.amount, payment.currency, booking.id
            ),
            booking_details: Some(serde_json::json!({
                "paymentId": payment.id,
                "amount": payment.amount.to_string(),
                "currency": payment.currency,
                "transactionReference": payment.transaction_reference,
                "paidAt": payment.paid_at,
                "paymentMethod": payment.payment_method,
            })),
        }
    }

    /// The same status change addressed to both the customer and the influencer.
    pub fn both_parties(booking: &Booking, status: &BookingStatus, message: &str) -> Vec<Self> {
        vec![
            Self::status_change(booking.customer_id, booking, status, message),
            Self::status_change(booking.influencer_id, booking, status, message),
        ]
    }
}

fn booking_details(booking: &Booking) -> serde_json::Value {
    serde_json::json!({
        "bookingId": booking.id,
        "serviceId": booking.service_id,
        "customerId": booking.customer_id,
        "influencerId": booking.influencer_id,
        "scheduledTime": booking.scheduled_time,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationOutcome {
    pub email_sent: bool,
    pub push_sent: bool,
    pub record_created: bool,
    pub errors: Vec<String>,
}

impl NotificationOutcome {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
            ..Self::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, request: &NotificationRequest) -> NotificationOutcome;
}

/// Sends every request concurrently and logs the ones that did not go through cleanly.
pub async fn dispatch_all(
    dispatcher: &dyn NotificationDispatcher,
    requests: &[NotificationRequest],
) -> Vec<NotificationOutcome> {
    let outcomes = join_all(requests.iter().map(|request| dispatcher.notify(request))).await;

    for (request, outcome) in requests.iter().zip(&outcomes) {
        if !outcome.is_clean() {
            tracing::warn!(
                booking_id = %request.booking_id,
                user_id = %request.user_id,
                notification_type = ?request.notification_type,
                errors = ?outcome.errors,
                "Notification delivery incomplete"
            );
        }
    }

    outcomes
}

/// Calls the notification-dispatch HTTP function.
#[derive(Clone)]
pub struct HttpNotificationDispatcher {
    client: Client,
    config: NotificationConfig,
}

impl HttpNotificationDispatcher {
    pub fn new(config: NotificationConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }
}

#[async_trait]
impl NotificationDispatcher for HttpNotificationDispatcher {
    async fn notify(&self, request: &NotificationRequest) -> NotificationOutcome {
        let response = match self
            .client
            .post(&self.config.url)
            .bearer_auth(&self.config.service_key)
            .json(request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return NotificationOutcome::failed(format!("request failed: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return NotificationOutcome::failed(format!("HTTP {}: {}", status.as_u16(), body));
        }

        response
            .json::<NotificationOutcome>()
            .await
            .unwrap_or_else(|e| NotificationOutcome::failed(format!("invalid response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;

    fn dispatcher(url: String) -> HttpNotificationDispatcher {
        HttpNotificationDispatcher::new(NotificationConfig {
            url,
            service_key: "service-key".to_string(),
        })
    }

    fn booking() -> Booking {
        Booking::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
    }

    #[test]
    fn test_both_parties_addresses_customer_and_influencer() {
        let booking = booking();
        let requests =
            NotificationRequest::both_parties(&booking, &BookingStatus::AutoCancelled, "Cancelled");
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].user_id, booking.customer_id);
        assert_eq!(requests[1].user_id, booking.influencer_id);
        assert_eq!(requests[0].status_label, "auto-cancel");
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let booking = booking();
        let payment = Payment::new(
            booking.id,
            booking.customer_id,
            booking.influencer_id,
            BigDecimal::from(25),
            "KWD".to_string(),
            None,
        );
        let value = serde_json::to_value(NotificationRequest::payment_receipt(&booking, &payment)).unwrap();
        assert_eq!(value["notificationType"], "payment_receipt");
        assert_eq!(value["userId"], booking.customer_id.to_string());
        assert!(value["bookingDetails"]["paymentId"].is_string());
    }

    #[tokio::test]
    async fn test_http_dispatch_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send-notification")
            .match_header("authorization", "Bearer service-key")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"emailSent":true,"pushSent":false,"recordCreated":true,"errors":[]}"#)
            .create_async()
            .await;

        let booking = booking();
        let request = NotificationRequest::status_change(
            booking.customer_id,
            &booking,
            &BookingStatus::AutoRejected,
            "Rejected",
        );
        let outcome = dispatcher(format!("{}/send-notification", server.url()))
            .notify(&request)
            .await;

        assert!(outcome.email_sent);
        assert!(!outcome.push_sent);
        assert!(outcome.record_created);
        assert!(outcome.is_clean());
    }

    #[tokio::test]
    async fn test_http_dispatch_failure_is_swallowed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/send-notification")
            .with_status(503)
            .with_body("email provider down")
            .create_async()
            .await;

        let booking = booking();
        let request = NotificationRequest::status_change(
            booking.influencer_id,
            &booking,
            &BookingStatus::AutoRejected,
            "Rejected",
        );
        let outcome = dispatcher(format!("{}/send-notification", server.url()))
            .notify(&request)
            .await;

        assert!(!outcome.is_clean());
        assert!(outcome.errors[0].contains("503"));
    }

    #[tokio::test]
    async fn test_dispatch_all_returns_one_outcome_per_request() {
        let recorder = RecordingDispatcher::new();
        recorder.fail_for(Uuid::nil()).await;
        let booking = booking();
        let requests =
            NotificationRequest::both_parties(&booking, &BookingStatus::ToBePublish, "Approved");

        let outcomes = dispatch_all(&recorder, &requests).await;

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(NotificationOutcome::is_clean));
        assert_eq!(recorder.requests().await.len(), 2);
    }
}
