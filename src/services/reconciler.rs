//! Payment Reconciler: applies gateway payment callbacks to local payments and,
//! on success, confirms the booking.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::reference::{booking_id_candidates, ReferenceFormat};
use crate::domain::{Booking, BookingStatus, Payment, PaymentStatus, PaymentUpdate};
use crate::error::AppError;
use crate::notifications::{dispatch_all, NotificationDispatcher, NotificationRequest};
use crate::ports::Store;
use crate::validation::{
    parse_amount, sanitize_string, validate_max_len, validate_required, ValidationError,
    REFERENCE_NUMBER_MAX_LEN, STATUS_MAX_LEN, TOKEN_MAX_LEN,
};

/// Body of a gateway payment callback.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GatewayCallback {
    #[serde(default, alias = "transaction_token")]
    pub token: Option<String>,
    #[serde(default, alias = "order_reference_number")]
    pub reference_number: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub amount: serde_json::Value,
    #[serde(default)]
    pub payment_type: Option<String>,
    #[serde(default)]
    pub datetime: Option<String>,
}

/// A callback whose required fields are present and bounded.
#[derive(Debug, Clone)]
struct CheckedCallback {
    reference: String,
    gateway_status: String,
    amount: serde_json::Value,
    payment_type: Option<String>,
    paid_at: Option<DateTime<Utc>>,
}

impl GatewayCallback {
    fn check(self) -> Result<CheckedCallback, ValidationError> {
        let reference = sanitize_string(self.reference_number.as_deref().unwrap_or_default());
        validate_required("reference_number", &reference)?;
        validate_max_len("reference_number", &reference, REFERENCE_NUMBER_MAX_LEN)?;

        let gateway_status = sanitize_string(self.status.as_deref().unwrap_or_default());
        validate_required("status", &gateway_status)?;
        validate_max_len("status", &gateway_status, STATUS_MAX_LEN)?;

        if let Some(token) = &self.token {
            validate_max_len("token", token, TOKEN_MAX_LEN)?;
        }

        Ok(CheckedCallback {
            reference,
            gateway_status,
            amount: self.amount,
            payment_type: self
                .payment_type
                .map(|value| sanitize_string(&value))
                .filter(|value| !value.is_empty()),
            paid_at: self.datetime.as_deref().and_then(parse_callback_time),
        })
    }
}

/// Gateway timestamps arrive as RFC 3339 or as a naive `YYYY-MM-DD HH:MM:SS` in UTC.
pub fn parse_callback_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub booking_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,
}

impl ReconcileOutcome {
    fn applied(payment: &Payment, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            payment_id: Some(payment.id),
            booking_id: Some(payment.booking_id),
            status: Some(payment.status),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            payment_id: None,
            booking_id: None,
            status: None,
        }
    }
}

/// How a callback reference was matched to local data.
#[derive(Debug)]
enum Resolution {
    Exact(Payment),
    OpenForBooking(Payment, ReferenceFormat),
    /// The booking was already paid under another reference.
    AlreadyPaid(Payment),
    /// No payment row exists but the gateway reports success for a known booking.
    Synthesize(Booking),
    NotFound(String),
}

#[derive(Clone)]
pub struct PaymentReconciler {
    store: Store,
    notifier: Arc<dyn NotificationDispatcher>,
    default_currency: String,
}

impl PaymentReconciler {
    pub fn new(store: Store, notifier: Arc<dyn NotificationDispatcher>, default_currency: String) -> Self {
        Self {
            store,
            notifier,
            default_currency,
        }
    }

    /// Applies one callback. Missing required fields are a validation error; an
    /// unmatched reference is a successful call with a "not found" outcome and no writes.
    pub async fn reconcile(&self, callback: GatewayCallback) -> Result<ReconcileOutcome, AppError> {
        let callback = callback.check()?;
        self.reconcile_checked(callback).await.map_err(as_store_fault)
    }

    async fn reconcile_checked(&self, callback: CheckedCallback) -> Result<ReconcileOutcome, AppError> {
        let new_status = PaymentStatus::from_gateway(&callback.gateway_status);

        tracing::info!(
            "Payment callback for reference {} with gateway status {}",
            callback.reference, callback.gateway_status
        );

        match self.resolve(&callback.reference, new_status).await? {
            Resolution::Exact(payment) => self.apply(payment, &callback, new_status).await,
            Resolution::OpenForBooking(payment, format) => {
                tracing::info!(
                    "Matched reference {} to payment {} via {:?} booking id",
                    callback.reference, payment.id, format
                );
                self.apply(payment, &callback, new_status).await
            }
            Resolution::AlreadyPaid(payment) => self.repeat_success(payment).await,
            Resolution::Synthesize(booking) => self.synthesize(booking, &callback).await,
            Resolution::NotFound(reason) => {
                tracing::warn!("No payment for reference {}: {}", callback.reference, reason);
                Ok(ReconcileOutcome::not_found(format!("Payment not found: {}", reason)))
            }
        }
    }

    async fn resolve(&self, reference: &str, new_status: PaymentStatus) -> Result<Resolution, AppError> {
        if let Some(payment) = self.store.payments.find_by_transaction_reference(reference).await? {
            return Ok(Resolution::Exact(payment));
        }

        let candidates = booking_id_candidates(reference);
        if candidates.is_empty() {
            return Ok(Resolution::NotFound("reference carries no booking id".to_string()));
        }

        for (booking_id, format) in &candidates {
            if let Some(payment) = self.store.payments.find_latest_open_for_booking(*booking_id).await? {
                return Ok(Resolution::OpenForBooking(payment, *format));
            }
        }

        if new_status != PaymentStatus::Completed {
            return Ok(Resolution::NotFound("no open payment for the referenced booking".to_string()));
        }

        for (booking_id, _) in &candidates {
            let Some(booking) = self.store.bookings.get(*booking_id).await? else {
                continue;
            };
            let completed = self.store.payments.find_completed_for_booking(booking.id).await?;
            if let Some(payment) = completed.into_iter().next() {
                return Ok(Resolution::AlreadyPaid(payment));
            }
            return Ok(Resolution::Synthesize(booking));
        }

        Ok(Resolution::NotFound("referenced booking does not exist".to_string()))
    }

    async fn apply(
        &self,
        payment: Payment,
        callback: &CheckedCallback,
        new_status: PaymentStatus,
    ) -> Result<ReconcileOutcome, AppError> {
        if payment.status == PaymentStatus::Completed {
            if new_status != PaymentStatus::Completed {
                tracing::warn!(
                    "Ignoring {} callback for payment {} which is already completed",
                    new_status, payment.id
                );
                return Ok(ReconcileOutcome::applied(
                    &payment,
                    format!("Payment already completed; {} ignored", new_status),
                ));
            }
            return self.repeat_success(payment).await;
        }

        let completed = new_status == PaymentStatus::Completed;
        let update = PaymentUpdate {
            status: new_status,
            paid_at: completed.then(|| callback.paid_at.unwrap_or_else(Utc::now)),
            transaction_reference: (completed
                && payment.transaction_reference.as_deref() != Some(callback.reference.as_str()))
            .then(|| callback.reference.clone()),
            payment_method: callback.payment_type.clone(),
        };

        let payment = self.store.payments.apply_update(payment.id, &update).await?;
        tracing::info!("Payment {} is now {}", payment.id, payment.status);

        let mut message = format!("Payment updated to {}", payment.status);
        if completed {
            if let Confirmation::Left(status) = self.confirm_booking(&payment).await? {
                message = format!("{}; booking left in '{}'", message, status);
            }
        }

        Ok(ReconcileOutcome::applied(&payment, message))
    }

    /// A second success for a completed payment only re-runs the booking confirmation
    /// when an earlier attempt never got that far.
    async fn repeat_success(&self, payment: Payment) -> Result<ReconcileOutcome, AppError> {
        let unconfirmed = self
            .store
            .bookings
            .get(payment.booking_id)
            .await?
            .is_some_and(|booking| booking.status.precedes_payment());

        if unconfirmed {
            tracing::info!("Resuming confirmation of booking {} for payment {}", payment.booking_id, payment.id);
            self.confirm_booking(&payment).await?;
            return Ok(ReconcileOutcome::applied(&payment, "Payment already completed; booking confirmed"));
        }

        Ok(ReconcileOutcome::applied(&payment, "Payment already completed"))
    }

    async fn synthesize(&self, booking: Booking, callback: &CheckedCallback) -> Result<ReconcileOutcome, AppError> {
        let amount = parse_amount("amount", &callback.amount)?;

        let mut payment = Payment::new(
            booking.id,
            booking.customer_id,
            booking.influencer_id,
            amount,
            self.default_currency.clone(),
            Some(callback.reference.clone()),
        );
        payment.status = PaymentStatus::Completed;
        payment.paid_at = Some(callback.paid_at.unwrap_or_else(Utc::now));
        payment.payment_method = callback.payment_type.clone();

        let payment = self.store.payments.insert(&payment).await?;
        tracing::warn!(
            "Created completed payment {} for booking {} from an unmatched success callback",
            payment.id, booking.id
        );

        let message = match self.confirm_booking(&payment).await? {
            Confirmation::Left(status) => {
                format!("Payment recorded from gateway callback; booking left in '{}'", status)
            }
            _ => "Payment recorded from gateway callback".to_string(),
        };
        Ok(ReconcileOutcome::applied(&payment, message))
    }

    /// Moves the booking to payment confirmed, then notifies. Notification failures
    /// never undo the update. Bookings already past payment keep their status; the
    /// completed payment row stands either way.
    async fn confirm_booking(&self, payment: &Payment) -> Result<Confirmation, AppError> {
        let Some(mut booking) = self.store.bookings.get(payment.booking_id).await? else {
            tracing::warn!("Payment {} references missing booking {}", payment.id, payment.booking_id);
            return Ok(Confirmation::MissingBooking);
        };

        if !booking.status.precedes_payment() {
            let stage = if booking.status.is_terminal() { "terminal" } else { "later" };
            tracing::warn!(
                "Payment {} completed but booking {} is in {} state '{}'; status left unchanged",
                payment.id, booking.id, stage, booking.status
            );
            return Ok(Confirmation::Left(booking.status));
        }

        let status = BookingStatus::PaymentConfirmed;
        self.store.bookings.update_status(booking.id, &status).await?;
        tracing::info!("Booking {} moved from '{}' to '{}'", booking.id, booking.status, status);
        booking.status = status.clone();

        let mut requests = vec![NotificationRequest::payment_receipt(&booking, payment)];
        requests.extend(NotificationRequest::both_parties(
            &booking,
            &status,
            "Payment received. The booking is confirmed.",
        ));
        dispatch_all(self.notifier.as_ref(), &requests).await;

        Ok(Confirmation::Confirmed)
    }
}

#[derive(Debug, PartialEq)]
enum Confirmation {
    Confirmed,
    /// The booking had already moved past payment.
    Left(BookingStatus),
    MissingBooking,
}

/// The gateway only ever sees 200, 400 or 500, so a row that vanished
/// mid-reconciliation surfaces as a store failure.
fn as_store_fault(e: AppError) -> AppError {
    match e {
        AppError::NotFound(what) => AppError::Database(format!("{} not found during reconciliation", what)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_rows_surface_as_store_faults() {
        let mapped = as_store_fault(AppError::NotFound("booking status 'payment confirmed'".to_string()));
        assert!(matches!(mapped, AppError::Database(ref msg) if msg.contains("payment confirmed")));
        assert!(matches!(
            as_store_fault(AppError::Validation("amount".to_string())),
            AppError::Validation(_)
        ));
    }

    #[test]
    fn test_callback_time_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(parse_callback_time("2025-03-14 09:26:53"), Some(expected));
        assert_eq!(parse_callback_time("2025-03-14T09:26:53"), Some(expected));
        assert_eq!(parse_callback_time("2025-03-14T12:26:53+03:00"), Some(expected));
        assert_eq!(parse_callback_time("yesterday"), None);
    }

    #[test]
    fn test_callback_aliases() {
        let callback: GatewayCallback = serde_json::from_value(serde_json::json!({
            "transaction_token": "tok_1",
            "order_reference_number": "MH_ref_1",
            "status": "SUCCESSFUL",
            "amount": "25.000"
        }))
        .unwrap();
        assert_eq!(callback.token.as_deref(), Some("tok_1"));
        assert_eq!(callback.reference_number.as_deref(), Some("MH_ref_1"));
    }

    #[test]
    fn test_missing_reference_or_status_is_rejected() {
        let missing_reference = GatewayCallback {
            status: Some("SUCCESSFUL".to_string()),
            ..GatewayCallback::default()
        };
        assert_eq!(missing_reference.check().unwrap_err().field, "reference_number");

        let missing_status = GatewayCallback {
            reference_number: Some("tok_1".to_string()),
            ..GatewayCallback::default()
        };
        assert_eq!(missing_status.check().unwrap_err().field, "status");
    }

    #[test]
    fn test_blank_payment_type_is_dropped() {
        let callback = GatewayCallback {
            reference_number: Some(" ref-1 ".to_string()),
            status: Some("SUCCESSFUL".to_string()),
            payment_type: Some("  ".to_string()),
            ..GatewayCallback::default()
        };
        let checked = callback.check().unwrap();
        assert_eq!(checked.reference, "ref-1");
        assert!(checked.payment_type.is_none());
    }
}
