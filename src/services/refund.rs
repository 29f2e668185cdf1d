use bigdecimal::BigDecimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{Payment, Refund, RefundOutcomeUpdate, RefundStatus};
use crate::error::AppError;
use crate::gateway::{HesabeClient, RefundRequest};
use crate::ports::Store;
use crate::validation::{validate_positive_amount, ValidationError};

/// Currencies the gateway settles with three minor-unit digits.
const THREE_DECIMAL_CURRENCIES: &[&str] = &["KWD", "BHD", "OMR", "JOD", "IQD", "LYD", "TND"];

/// A request to refund the completed payment of a booking.
#[derive(Debug, Clone)]
pub struct RefundCommand {
    pub booking_id: Uuid,
    /// Defaults to the full payment amount.
    pub amount: Option<BigDecimal>,
    pub reason: String,
    /// `None` for refunds the automation raises itself.
    pub initiated_by: Option<Uuid>,
}

impl RefundCommand {
    pub fn system(booking_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            booking_id,
            amount: None,
            reason: reason.into(),
            initiated_by: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub success: bool,
    pub refund_id: Uuid,
    pub status: RefundStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_refund_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Refund Initiator: records a refund and submits it to the payment gateway.
#[derive(Clone)]
pub struct RefundInitiator {
    store: Store,
    gateway: HesabeClient,
}

impl RefundInitiator {
    pub fn new(store: Store, gateway: HesabeClient) -> Self {
        Self { store, gateway }
    }

    /// Records the refund as processing, calls the gateway and writes the final outcome.
    ///
    /// Precondition failures return an error and leave no record behind. Once the
    /// record exists, a gateway failure is reported through the outcome instead.
    pub async fn initiate(&self, command: RefundCommand) -> Result<RefundOutcome, AppError> {
        let payment = self.refundable_payment(command.booking_id).await?;
        if !payment.has_transaction_reference() {
            return Err(AppError::Validation(format!(
                "payment {} has no gateway transaction reference",
                payment.id
            )));
        }
        let amount = resolve_amount(&payment, command.amount.as_ref())?;

        let refund = Refund::new(
            command.booking_id,
            payment.id,
            payment.transaction_reference.clone(),
            amount,
            payment.currency.clone(),
            command.reason,
            RefundStatus::Processing,
            command.initiated_by,
        );
        let refund = self.store.refunds.insert(&refund).await?;

        tracing::info!(
            "Submitting refund {} of {} {} for booking {}",
            refund.id, refund.amount, refund.currency, refund.booking_id
        );

        let request = RefundRequest {
            merchant_code: self.gateway.merchant_code().to_string(),
            payment_token: refund.transaction_reference.clone().unwrap_or_default(),
            amount: format_amount(&refund.amount, &refund.currency),
            currency: refund.currency.clone(),
            order_reference_number: refund.order_reference_number(),
            reason: refund.reason.clone(),
        };

        let (update, error) = match self.gateway.request_refund(&request).await {
            Ok(response) => {
                let status = RefundStatus::from_gateway_code(response.code.as_deref().unwrap_or_default());
                let error = (status == RefundStatus::Failed).then(|| {
                    format!(
                        "gateway rejected refund: code {}, {}",
                        response.code.as_deref().unwrap_or("missing"),
                        response.message.as_deref().unwrap_or("no message")
                    )
                });
                let update = RefundOutcomeUpdate {
                    status,
                    gateway_refund_id: response.refund_id,
                    gateway_response: Some(response.raw),
                };
                (update, error)
            }
            Err(e) => {
                tracing::error!("Refund {} failed at the gateway: {}", refund.id, e);
                let update = RefundOutcomeUpdate {
                    status: RefundStatus::Failed,
                    gateway_refund_id: None,
                    gateway_response: Some(serde_json::json!({ "error": e.to_string() })),
                };
                (update, Some(e.to_string()))
            }
        };

        let refund = self.store.refunds.record_outcome(refund.id, &update).await?;

        if let Some(error) = &error {
            tracing::warn!("Refund {} for booking {} failed: {}", refund.id, refund.booking_id, error);
        } else {
            tracing::info!("Refund {} for booking {} is {}", refund.id, refund.booking_id, refund.status);
        }

        Ok(RefundOutcome {
            success: refund.status != RefundStatus::Failed,
            refund_id: refund.id,
            status: refund.status,
            gateway_refund_id: refund.gateway_refund_id,
            error,
        })
    }

    /// Records a full-amount refund request without contacting the gateway. It stays
    /// pending until an operator or a later process submits it.
    pub async fn record_pending(&self, booking_id: Uuid, reason: &str) -> Result<Refund, AppError> {
        let payment = self.refundable_payment(booking_id).await?;
        let refund = Refund::new(
            booking_id,
            payment.id,
            payment.transaction_reference.clone(),
            payment.amount.clone(),
            payment.currency.clone(),
            reason.to_string(),
            RefundStatus::Pending,
            None,
        );

        let refund = self.store.refunds.insert(&refund).await?;
        tracing::info!("Recorded pending refund {} for booking {}", refund.id, booking_id);
        Ok(refund)
    }

    pub async fn list_for_booking(&self, booking_id: Uuid) -> Result<Vec<Refund>, AppError> {
        Ok(self.store.refunds.list_for_booking(booking_id).await?)
    }

    /// The single completed payment of a booking. None or several is a precondition failure.
    async fn refundable_payment(&self, booking_id: Uuid) -> Result<Payment, AppError> {
        let mut completed = self.store.payments.find_completed_for_booking(booking_id).await?;
        match completed.len() {
            1 => Ok(completed.remove(0)),
            0 => Err(AppError::Validation(format!(
                "booking {} has no completed payment to refund",
                booking_id
            ))),
            n => Err(AppError::Validation(format!(
                "booking {} has {} completed payments; refund one explicitly",
                booking_id, n
            ))),
        }
    }
}

fn resolve_amount(payment: &Payment, requested: Option<&BigDecimal>) -> Result<BigDecimal, ValidationError> {
    let amount = match requested {
        Some(amount) => amount.clone(),
        None => return Ok(payment.amount.clone()),
    };

    validate_positive_amount("amount", &amount)?;
    if amount > payment.amount {
        return Err(ValidationError::new(
            "amount",
            format!("must not exceed the original payment of {}", payment.amount),
        ));
    }
    Ok(amount)
}

fn format_amount(amount: &BigDecimal, currency: &str) -> String {
    let scale = if THREE_DECIMAL_CURRENCIES.contains(&currency.to_ascii_uppercase().as_str()) {
        3
    } else {
        2
    };
    amount.with_scale(scale).to_string()
}
