//! Payment domain entity.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    /// Maps a gateway callback status onto a local payment status.
    /// Unrecognised values leave the payment pending.
    pub fn from_gateway(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "SUCCESSFUL" | "SUCCESS" => PaymentStatus::Completed,
            "FAILED" | "FAILURE" => PaymentStatus::Failed,
            "PENDING" | "PROCESSING" => PaymentStatus::Processing,
            _ => PaymentStatus::Pending,
        }
    }

    /// Statuses a checkout attempt can still be reconciled from.
    pub fn is_open(&self) -> bool {
        matches!(self, PaymentStatus::Pending | PaymentStatus::Processing)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One attempt to charge the customer for a booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payer_id: Uuid,
    pub payee_id: Uuid,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub transaction_reference: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        booking_id: Uuid,
        payer_id: Uuid,
        payee_id: Uuid,
        amount: BigDecimal,
        currency: String,
        transaction_reference: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            payer_id,
            payee_id,
            amount,
            currency,
            status: PaymentStatus::Pending,
            transaction_reference,
            paid_at: None,
            payment_method: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_transaction_reference(&self) -> bool {
        self.transaction_reference
            .as_deref()
            .is_some_and(|reference| !reference.trim().is_empty())
    }
}

/// Fields a gateway callback may change on an existing payment.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub paid_at: Option<DateTime<Utc>>,
    pub transaction_reference: Option<String>,
    pub payment_method: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_status_mapping() {
        assert_eq!(PaymentStatus::from_gateway("SUCCESSFUL"), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::from_gateway("success"), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::from_gateway("FAILED"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_gateway("FAILURE"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_gateway("PENDING"), PaymentStatus::Processing);
        assert_eq!(PaymentStatus::from_gateway("PROCESSING"), PaymentStatus::Processing);
        assert_eq!(PaymentStatus::from_gateway("CAPTURED?"), PaymentStatus::Pending);
    }

    #[test]
    fn test_status_parse_matches_as_str() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Processing,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PaymentStatus::parse("refunded"), None);
    }

    #[test]
    fn test_blank_reference_is_missing() {
        let mut payment = Payment::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            BigDecimal::from(10),
            "KWD".to_string(),
            Some("  ".to_string()),
        );
        assert!(!payment.has_transaction_reference());
        payment.transaction_reference = Some("tok_123".to_string());
        assert!(payment.has_transaction_reference());
    }
}
