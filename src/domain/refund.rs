//! Refund and black-mark records.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RefundStatus::Pending),
            "processing" => Some(RefundStatus::Processing),
            "completed" => Some(RefundStatus::Completed),
            "failed" => Some(RefundStatus::Failed),
            _ => None,
        }
    }

    /// Gateway response codes: "000" accepted, "001" queued, anything else rejected.
    pub fn from_gateway_code(code: &str) -> Self {
        match code.trim() {
            "000" => RefundStatus::Completed,
            "001" => RefundStatus::Processing,
            _ => RefundStatus::Failed,
        }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request to return funds for a payment. `initiated_by = None` means system-initiated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub payment_id: Uuid,
    pub transaction_reference: Option<String>,
    pub amount: BigDecimal,
    pub currency: String,
    pub reason: String,
    pub status: RefundStatus,
    pub gateway_refund_id: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
    pub initiated_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    pub fn new(
        booking_id: Uuid,
        payment_id: Uuid,
        transaction_reference: Option<String>,
        amount: BigDecimal,
        currency: String,
        reason: String,
        status: RefundStatus,
        initiated_by: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            payment_id,
            transaction_reference,
            amount,
            currency,
            reason,
            status,
            gateway_refund_id: None,
            gateway_response: None,
            initiated_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Unique gateway-side key for this refund attempt.
    pub fn order_reference_number(&self) -> String {
        format!("REFUND-{}", self.id)
    }

    pub fn is_system_initiated(&self) -> bool {
        self.initiated_by.is_none()
    }
}

/// Final outcome written back onto a refund after the gateway answered.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcomeUpdate {
    pub status: RefundStatus,
    pub gateway_refund_id: Option<String>,
    pub gateway_response: Option<serde_json::Value>,
}

/// Penalty against an influencer. `created_by = None` means system-created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackMark {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub influencer_id: Uuid,
    pub service_id: Uuid,
    pub reason: String,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl BlackMark {
    pub fn system(booking_id: Uuid, influencer_id: Uuid, service_id: Uuid, reason: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            influencer_id,
            service_id,
            reason,
            created_by: None,
            created_at: Utc::now(),
        }
    }
}
