//! Booking domain entity and its lifecycle states.
//! Framework-agnostic; persistence lives behind `ports::BookingRepository`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Maximum number of script rejection cycles before the retry loop stops.
pub const MAX_SCRIPT_REJECTIONS: i32 = 3;

/// Lifecycle state of a booking. Labels match the `booking_statuses.name` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum BookingStatus {
    AwaitingApproval,
    AwaitingPayment,
    PaymentConfirmed,
    AwaitingScript,
    AwaitingScriptApproval,
    ScriptRejected,
    ToBePublish,
    Published,
    AutoRejected,
    AutoCancelled,
    ScriptNotSentAutoRefund,
    AutoApproved,
    Refunded,
    /// Any state the automation does not act on (set by the admin panel or other collaborators).
    Other(String),
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 13] = [
        BookingStatus::AwaitingApproval,
        BookingStatus::AwaitingPayment,
        BookingStatus::PaymentConfirmed,
        BookingStatus::AwaitingScript,
        BookingStatus::AwaitingScriptApproval,
        BookingStatus::ScriptRejected,
        BookingStatus::ToBePublish,
        BookingStatus::Published,
        BookingStatus::AutoRejected,
        BookingStatus::AutoCancelled,
        BookingStatus::ScriptNotSentAutoRefund,
        BookingStatus::AutoApproved,
        BookingStatus::Refunded,
    ];

    pub fn label(&self) -> &str {
        match self {
            BookingStatus::AwaitingApproval => "awaiting approval from influencer",
            BookingStatus::AwaitingPayment => "awaiting payment",
            BookingStatus::PaymentConfirmed => "payment confirmed",
            BookingStatus::AwaitingScript => "awaiting script",
            BookingStatus::AwaitingScriptApproval => "awaiting script approval",
            BookingStatus::ScriptRejected => "script rejected",
            BookingStatus::ToBePublish => "To Be Publish",
            BookingStatus::Published => "Published",
            BookingStatus::AutoRejected => "auto-reject",
            BookingStatus::AutoCancelled => "auto-cancel",
            BookingStatus::ScriptNotSentAutoRefund => {
                "Script not sent by influencer\u{2013}auto refund request"
            }
            BookingStatus::AutoApproved => "Auto-Approved",
            BookingStatus::Refunded => "refunded",
            BookingStatus::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        BookingStatus::ALL
            .iter()
            .find(|status| status.label() == label)
            .cloned()
            .unwrap_or_else(|| BookingStatus::Other(label.to_string()))
    }

    /// States a booking sits in before its payment is confirmed.
    pub fn precedes_payment(&self) -> bool {
        matches!(
            self,
            BookingStatus::AwaitingApproval | BookingStatus::AwaitingPayment
        )
    }

    /// Terminal states are never left by the automation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::AutoRejected
                | BookingStatus::AutoCancelled
                | BookingStatus::ScriptNotSentAutoRefund
                | BookingStatus::Refunded
                | BookingStatus::Published
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl From<BookingStatus> for String {
    fn from(status: BookingStatus) -> Self {
        status.label().to_string()
    }
}

impl From<String> for BookingStatus {
    fn from(label: String) -> Self {
        BookingStatus::from_label(&label)
    }
}

/// One commissioned piece of influencer content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub status: BookingStatus,
    pub customer_id: Uuid,
    pub influencer_id: Uuid,
    pub service_id: Uuid,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub approval_deadline: Option<DateTime<Utc>>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub script_submission_deadline: Option<DateTime<Utc>>,
    pub auto_approval_deadline: Option<DateTime<Utc>>,
    pub appointment_end_time: Option<DateTime<Utc>>,
    pub influencer_response_deadline: Option<DateTime<Utc>>,
    pub script_rejection_count: i32,
    pub last_script_submitted_at: Option<DateTime<Utc>>,
    pub last_script_rejected_at: Option<DateTime<Utc>>,
    pub is_published: bool,
    pub day_gap: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// A booking freshly placed by a customer, waiting for the influencer.
    pub fn new(customer_id: Uuid, influencer_id: Uuid, service_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            status: BookingStatus::AwaitingApproval,
            customer_id,
            influencer_id,
            service_id,
            scheduled_time: None,
            approval_deadline: None,
            payment_deadline: None,
            script_submission_deadline: None,
            auto_approval_deadline: None,
            appointment_end_time: None,
            influencer_response_deadline: None,
            script_rejection_count: 0,
            last_script_submitted_at: None,
            last_script_rejected_at: None,
            is_published: false,
            day_gap: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: BookingStatus) -> Self {
        self.status = status;
        self
    }

    pub fn deadline(&self, column: DeadlineColumn) -> Option<DateTime<Utc>> {
        match column {
            DeadlineColumn::ApprovalDeadline => self.approval_deadline,
            DeadlineColumn::PaymentDeadline => self.payment_deadline,
            DeadlineColumn::ScriptSubmissionDeadline => self.script_submission_deadline,
            DeadlineColumn::AutoApprovalDeadline => self.auto_approval_deadline,
            DeadlineColumn::AppointmentEndTime => self.appointment_end_time,
            DeadlineColumn::InfluencerResponseDeadline => self.influencer_response_deadline,
        }
    }

    /// True when `column` has elapsed, or when `include_scheduled_time` is set and the
    /// scheduled delivery time has elapsed.
    pub fn is_overdue(
        &self,
        column: DeadlineColumn,
        include_scheduled_time: bool,
        now: DateTime<Utc>,
    ) -> bool {
        let deadline_passed = self.deadline(column).is_some_and(|at| at <= now);
        let delivery_passed =
            include_scheduled_time && self.scheduled_time.is_some_and(|at| at <= now);
        deadline_passed || delivery_passed
    }

    pub fn has_submitted_script(&self) -> bool {
        self.last_script_submitted_at.is_some()
    }
}

/// State-specific deadline columns on `bookings`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineColumn {
    ApprovalDeadline,
    PaymentDeadline,
    ScriptSubmissionDeadline,
    AutoApprovalDeadline,
    AppointmentEndTime,
    InfluencerResponseDeadline,
}

impl DeadlineColumn {
    pub fn column_name(&self) -> &'static str {
        match self {
            DeadlineColumn::ApprovalDeadline => "approval_deadline",
            DeadlineColumn::PaymentDeadline => "payment_deadline",
            DeadlineColumn::ScriptSubmissionDeadline => "script_submission_deadline",
            DeadlineColumn::AutoApprovalDeadline => "auto_approval_deadline",
            DeadlineColumn::AppointmentEndTime => "appointment_end_time",
            DeadlineColumn::InfluencerResponseDeadline => "influencer_response_deadline",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_status_labels_round_trip() {
        for status in BookingStatus::ALL.iter() {
            assert_eq!(&BookingStatus::from_label(status.label()), status);
        }
    }

    #[test]
    fn test_unknown_label_is_preserved() {
        let status = BookingStatus::from_label("on hold");
        assert_eq!(status, BookingStatus::Other("on hold".to_string()));
        assert_eq!(status.label(), "on hold");
    }

    #[test]
    fn test_script_not_sent_label_uses_en_dash() {
        assert_eq!(
            BookingStatus::ScriptNotSentAutoRefund.label(),
            "Script not sent by influencer–auto refund request"
        );
    }

    #[test]
    fn test_overdue_by_deadline_or_delivery_time() {
        let now = Utc::now();
        let mut booking = Booking::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        assert!(!booking.is_overdue(DeadlineColumn::ApprovalDeadline, true, now));

        booking.approval_deadline = Some(now - Duration::minutes(1));
        assert!(booking.is_overdue(DeadlineColumn::ApprovalDeadline, false, now));

        booking.approval_deadline = Some(now + Duration::hours(1));
        booking.scheduled_time = Some(now - Duration::minutes(5));
        assert!(booking.is_overdue(DeadlineColumn::ApprovalDeadline, true, now));
        assert!(!booking.is_overdue(DeadlineColumn::ApprovalDeadline, false, now));
    }

    #[test]
    fn test_terminal_states() {
        assert!(BookingStatus::AutoRejected.is_terminal());
        assert!(BookingStatus::Published.is_terminal());
        assert!(!BookingStatus::ToBePublish.is_terminal());
        assert!(!BookingStatus::ScriptRejected.is_terminal());
    }
}
