//! Deadline Scanner: finds bookings whose state-specific deadline has elapsed.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::domain::{Booking, BookingStatus, DeadlineColumn, MAX_SCRIPT_REJECTIONS};
use crate::ports::{BookingRepository, RepositoryResult};

/// Which bookings a sweep rule looks at.
#[derive(Debug, Clone, Copy)]
pub struct ScanRule {
    pub name: &'static str,
    pub statuses: &'static [BookingStatus],
    pub column: DeadlineColumn,
    /// Also match when the scheduled delivery time has passed, so nothing sits in a
    /// pending state past its delivery date.
    pub include_scheduled_time: bool,
}

pub const UNAPPROVED: ScanRule = ScanRule {
    name: "awaiting approval",
    statuses: &[BookingStatus::AwaitingApproval],
    column: DeadlineColumn::ApprovalDeadline,
    include_scheduled_time: true,
};

pub const UNPAID: ScanRule = ScanRule {
    name: "awaiting payment",
    statuses: &[BookingStatus::AwaitingPayment],
    column: DeadlineColumn::PaymentDeadline,
    include_scheduled_time: true,
};

pub const SCRIPT_NOT_SENT: ScanRule = ScanRule {
    name: "awaiting script",
    statuses: &[BookingStatus::PaymentConfirmed, BookingStatus::AwaitingScript],
    column: DeadlineColumn::ScriptSubmissionDeadline,
    include_scheduled_time: true,
};

pub const SCRIPT_UNREVIEWED: ScanRule = ScanRule {
    name: "awaiting script approval",
    statuses: &[BookingStatus::AwaitingScriptApproval, BookingStatus::ScriptRejected],
    column: DeadlineColumn::AutoApprovalDeadline,
    include_scheduled_time: true,
};

pub const PUBLISH_WINDOW_CLOSED: ScanRule = ScanRule {
    name: "to be published",
    statuses: &[BookingStatus::ToBePublish],
    column: DeadlineColumn::AppointmentEndTime,
    include_scheduled_time: false,
};

pub const INFLUENCER_RESPONSE_DUE: ScanRule = ScanRule {
    name: "script rejected",
    statuses: &[BookingStatus::ScriptRejected],
    column: DeadlineColumn::InfluencerResponseDeadline,
    include_scheduled_time: false,
};

#[derive(Clone)]
pub struct DeadlineScanner {
    bookings: Arc<dyn BookingRepository>,
}

impl DeadlineScanner {
    pub fn new(bookings: Arc<dyn BookingRepository>) -> Self {
        Self { bookings }
    }

    pub async fn scan(&self, rule: &ScanRule, now: DateTime<Utc>) -> RepositoryResult<Vec<Booking>> {
        let found = self
            .bookings
            .find_overdue(rule.statuses, rule.column, rule.include_scheduled_time, now)
            .await?;
        tracing::debug!(rule = rule.name, count = found.len(), "Scanned overdue bookings");
        Ok(found)
    }

    pub async fn unapproved(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Booking>> {
        self.scan(&UNAPPROVED, now).await
    }

    pub async fn unpaid(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Booking>> {
        self.scan(&UNPAID, now).await
    }

    /// Paid bookings whose influencer never submitted a script.
    pub async fn script_not_sent(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Booking>> {
        Ok(self
            .scan(&SCRIPT_NOT_SENT, now)
            .await?
            .into_iter()
            .filter(|b| !b.has_submitted_script())
            .collect())
    }

    /// Submitted scripts the customer neither approved nor rejected in time.
    pub async fn script_unreviewed(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Booking>> {
        Ok(self
            .scan(&SCRIPT_UNREVIEWED, now)
            .await?
            .into_iter()
            .filter(Booking::has_submitted_script)
            .collect())
    }

    pub async fn publish_window_closed(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Booking>> {
        self.scan(&PUBLISH_WINDOW_CLOSED, now).await
    }

    /// Rejected scripts still inside the retry budget whose influencer response is overdue.
    pub async fn influencer_response_due(&self, now: DateTime<Utc>) -> RepositoryResult<Vec<Booking>> {
        Ok(self
            .scan(&INFLUENCER_RESPONSE_DUE, now)
            .await?
            .into_iter()
            .filter(|b| b.script_rejection_count < MAX_SCRIPT_REJECTIONS)
            .collect())
    }
}
