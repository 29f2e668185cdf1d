//! Transition Executor: one sweep over every overdue booking.
//!
//! Each rule scans, then handles its bookings one at a time. A booking that fails is
//! recorded in the summary and skipped; the rest of the sweep carries on.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{BlackMark, Booking, BookingStatus, MAX_SCRIPT_REJECTIONS};
use crate::notifications::{dispatch_all, NotificationDispatcher, NotificationRequest};
use crate::ports::{RepositoryResult, Store};
use crate::services::refund::{RefundCommand, RefundInitiator};
use crate::services::scanner::{self, DeadlineScanner, ScanRule};

const UNAPPROVED_REFUND_REASON: &str = "Influencer did not approve the booking in time";
const SCRIPT_NOT_SENT_REFUND_REASON: &str = "Influencer did not submit a script in time";
const NOT_PUBLISHED_REASON: &str = "Content was not published before the appointment ended";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepSummary {
    pub auto_rejected: usize,
    pub auto_cancelled: usize,
    pub auto_refunded: usize,
    pub auto_approved: usize,
    pub published: usize,
    pub black_marked: usize,
    pub script_regeneration_due: usize,
    pub errors: Vec<String>,
}

impl SweepSummary {
    pub fn transitions(&self) -> usize {
        self.auto_rejected + self.auto_cancelled + self.auto_refunded + self.auto_approved + self.published
    }

    fn record_error(&mut self, error: String) {
        tracing::error!("{}", error);
        self.errors.push(error);
    }
}

#[derive(Clone)]
pub struct TransitionExecutor {
    store: Store,
    scanner: DeadlineScanner,
    refunds: RefundInitiator,
    notifier: Arc<dyn NotificationDispatcher>,
}

impl TransitionExecutor {
    pub fn new(store: Store, refunds: RefundInitiator, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        let scanner = DeadlineScanner::new(store.bookings.clone());
        Self {
            store,
            scanner,
            refunds,
            notifier,
        }
    }

    /// Runs every rule against `now`. Running it twice with the same `now` changes
    /// nothing the second time.
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> SweepSummary {
        let mut summary = SweepSummary::default();

        if let Some(bookings) = self.scan(self.scanner.unapproved(now).await, &scanner::UNAPPROVED, &mut summary) {
            for booking in bookings {
                self.auto_reject(&booking, &mut summary).await;
            }
        }

        if let Some(bookings) = self.scan(self.scanner.unpaid(now).await, &scanner::UNPAID, &mut summary) {
            for booking in bookings {
                self.auto_cancel(&booking, &mut summary).await;
            }
        }

        if let Some(bookings) =
            self.scan(self.scanner.script_not_sent(now).await, &scanner::SCRIPT_NOT_SENT, &mut summary)
        {
            for booking in bookings {
                self.auto_refund_missing_script(&booking, &mut summary).await;
            }
        }

        if let Some(bookings) = self.scan(
            self.scanner.script_unreviewed(now).await,
            &scanner::SCRIPT_UNREVIEWED,
            &mut summary,
        ) {
            for booking in bookings {
                self.auto_approve(&booking, &mut summary).await;
            }
        }

        // Rules run in lifecycle order: a booking auto-approved above whose appointment
        // has already ended is published or black-marked in this same sweep.
        if let Some(bookings) = self.scan(
            self.scanner.publish_window_closed(now).await,
            &scanner::PUBLISH_WINDOW_CLOSED,
            &mut summary,
        ) {
            for booking in bookings {
                self.close_publish_window(&booking, &mut summary).await;
            }
        }

        if let Some(bookings) = self.scan(
            self.scanner.influencer_response_due(now).await,
            &scanner::INFLUENCER_RESPONSE_DUE,
            &mut summary,
        ) {
            for booking in bookings {
                tracing::info!(
                    "Booking {} is due for script regeneration (rejection {} of {})",
                    booking.id,
                    booking.script_rejection_count,
                    MAX_SCRIPT_REJECTIONS
                );
                summary.script_regeneration_due += 1;
            }
        }

        tracing::info!(
            auto_rejected = summary.auto_rejected,
            auto_cancelled = summary.auto_cancelled,
            auto_refunded = summary.auto_refunded,
            auto_approved = summary.auto_approved,
            published = summary.published,
            black_marked = summary.black_marked,
            script_regeneration_due = summary.script_regeneration_due,
            errors = summary.errors.len(),
            "Automation sweep finished"
        );

        summary
    }

    fn scan(
        &self,
        result: RepositoryResult<Vec<Booking>>,
        rule: &ScanRule,
        summary: &mut SweepSummary,
    ) -> Option<Vec<Booking>> {
        match result {
            Ok(bookings) => Some(bookings),
            Err(e) => {
                summary.record_error(format!("scan '{}' failed: {}", rule.name, e));
                None
            }
        }
    }

    /// Writes the new status. On failure the error is recorded and the caller skips
    /// every side effect for this booking.
    async fn transition(&self, booking: &Booking, status: BookingStatus, summary: &mut SweepSummary) -> bool {
        match self.store.bookings.update_status(booking.id, &status).await {
            Ok(()) => {
                tracing::info!("Booking {} moved from '{}' to '{}'", booking.id, booking.status, status);
                true
            }
            Err(e) => {
                summary.record_error(format!("booking {}: failed to set '{}': {}", booking.id, status, e));
                false
            }
        }
    }

    async fn notify_both(&self, booking: &Booking, status: &BookingStatus, message: &str) {
        let requests = NotificationRequest::both_parties(booking, status, message);
        dispatch_all(self.notifier.as_ref(), &requests).await;
    }

    async fn auto_reject(&self, booking: &Booking, summary: &mut SweepSummary) {
        let status = BookingStatus::AutoRejected;
        if !self.transition(booking, status.clone(), summary).await {
            return;
        }
        summary.auto_rejected += 1;

        match self.store.payments.find_completed_for_booking(booking.id).await {
            Ok(payments) if payments.is_empty() => {}
            Ok(_) => {
                match self
                    .refunds
                    .initiate(RefundCommand::system(booking.id, UNAPPROVED_REFUND_REASON))
                    .await
                {
                    Ok(outcome) if outcome.success => {}
                    Ok(outcome) => summary.record_error(format!(
                        "booking {}: refund {} {}: {}",
                        booking.id,
                        outcome.refund_id,
                        outcome.status,
                        outcome.error.unwrap_or_default()
                    )),
                    Err(e) => summary.record_error(format!("booking {}: refund not started: {}", booking.id, e)),
                }
            }
            Err(e) => summary.record_error(format!("booking {}: payment lookup failed: {}", booking.id, e)),
        }

        self.notify_both(
            booking,
            &status,
            "The influencer did not respond in time, so the booking was rejected automatically.",
        )
        .await;
    }

    async fn auto_cancel(&self, booking: &Booking, summary: &mut SweepSummary) {
        let status = BookingStatus::AutoCancelled;
        if !self.transition(booking, status.clone(), summary).await {
            return;
        }
        summary.auto_cancelled += 1;

        self.notify_both(
            booking,
            &status,
            "Payment was not received before the deadline, so the booking was cancelled.",
        )
        .await;
    }

    async fn auto_refund_missing_script(&self, booking: &Booking, summary: &mut SweepSummary) {
        let status = BookingStatus::ScriptNotSentAutoRefund;
        if !self.transition(booking, status.clone(), summary).await {
            return;
        }
        summary.auto_refunded += 1;

        match self.refunds.record_pending(booking.id, SCRIPT_NOT_SENT_REFUND_REASON).await {
            Ok(_) => {}
            Err(e) => tracing::warn!("Booking {}: no refund recorded: {}", booking.id, e),
        }

        self.notify_both(
            booking,
            &status,
            "The script was not submitted in time. A refund has been requested.",
        )
        .await;
    }

    async fn auto_approve(&self, booking: &Booking, summary: &mut SweepSummary) {
        if !self.transition(booking, BookingStatus::ToBePublish, summary).await {
            return;
        }
        summary.auto_approved += 1;

        self.notify_both(
            booking,
            &BookingStatus::AutoApproved,
            "The script was approved automatically and is ready to be published.",
        )
        .await;
    }

    async fn close_publish_window(&self, booking: &Booking, summary: &mut SweepSummary) {
        if booking.is_published {
            if self.transition(booking, BookingStatus::Published, summary).await {
                summary.published += 1;
                self.notify_both(booking, &BookingStatus::Published, "Your content has been published.")
                    .await;
            }
            return;
        }

        match self.store.black_marks.exists_for_booking(booking.id).await {
            Ok(true) => {
                tracing::debug!("Booking {} already carries a black mark", booking.id);
            }
            Ok(false) => {
                let mark = BlackMark::system(
                    booking.id,
                    booking.influencer_id,
                    booking.service_id,
                    NOT_PUBLISHED_REASON.to_string(),
                );
                match self.store.black_marks.insert(&mark).await {
                    Ok(mark) => {
                        tracing::warn!(
                            "Black mark {} issued to influencer {} for booking {}",
                            mark.id, mark.influencer_id, booking.id
                        );
                        summary.black_marked += 1;
                    }
                    Err(e) => summary.record_error(format!("booking {}: black mark failed: {}", booking.id, e)),
                }
            }
            Err(e) => summary.record_error(format!("booking {}: black mark lookup failed: {}", booking.id, e)),
        }
    }
}
