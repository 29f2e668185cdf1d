//! In-memory implementation of every repository port.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{
    BlackMark, Booking, BookingStatus, DeadlineColumn, Payment, PaymentStatus, PaymentUpdate,
    Refund, RefundOutcomeUpdate,
};
use crate::ports::{
    BlackMarkRepository, BookingRepository, PaymentRepository, RefundRepository,
    RepositoryError, RepositoryResult, Store,
};

#[derive(Default)]
struct Tables {
    bookings: HashMap<Uuid, Booking>,
    payments: HashMap<Uuid, Payment>,
    refunds: HashMap<Uuid, Refund>,
    black_marks: Vec<BlackMark>,
}

/// A thread-safe in-memory store for bookings, payments, refunds and black marks.
///
/// Cloning shares the same tables. Every write bumps `write_count`, which lets tests
/// assert that a code path only read.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    writes: Arc<AtomicUsize>,
    failing_status_updates: Arc<RwLock<HashSet<Uuid>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> Store {
        let shared = Arc::new(self.clone());
        Store {
            bookings: shared.clone(),
            payments: shared.clone(),
            refunds: shared.clone(),
            black_marks: shared,
        }
    }

    pub async fn seed_booking(&self, booking: Booking) {
        self.tables.write().await.bookings.insert(booking.id, booking);
    }

    pub async fn seed_payment(&self, payment: Payment) {
        self.tables.write().await.payments.insert(payment.id, payment);
    }

    /// Makes every subsequent status update of `booking_id` fail.
    pub async fn fail_status_updates_for(&self, booking_id: Uuid) {
        self.failing_status_updates.write().await.insert(booking_id);
    }

    pub async fn booking(&self, id: Uuid) -> Option<Booking> {
        self.tables.read().await.bookings.get(&id).cloned()
    }

    pub async fn payments_for(&self, booking_id: Uuid) -> Vec<Payment> {
        let tables = self.tables.read().await;
        let mut payments: Vec<Payment> = tables
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        payments
    }

    pub async fn refunds_for(&self, booking_id: Uuid) -> Vec<Refund> {
        let tables = self.tables.read().await;
        let mut refunds: Vec<Refund> = tables
            .refunds
            .values()
            .filter(|r| r.booking_id == booking_id)
            .cloned()
            .collect();
        refunds.sort_by_key(|r| r.created_at);
        refunds
    }

    pub async fn black_marks(&self) -> Vec<BlackMark> {
        self.tables.read().await.black_marks.clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        Ok(self.tables.read().await.bookings.get(&id).cloned())
    }

    async fn find_overdue(
        &self,
        statuses: &[BookingStatus],
        column: DeadlineColumn,
        include_scheduled_time: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Booking>> {
        let tables = self.tables.read().await;
        let mut overdue: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| statuses.contains(&b.status))
            .filter(|b| b.is_overdue(column, include_scheduled_time, now))
            .cloned()
            .collect();
        overdue.sort_by_key(|b| b.created_at);
        Ok(overdue)
    }

    async fn update_status(&self, id: Uuid, status: &BookingStatus) -> RepositoryResult<()> {
        if self.failing_status_updates.read().await.contains(&id) {
            return Err(RepositoryError::Database(format!(
                "status update rejected for booking {}",
                id
            )));
        }
        if let BookingStatus::Other(label) = status {
            return Err(RepositoryError::NotFound(format!("booking status '{}'", label)));
        }

        let mut tables = self.tables.write().await;
        let booking = tables
            .bookings
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("booking {}", id)))?;
        booking.status = status.clone();
        booking.updated_at = Utc::now();
        self.record_write();
        Ok(())
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Payment>> {
        Ok(self.tables.read().await.payments.get(&id).cloned())
    }

    async fn find_by_transaction_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|p| p.transaction_reference.as_deref() == Some(reference))
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn find_latest_open_for_booking(
        &self,
        booking_id: Uuid,
    ) -> RepositoryResult<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .values()
            .filter(|p| p.booking_id == booking_id && p.status.is_open())
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn find_completed_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Vec<Payment>> {
        Ok(self
            .payments_for(booking_id)
            .await
            .into_iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .collect())
    }

    async fn insert(&self, payment: &Payment) -> RepositoryResult<Payment> {
        let mut tables = self.tables.write().await;
        if tables.payments.contains_key(&payment.id) {
            return Err(RepositoryError::Conflict(format!("payment {}", payment.id)));
        }
        tables.payments.insert(payment.id, payment.clone());
        self.record_write();
        Ok(payment.clone())
    }

    async fn apply_update(&self, id: Uuid, update: &PaymentUpdate) -> RepositoryResult<Payment> {
        let mut tables = self.tables.write().await;
        let payment = tables
            .payments
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("payment {}", id)))?;
        payment.status = update.status;
        if update.paid_at.is_some() {
            payment.paid_at = update.paid_at;
        }
        if update.transaction_reference.is_some() {
            payment.transaction_reference = update.transaction_reference.clone();
        }
        if update.payment_method.is_some() {
            payment.payment_method = update.payment_method.clone();
        }
        payment.updated_at = Utc::now();
        self.record_write();
        Ok(payment.clone())
    }
}

#[async_trait]
impl RefundRepository for InMemoryStore {
    async fn insert(&self, refund: &Refund) -> RepositoryResult<Refund> {
        let mut tables = self.tables.write().await;
        tables.refunds.insert(refund.id, refund.clone());
        self.record_write();
        Ok(refund.clone())
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &RefundOutcomeUpdate,
    ) -> RepositoryResult<Refund> {
        let mut tables = self.tables.write().await;
        let refund = tables
            .refunds
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("refund {}", id)))?;
        refund.status = outcome.status;
        refund.gateway_refund_id = outcome.gateway_refund_id.clone();
        refund.gateway_response = outcome.gateway_response.clone();
        refund.updated_at = Utc::now();
        self.record_write();
        Ok(refund.clone())
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Vec<Refund>> {
        Ok(self.refunds_for(booking_id).await)
    }
}

#[async_trait]
impl BlackMarkRepository for InMemoryStore {
    async fn insert(&self, mark: &BlackMark) -> RepositoryResult<BlackMark> {
        self.tables.write().await.black_marks.push(mark.clone());
        self.record_write();
        Ok(mark.clone())
    }

    async fn exists_for_booking(&self, booking_id: Uuid) -> RepositoryResult<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .black_marks
            .iter()
            .any(|m| m.booking_id == booking_id && m.created_by.is_none()))
    }
}
