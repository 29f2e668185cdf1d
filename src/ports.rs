//! Repository ports. Services depend on these traits; `adapters` provides
//! the Postgres and in-memory implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{
    BlackMark, Booking, BookingStatus, DeadlineColumn, Payment, PaymentUpdate, Refund,
    RefundOutcomeUpdate,
};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.to_string())
            }
            other => RepositoryError::Database(other.to_string()),
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Booking>>;

    /// Bookings currently in one of `statuses` whose `column` deadline is at or before
    /// `now`, or (with `include_scheduled_time`) whose scheduled delivery time is.
    async fn find_overdue(
        &self,
        statuses: &[BookingStatus],
        column: DeadlineColumn,
        include_scheduled_time: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Booking>>;

    /// Moves a booking to `status`. The status must exist in `booking_statuses`.
    async fn update_status(&self, id: Uuid, status: &BookingStatus) -> RepositoryResult<()>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Payment>>;

    async fn find_by_transaction_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Payment>>;

    /// Most recent pending or processing payment of a booking.
    async fn find_latest_open_for_booking(
        &self,
        booking_id: Uuid,
    ) -> RepositoryResult<Option<Payment>>;

    async fn find_completed_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Vec<Payment>>;

    async fn insert(&self, payment: &Payment) -> RepositoryResult<Payment>;

    async fn apply_update(&self, id: Uuid, update: &PaymentUpdate) -> RepositoryResult<Payment>;
}

#[async_trait]
pub trait RefundRepository: Send + Sync {
    async fn insert(&self, refund: &Refund) -> RepositoryResult<Refund>;

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &RefundOutcomeUpdate,
    ) -> RepositoryResult<Refund>;

    async fn list_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Vec<Refund>>;
}

#[async_trait]
pub trait BlackMarkRepository: Send + Sync {
    async fn insert(&self, mark: &BlackMark) -> RepositoryResult<BlackMark>;

    async fn exists_for_booking(&self, booking_id: Uuid) -> RepositoryResult<bool>;
}

/// The tables the automation reads and writes.
#[derive(Clone)]
pub struct Store {
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub refunds: Arc<dyn RefundRepository>,
    pub black_marks: Arc<dyn BlackMarkRepository>,
}
