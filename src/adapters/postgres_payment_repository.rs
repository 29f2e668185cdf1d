//! Postgres implementation of PaymentRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Payment, PaymentStatus, PaymentUpdate};
use crate::ports::{PaymentRepository, RepositoryError, RepositoryResult};

const PAYMENT_COLUMNS: &str = "id, booking_id, payer_id, payee_id, amount, currency, status, \
     transaction_reference, paid_at, payment_method, created_at, updated_at";

/// Postgres-backed payment repository.
#[derive(Clone)]
pub struct PostgresPaymentRepository {
    pool: PgPool,
}

impl PostgresPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PostgresPaymentRepository {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE id = $1",
            PAYMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn find_by_transaction_reference(
        &self,
        reference: &str,
    ) -> RepositoryResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE transaction_reference = $1 \
             ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn find_latest_open_for_booking(
        &self,
        booking_id: Uuid,
    ) -> RepositoryResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1 \
             AND status IN ('pending', 'processing') \
             ORDER BY created_at DESC LIMIT 1",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.map(PaymentRow::into_domain).transpose()
    }

    async fn find_completed_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1 AND status = 'completed' \
             ORDER BY created_at ASC",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(PaymentRow::into_domain).collect()
    }

    async fn insert(&self, payment: &Payment) -> RepositoryResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            INSERT INTO payments (
                id, booking_id, payer_id, payee_id, amount, currency, status,
                transaction_reference, paid_at, payment_method, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(payment.id)
        .bind(payment.booking_id)
        .bind(payment.payer_id)
        .bind(payment.payee_id)
        .bind(&payment.amount)
        .bind(&payment.currency)
        .bind(payment.status.as_str())
        .bind(&payment.transaction_reference)
        .bind(payment.paid_at)
        .bind(&payment.payment_method)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn apply_update(&self, id: Uuid, update: &PaymentUpdate) -> RepositoryResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            UPDATE payments SET
                status = $1,
                paid_at = COALESCE($2, paid_at),
                transaction_reference = COALESCE($3, transaction_reference),
                payment_method = COALESCE($4, payment_method),
                updated_at = NOW()
            WHERE id = $5
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(update.status.as_str())
        .bind(update.paid_at)
        .bind(&update.transaction_reference)
        .bind(&update.payment_method)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("payment {}", id)))?
            .into_domain()
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    payer_id: Uuid,
    payee_id: Uuid,
    amount: BigDecimal,
    currency: String,
    status: String,
    transaction_reference: Option<String>,
    paid_at: Option<DateTime<Utc>>,
    payment_method: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_domain(self) -> RepositoryResult<Payment> {
        let status = PaymentStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::Database(format!(
                "payment {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;

        Ok(Payment {
            id: self.id,
            booking_id: self.booking_id,
            payer_id: self.payer_id,
            payee_id: self.payee_id,
            amount: self.amount,
            currency: self.currency,
            status,
            transaction_reference: self.transaction_reference,
            paid_at: self.paid_at,
            payment_method: self.payment_method,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
