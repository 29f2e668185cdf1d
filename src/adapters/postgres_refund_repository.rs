//! Postgres implementations of RefundRepository and BlackMarkRepository.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{BlackMark, Refund, RefundOutcomeUpdate, RefundStatus};
use crate::ports::{BlackMarkRepository, RefundRepository, RepositoryError, RepositoryResult};

const REFUND_COLUMNS: &str = "id, booking_id, payment_id, transaction_reference, amount, \
     currency, reason, status, gateway_refund_id, gateway_response, initiated_by, \
     created_at, updated_at";

#[derive(Clone)]
pub struct PostgresRefundRepository {
    pool: PgPool,
}

impl PostgresRefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefundRepository for PostgresRefundRepository {
    async fn insert(&self, refund: &Refund) -> RepositoryResult<Refund> {
        let row = sqlx::query_as::<_, RefundRow>(&format!(
            r#"
            INSERT INTO refunds (
                id, booking_id, payment_id, transaction_reference, amount, currency, reason,
                status, gateway_refund_id, gateway_response, initiated_by, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            REFUND_COLUMNS
        ))
        .bind(refund.id)
        .bind(refund.booking_id)
        .bind(refund.payment_id)
        .bind(&refund.transaction_reference)
        .bind(&refund.amount)
        .bind(&refund.currency)
        .bind(&refund.reason)
        .bind(refund.status.as_str())
        .bind(&refund.gateway_refund_id)
        .bind(&refund.gateway_response)
        .bind(refund.initiated_by)
        .bind(refund.created_at)
        .bind(refund.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.into_domain()
    }

    async fn record_outcome(
        &self,
        id: Uuid,
        outcome: &RefundOutcomeUpdate,
    ) -> RepositoryResult<Refund> {
        let row = sqlx::query_as::<_, RefundRow>(&format!(
            r#"
            UPDATE refunds SET
                status = $1,
                gateway_refund_id = $2,
                gateway_response = $3,
                updated_at = NOW()
            WHERE id = $4
            RETURNING {}
            "#,
            REFUND_COLUMNS
        ))
        .bind(outcome.status.as_str())
        .bind(&outcome.gateway_refund_id)
        .bind(&outcome.gateway_response)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        row.ok_or_else(|| RepositoryError::NotFound(format!("refund {}", id)))?
            .into_domain()
    }

    async fn list_for_booking(&self, booking_id: Uuid) -> RepositoryResult<Vec<Refund>> {
        let rows = sqlx::query_as::<_, RefundRow>(&format!(
            "SELECT {} FROM refunds WHERE booking_id = $1 ORDER BY created_at ASC",
            REFUND_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        rows.into_iter().map(RefundRow::into_domain).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    booking_id: Uuid,
    payment_id: Uuid,
    transaction_reference: Option<String>,
    amount: BigDecimal,
    currency: String,
    reason: String,
    status: String,
    gateway_refund_id: Option<String>,
    gateway_response: Option<serde_json::Value>,
    initiated_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl RefundRow {
    fn into_domain(self) -> RepositoryResult<Refund> {
        let status = RefundStatus::parse(&self.status).ok_or_else(|| {
            RepositoryError::Database(format!(
                "refund {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;

        Ok(Refund {
            id: self.id,
            booking_id: self.booking_id,
            payment_id: self.payment_id,
            transaction_reference: self.transaction_reference,
            amount: self.amount,
            currency: self.currency,
            reason: self.reason,
            status,
            gateway_refund_id: self.gateway_refund_id,
            gateway_response: self.gateway_response,
            initiated_by: self.initiated_by,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Clone)]
pub struct PostgresBlackMarkRepository {
    pool: PgPool,
}

impl PostgresBlackMarkRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BlackMarkRepository for PostgresBlackMarkRepository {
    async fn insert(&self, mark: &BlackMark) -> RepositoryResult<BlackMark> {
        sqlx::query(
            r#"
            INSERT INTO black_marks (id, booking_id, influencer_id, service_id, reason, created_by, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(mark.id)
        .bind(mark.booking_id)
        .bind(mark.influencer_id)
        .bind(mark.service_id)
        .bind(&mark.reason)
        .bind(mark.created_by)
        .bind(mark.created_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(mark.clone())
    }

    async fn exists_for_booking(&self, booking_id: Uuid) -> RepositoryResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM black_marks WHERE booking_id = $1 AND created_by IS NULL)",
        )
        .bind(booking_id)
        .fetch_one(&self.pool)
        .await
        .map_err(RepositoryError::from)
    }
}
