//! Postgres implementation of BookingRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{Booking, BookingStatus, DeadlineColumn};
use crate::ports::{BookingRepository, RepositoryError, RepositoryResult};

const SELECT_BOOKING: &str = r#"
    SELECT b.id, s.name AS status_name, b.customer_id, b.influencer_id, b.service_id,
           b.scheduled_time, b.approval_deadline, b.payment_deadline,
           b.script_submission_deadline, b.auto_approval_deadline, b.appointment_end_time,
           b.influencer_response_deadline, b.script_rejection_count,
           b.last_script_submitted_at, b.last_script_rejected_at, b.is_published, b.day_gap,
           b.created_at, b.updated_at
    FROM bookings b
    JOIN booking_statuses s ON s.id = b.status_id
"#;

/// Postgres-backed booking repository.
#[derive(Clone)]
pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn status_id(&self, status: &BookingStatus) -> RepositoryResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM booking_statuses WHERE name = $1")
            .bind(status.label())
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?
            .ok_or_else(|| RepositoryError::NotFound(format!("booking status '{}'", status)))
    }
}

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn get(&self, id: Uuid) -> RepositoryResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{} WHERE b.id = $1", SELECT_BOOKING))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.map(BookingRow::into_domain))
    }

    async fn find_overdue(
        &self,
        statuses: &[BookingStatus],
        column: DeadlineColumn,
        include_scheduled_time: bool,
        now: DateTime<Utc>,
    ) -> RepositoryResult<Vec<Booking>> {
        let labels: Vec<String> = statuses.iter().map(|s| s.label().to_string()).collect();
        let delivery_clause = if include_scheduled_time {
            " OR b.scheduled_time <= $2"
        } else {
            ""
        };
        let sql = format!(
            "{} WHERE s.name = ANY($1) AND (b.{} <= $2{}) ORDER BY b.created_at ASC",
            SELECT_BOOKING,
            column.column_name(),
            delivery_clause
        );

        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(&labels)
            .bind(now)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(rows.into_iter().map(BookingRow::into_domain).collect())
    }

    async fn update_status(&self, id: Uuid, status: &BookingStatus) -> RepositoryResult<()> {
        let status_id = self.status_id(status).await?;

        let result =
            sqlx::query("UPDATE bookings SET status_id = $1, updated_at = NOW() WHERE id = $2")
                .bind(status_id)
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!("booking {}", id)));
        }
        Ok(())
    }
}

/// Internal row type for SQLx. Not exposed outside the adapter.
#[derive(Debug, sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    status_name: String,
    customer_id: Uuid,
    influencer_id: Uuid,
    service_id: Uuid,
    scheduled_time: Option<DateTime<Utc>>,
    approval_deadline: Option<DateTime<Utc>>,
    payment_deadline: Option<DateTime<Utc>>,
    script_submission_deadline: Option<DateTime<Utc>>,
    auto_approval_deadline: Option<DateTime<Utc>>,
    appointment_end_time: Option<DateTime<Utc>>,
    influencer_response_deadline: Option<DateTime<Utc>>,
    script_rejection_count: i32,
    last_script_submitted_at: Option<DateTime<Utc>>,
    last_script_rejected_at: Option<DateTime<Utc>>,
    is_published: bool,
    day_gap: Option<i32>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_domain(self) -> Booking {
        Booking {
            id: self.id,
            status: BookingStatus::from_label(&self.status_name),
            customer_id: self.customer_id,
            influencer_id: self.influencer_id,
            service_id: self.service_id,
            scheduled_time: self.scheduled_time,
            approval_deadline: self.approval_deadline,
            payment_deadline: self.payment_deadline,
            script_submission_deadline: self.script_submission_deadline,
            auto_approval_deadline: self.auto_approval_deadline,
            appointment_end_time: self.appointment_end_time,
            influencer_response_deadline: self.influencer_response_deadline,
            script_rejection_count: self.script_rejection_count,
            last_script_submitted_at: self.last_script_submitted_at,
            last_script_rejected_at: self.last_script_rejected_at,
            is_published: self.is_published,
            day_gap: self.day_gap,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
