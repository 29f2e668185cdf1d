//! Implementations of the repository ports.

pub mod in_memory;
pub mod postgres_booking_repository;
pub mod postgres_payment_repository;
pub mod postgres_refund_repository;

use sqlx::PgPool;
use std::sync::Arc;

use crate::ports::Store;

pub use in_memory::InMemoryStore;
pub use postgres_booking_repository::PostgresBookingRepository;
pub use postgres_payment_repository::PostgresPaymentRepository;
pub use postgres_refund_repository::{PostgresBlackMarkRepository, PostgresRefundRepository};

/// Wires every port to the given Postgres pool.
pub fn postgres_store(pool: PgPool) -> Store {
    Store {
        bookings: Arc::new(PostgresBookingRepository::new(pool.clone())),
        payments: Arc::new(PostgresPaymentRepository::new(pool.clone())),
        refunds: Arc::new(PostgresRefundRepository::new(pool.clone())),
        black_marks: Arc::new(PostgresBlackMarkRepository::new(pool)),
    }
}
