//! Domain entities for the booking lifecycle and payment reconciliation.

pub mod booking;
pub mod payment;
pub mod reference;
pub mod refund;

pub use booking::{Booking, BookingStatus, DeadlineColumn, MAX_SCRIPT_REJECTIONS};
pub use payment::{Payment, PaymentStatus, PaymentUpdate};
pub use refund::{BlackMark, Refund, RefundOutcomeUpdate, RefundStatus};
