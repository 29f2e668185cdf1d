#![allow(dead_code)]

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use mashaheer_core::adapters::InMemoryStore;
use mashaheer_core::config::GatewayConfig;
use mashaheer_core::domain::{Booking, BookingStatus, Payment, PaymentStatus};
use mashaheer_core::gateway::HesabeClient;
use mashaheer_core::notifications::RecordingDispatcher;
use mashaheer_core::AppState;

pub const ADMIN_KEY: &str = "test-admin-key";

/// Nothing listens here, so gateway calls fail fast with a connection error.
pub const UNREACHABLE_GATEWAY: &str = "http://127.0.0.1:9";

pub struct TestApp {
    pub mem: InMemoryStore,
    pub notifier: RecordingDispatcher,
    pub state: AppState,
}

pub fn gateway_config(base_url: &str) -> GatewayConfig {
    GatewayConfig {
        base_url: base_url.to_string(),
        merchant_code: "842217".to_string(),
        access_code: "access-code".to_string(),
        secret_key: "gateway-secret".to_string(),
    }
}

pub fn test_app(gateway_url: &str) -> TestApp {
    let mem = InMemoryStore::new();
    let notifier = RecordingDispatcher::new();
    let state = AppState::new(
        mem.store(),
        HesabeClient::new(gateway_config(gateway_url)),
        Arc::new(notifier.clone()),
        "KWD".to_string(),
        ADMIN_KEY,
    );

    TestApp { mem, notifier, state }
}

pub fn booking(status: BookingStatus) -> Booking {
    Booking::new(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()).with_status(status)
}

pub fn amount(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

pub fn payment(booking: &Booking, status: PaymentStatus, amount_raw: &str, reference: Option<&str>) -> Payment {
    let mut payment = Payment::new(
        booking.id,
        booking.customer_id,
        booking.influencer_id,
        amount(amount_raw),
        "KWD".to_string(),
        reference.map(str::to_string),
    );
    payment.status = status;
    if status == PaymentStatus::Completed {
        payment.paid_at = Some(Utc::now());
    }
    payment
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
}
