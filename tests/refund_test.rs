mod common;

use mockito::Server;
use uuid::Uuid;

use common::{amount, booking, payment, test_app, TestApp, UNREACHABLE_GATEWAY};
use mashaheer_core::domain::{Booking, BookingStatus, PaymentStatus, RefundStatus};
use mashaheer_core::error::AppError;
use mashaheer_core::services::RefundCommand;

async fn paid_booking(app: &TestApp, amount_raw: &str) -> Booking {
    let b = booking(BookingStatus::PaymentConfirmed);
    app.mem.seed_booking(b.clone()).await;
    app.mem
        .seed_payment(payment(&b, PaymentStatus::Completed, amount_raw, Some("tok_84629174")))
        .await;
    b
}

async fn gateway_answering(server: &mut Server, body: &str) -> mockito::Mock {
    server
        .mock("POST", "/api/refund")
        .match_header("accessCode", "access-code")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body)
        .create_async()
        .await
}

fn operator_refund(booking_id: Uuid, amount_raw: Option<&str>) -> RefundCommand {
    RefundCommand {
        booking_id,
        amount: amount_raw.map(amount),
        reason: "Customer asked to cancel".to_string(),
        initiated_by: Some(Uuid::new_v4()),
    }
}

#[tokio::test]
async fn test_accepted_refund_is_completed() {
    let mut server = Server::new_async().await;
    let mock = gateway_answering(&mut server, r#"{"code":"000","refundId":"RF-1","message":"ok"}"#).await;
    let app = test_app(&server.url());
    let b = paid_booking(&app, "25.000").await;

    let outcome = app.state.refunds.initiate(operator_refund(b.id, None)).await.unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.status, RefundStatus::Completed);
    assert_eq!(outcome.gateway_refund_id.as_deref(), Some("RF-1"));

    let stored = app.mem.refunds_for(b.id).await;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].amount, amount("25.000"));
    assert_eq!(stored[0].transaction_reference.as_deref(), Some("tok_84629174"));
    assert!(!stored[0].is_system_initiated());
    assert_eq!(stored[0].gateway_response.as_ref().unwrap()["message"], "ok");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_queued_refund_stays_processing() {
    let mut server = Server::new_async().await;
    let _mock = gateway_answering(&mut server, r#"{"code":"001","refundId":"RF-2"}"#).await;
    let app = test_app(&server.url());
    let b = paid_booking(&app, "25.000").await;

    let outcome = app
        .state
        .refunds
        .initiate(operator_refund(b.id, Some("10.500")))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.status, RefundStatus::Processing);
    let stored = &app.mem.refunds_for(b.id).await[0];
    assert_eq!(stored.status, RefundStatus::Processing);
    assert_eq!(stored.amount, amount("10.500"));
}

#[tokio::test]
async fn test_rejected_refund_is_failed_with_error() {
    let mut server = Server::new_async().await;
    let _mock = gateway_answering(&mut server, r#"{"code":"500","message":"Token expired"}"#).await;
    let app = test_app(&server.url());
    let b = paid_booking(&app, "25.000").await;

    let outcome = app.state.refunds.initiate(operator_refund(b.id, None)).await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.status, RefundStatus::Failed);
    assert!(outcome.error.as_deref().unwrap().contains("Token expired"));
    assert_eq!(app.mem.refunds_for(b.id).await[0].status, RefundStatus::Failed);
}

#[tokio::test]
async fn test_amount_above_payment_leaves_no_record() {
    let app = test_app(UNREACHABLE_GATEWAY);
    let b = paid_booking(&app, "25.000").await;

    let result = app
        .state
        .refunds
        .initiate(operator_refund(b.id, Some("30.000")))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(app.mem.refunds_for(b.id).await.is_empty());
    assert_eq!(app.mem.write_count(), 0);
}

#[tokio::test]
async fn test_booking_without_completed_payment_is_rejected() {
    let app = test_app(UNREACHABLE_GATEWAY);
    let b = booking(BookingStatus::AwaitingPayment);
    app.mem.seed_booking(b.clone()).await;
    app.mem
        .seed_payment(payment(&b, PaymentStatus::Pending, "25.000", Some("tok_1")))
        .await;

    let result = app.state.refunds.initiate(operator_refund(b.id, None)).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert_eq!(app.mem.write_count(), 0);
}

#[tokio::test]
async fn test_payment_without_transaction_reference_is_rejected() {
    let app = test_app(UNREACHABLE_GATEWAY);
    let b = booking(BookingStatus::PaymentConfirmed);
    app.mem.seed_booking(b.clone()).await;
    app.mem
        .seed_payment(payment(&b, PaymentStatus::Completed, "25.000", None))
        .await;

    let result = app.state.refunds.initiate(operator_refund(b.id, None)).await;

    assert!(matches!(result, Err(AppError::Validation(msg)) if msg.contains("transaction reference")));
    assert!(app.mem.refunds_for(b.id).await.is_empty());
}

#[tokio::test]
async fn test_pending_refund_skips_gateway() {
    let app = test_app(UNREACHABLE_GATEWAY);
    let b = paid_booking(&app, "18.250").await;

    let refund = app
        .state
        .refunds
        .record_pending(b.id, "Script was never sent")
        .await
        .unwrap();

    assert_eq!(refund.status, RefundStatus::Pending);
    assert_eq!(refund.amount, amount("18.250"));
    assert!(refund.gateway_response.is_none());
    assert_eq!(app.state.refunds.list_for_booking(b.id).await.unwrap(), vec![refund]);
}
