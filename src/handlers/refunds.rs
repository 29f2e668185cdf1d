use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::RefundCommand;
use crate::validation::{
    parse_amount, sanitize_string, validate_max_len, validate_required, REASON_MAX_LEN,
};
use crate::AppState;

const DEFAULT_ADMIN_REASON: &str = "Refund initiated by admin";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRefundRequest {
    #[serde(alias = "booking_id")]
    pub booking_id: Uuid,
    #[serde(default)]
    pub amount: Option<serde_json::Value>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, alias = "initiated_by")]
    pub initiated_by: Option<Uuid>,
}

impl CreateRefundRequest {
    fn into_command(self) -> Result<RefundCommand, AppError> {
        let reason = sanitize_string(self.reason.as_deref().unwrap_or(DEFAULT_ADMIN_REASON));
        validate_required("reason", &reason)?;
        validate_max_len("reason", &reason, REASON_MAX_LEN)?;

        let amount = match self.amount {
            None | Some(serde_json::Value::Null) => None,
            Some(value) => Some(parse_amount("amount", &value)?),
        };

        Ok(RefundCommand {
            booking_id: self.booking_id,
            amount,
            reason,
            initiated_by: self.initiated_by,
        })
    }
}

/// Operator-initiated refund. A gateway rejection is still 201: the refund record
/// exists and carries the failure.
pub async fn create_refund(
    State(state): State<AppState>,
    Json(payload): Json<CreateRefundRequest>,
) -> Result<impl IntoResponse, AppError> {
    let command = payload.into_command()?;
    tracing::info!("Admin refund requested for booking {}", command.booking_id);

    let outcome = state.refunds.initiate(command).await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn list_refunds(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let refunds = state.refunds.list_for_booking(booking_id).await?;
    Ok(Json(refunds))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(body: serde_json::Value) -> CreateRefundRequest {
        serde_json::from_value(body).unwrap()
    }

    #[test]
    fn test_snake_case_body_is_accepted() {
        let booking_id = Uuid::new_v4();
        let command = parse(json!({ "booking_id": booking_id, "amount": "10.500" }))
            .into_command()
            .unwrap();

        assert_eq!(command.booking_id, booking_id);
        assert_eq!(command.amount.unwrap().to_string(), "10.500");
        assert_eq!(command.reason, DEFAULT_ADMIN_REASON);
        assert!(command.initiated_by.is_none());
    }

    #[test]
    fn test_blank_reason_is_rejected() {
        let request = parse(json!({ "bookingId": Uuid::new_v4(), "reason": " \t " }));
        assert!(matches!(request.into_command(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_non_positive_amount_is_rejected() {
        let request = parse(json!({ "bookingId": Uuid::new_v4(), "amount": 0 }));
        assert!(matches!(request.into_command(), Err(AppError::Validation(_))));
    }
}
