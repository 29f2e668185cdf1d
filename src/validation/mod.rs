use bigdecimal::BigDecimal;
use std::fmt;
use std::str::FromStr;

pub const REFERENCE_NUMBER_MAX_LEN: usize = 255;
pub const TOKEN_MAX_LEN: usize = 255;
pub const STATUS_MAX_LEN: usize = 32;
pub const REASON_MAX_LEN: usize = 500;
pub const AMOUNT_INPUT_MAX_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub type ValidationResult = Result<(), ValidationError>;

pub fn sanitize_string(value: &str) -> String {
    value
        .chars()
        .filter(|ch| !ch.is_control())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn validate_required(field: &'static str, value: &str) -> ValidationResult {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }

    Ok(())
}

pub fn validate_max_len(field: &'static str, value: &str, max_len: usize) -> ValidationResult {
    if value.len() > max_len {
        return Err(ValidationError::new(
            field,
            format!("must be at most {} characters", max_len),
        ));
    }

    Ok(())
}

pub fn validate_positive_amount(field: &'static str, amount: &BigDecimal) -> ValidationResult {
    if amount <= &BigDecimal::from(0) {
        return Err(ValidationError::new(field, "must be greater than zero"));
    }

    Ok(())
}

/// Parses a decimal amount sent either as a JSON string (`"25.000"`) or a JSON number.
pub fn parse_amount(field: &'static str, value: &serde_json::Value) -> Result<BigDecimal, ValidationError> {
    let raw = match value {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => return Err(ValidationError::new(field, "is required")),
        _ => return Err(ValidationError::new(field, "must be a decimal string or number")),
    };

    validate_required(field, &raw)?;
    validate_max_len(field, &raw, AMOUNT_INPUT_MAX_LEN)?;

    let amount = BigDecimal::from_str(&raw)
        .map_err(|_| ValidationError::new(field, "must be a valid decimal"))?;
    validate_positive_amount(field, &amount)?;

    Ok(amount)
}
