//! Validation utilities for the Fiber Trade Ledger
//!
//! Field-level rules are attached to the input types through `validator`
//! derives; the functions here cover the rules those derives call into and the
//! cross-field checks they cannot express.

use std::borrow::Cow;

use rust_decimal::Decimal;
use validator::{ValidationError, ValidationErrors};

use crate::models::{TransactionEntry, MAX_TRANSACTIONS_PER_REPORT};

/// Largest accepted gap between a line's total and quantity × unit price
pub const DEFAULT_LINE_AMOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Upper bound (10^12) on any submitted quantity, price or amount. A product
/// of two bounded values and a report's worth of bounded sums fit in a `Decimal`.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// A rejected input field with a message fit for display
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Prefix the field path, e.g. `quantity` -> `transactions[2].quantity`
    pub fn nested(self, parent: &str) -> Self {
        Self {
            field: format!("{}.{}", parent, self.field),
            message: self.message,
        }
    }
}

impl From<ValidationErrors> for FieldError {
    fn from(errors: ValidationErrors) -> Self {
        let field_errors = errors.field_errors();
        let mut fields: Vec<_> = field_errors.keys().copied().collect();
        fields.sort_unstable();

        match fields.first() {
            Some(field) => {
                let message = field_errors[field]
                    .first()
                    .map(describe)
                    .unwrap_or_else(|| "is invalid".to_string());
                FieldError::new(*field, message)
            }
            None => FieldError::new("body", "is invalid"),
        }
    }
}

fn describe(error: &ValidationError) -> String {
    match &error.message {
        Some(message) => message.to_string(),
        None => match error.code.as_ref() {
            "length" => "has an invalid length".to_string(),
            code => format!("failed the '{}' check", code),
        },
    }
}

fn violation(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

// ============================================================================
// Field rules used by the validator derives
// ============================================================================

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(violation("not_blank", "must not be blank"));
    }
    Ok(())
}

pub fn positive_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        return Err(violation("positive", "must be greater than zero"));
    }
    within_range(value)
}

pub fn non_negative_decimal(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(violation("non_negative", "must not be negative"));
    }
    within_range(value)
}

fn within_range(value: &Decimal) -> Result<(), ValidationError> {
    if *value > MAX_AMOUNT {
        return Err(violation("range", "amount out of range"));
    }
    Ok(())
}

pub fn contact_number(value: &str) -> Result<(), ValidationError> {
    validate_contact_number(value).map_err(|message| violation("contact_number", message))
}

// ============================================================================
// Domain checks
// ============================================================================

/// Validate a phone number: 7-15 digits, optional leading `+`, common separators
pub fn validate_contact_number(phone: &str) -> Result<(), &'static str> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')'))
    {
        return Err("Contact number may only contain digits, spaces, dashes and parentheses");
    }

    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err("Contact number must have between 7 and 15 digits");
    }
    Ok(())
}

/// Check that a line total equals quantity × unit price within `tolerance`
pub fn validate_line_amount(
    quantity: Decimal,
    unit_price: Decimal,
    total_amount: Decimal,
    tolerance: Decimal,
) -> Result<(), &'static str> {
    let gap = quantity
        .checked_mul(unit_price)
        .and_then(|expected| expected.checked_sub(total_amount))
        .ok_or("amount out of range")?;
    if gap.abs() > tolerance {
        return Err("Total amount must equal quantity times unit price");
    }
    Ok(())
}

/// Normalize a mandatory free-text reason; blank counts as missing
pub fn required_reason(reason: Option<&str>) -> Option<&str> {
    reason.map(str::trim).filter(|r| !r.is_empty())
}

/// Validate every submitted sales entry, reporting the first offending field
pub fn validate_transaction_entries(
    entries: &[TransactionEntry],
    tolerance: Decimal,
) -> Result<(), FieldError> {
    use validator::Validate;

    if entries.len() > MAX_TRANSACTIONS_PER_REPORT {
        return Err(FieldError::new(
            "transactions",
            format!("At most {} transactions are allowed", MAX_TRANSACTIONS_PER_REPORT),
        ));
    }
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("transactions[{}]", i);
        entry
            .validate()
            .map_err(|e| FieldError::from(e).nested(&path))?;
        validate_line_amount(entry.quantity, entry.unit_price, entry.total_amount, tolerance)
            .map_err(|message| FieldError::new(format!("{}.total_amount", path), message))?;
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
