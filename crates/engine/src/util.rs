//! Internal helpers for model validation.
//!
//! These utilities are **not** part of the public API. They centralize
//! validation logic so every repository enforces the same invariants before
//! a request leaves the process.

use chrono::NaiveDate;

use crate::{EngineError, Money, ResultEngine, currency::normalize_code};

/// Trim a required name and reject blanks.
pub(crate) fn normalize_required_name(value: &str, label: &str) -> ResultEngine<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::InvalidName(format!(
            "{label} name must not be empty"
        )));
    }
    Ok(trimmed.to_string())
}

/// Trim optional free text; blanks become `None`.
pub(crate) fn normalize_optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

pub(crate) fn normalize_currency(code: &str) -> ResultEngine<String> {
    normalize_code(code)
        .ok_or_else(|| EngineError::InvalidCurrency("currency code must not be empty".to_string()))
}

/// Amounts entered by users are strictly positive; direction lives elsewhere.
pub(crate) fn ensure_positive(amount: Money, label: &str) -> ResultEngine<()> {
    if !amount.is_positive() {
        return Err(EngineError::InvalidAmount(format!("{label} must be > 0")));
    }
    Ok(())
}

pub(crate) fn ensure_non_negative(amount: Money, label: &str) -> ResultEngine<()> {
    if amount.is_negative() {
        return Err(EngineError::InvalidAmount(format!("{label} must be >= 0")));
    }
    Ok(())
}

pub(crate) fn ensure_date_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> ResultEngine<()> {
    if let (Some(start), Some(end)) = (start, end)
        && end < start
    {
        return Err(EngineError::InvalidDateRange(format!(
            "end date {end} is before start date {start}"
        )));
    }
    Ok(())
}
