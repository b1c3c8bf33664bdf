//! Money at the boundaries.
//!
//! Amounts are `i64` minor units (cents) everywhere inside the engine. Decimals only appear when
//! reading user input, applying the configured exchange rate, or formatting for display.

use crate::errors::{Error, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Equality tolerance for money comparisons: one cent.
pub const TOLERANCE: i64 = 1;

/// True when `paid` covers `amount` within [`TOLERANCE`].
#[must_use]
pub const fn is_settled(paid: i64, amount: i64) -> bool {
    paid >= amount - TOLERANCE
}

/// Converts a decimal amount to minor units, rounding half away from zero.
pub fn to_minor(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| Error::InvalidAmountText {
            value: amount.to_string(),
        })
}

/// Decimal view of a minor-unit amount.
#[must_use]
pub fn from_minor(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Parses user input such as `"1234.56"`, `"1.234,56"` or `"89,90"` into minor units.
pub fn parse_amount(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };
    let value = Decimal::from_str(&normalized).map_err(|_| Error::InvalidAmountText {
        value: text.to_string(),
    })?;
    to_minor(value)
}

/// Applies an exchange rate to a minor-unit amount.
pub fn convert(cents: i64, rate: Decimal) -> Result<i64> {
    (Decimal::from(cents) * rate)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| Error::InvalidAmountText {
            value: format!("{cents} * {rate}"),
        })
}

fn symbol(currency: &str) -> &str {
    match currency {
        "BRL" => "R$",
        "USD" => "$",
        "EUR" => "€",
        "GBP" => "£",
        other => other,
    }
}

/// Formats minor units for display, e.g. `format_money(123_456, "BRL") == "R$ 1234.56"`.
#[must_use]
pub fn format_money(cents: i64, currency: &str) -> String {
    format!("{} {}", symbol(currency), from_minor(cents))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_amount_formats() {
        assert_eq!(parse_amount("1234.56").unwrap(), 123_456);
        assert_eq!(parse_amount("1.234,56").unwrap(), 123_456);
        assert_eq!(parse_amount("89,90").unwrap(), 8_990);
        assert_eq!(parse_amount(" 100 ").unwrap(), 10_000);
        assert_eq!(parse_amount("0.005").unwrap(), 1);
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert!(matches!(
            parse_amount("ten"),
            Err(Error::InvalidAmountText { .. })
        ));
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(123_456, "BRL"), "R$ 1234.56");
        assert_eq!(format_money(5, "USD"), "$ 0.05");
        assert_eq!(format_money(-2_500, "EUR"), "€ -25.00");
        assert_eq!(format_money(100, "JPY"), "JPY 1.00");
    }

    #[test]
    fn test_convert_rounds_half_away_from_zero() {
        let rate = Decimal::from_str("5.25").unwrap();
        assert_eq!(convert(10_000, rate).unwrap(), 52_500);
        let rate = Decimal::from_str("0.5").unwrap();
        assert_eq!(convert(3, rate).unwrap(), 2);
    }

    #[test]
    fn test_is_settled_uses_one_cent_tolerance() {
        assert!(is_settled(10_000, 10_000));
        assert!(is_settled(9_999, 10_000));
        assert!(!is_settled(9_998, 10_000));
        assert!(is_settled(0, 0));
    }
}
