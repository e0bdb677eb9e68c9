//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Currency every price in the catalog is quoted in.
pub const DEFAULT_CURRENCY: &str = "TND";

/// Decimal places of the minor unit (1 TND = 1000 millimes).
pub const MINOR_UNIT_SCALE: u32 = 3;

/// Largest price or total accepted from outside, in minor units (one billion TND).
pub const MAX_AMOUNT_MINOR: i64 = 1_000_000_000_000;

/// Whether `amount` is a non-negative amount no larger than [`MAX_AMOUNT_MINOR`].
/// Everything that reaches [`to_minor_units`] has passed this check.
pub fn is_valid_amount(amount: Decimal) -> bool {
    !amount.is_sign_negative() && amount <= from_minor_units(MAX_AMOUNT_MINOR)
}

/// Converts a decimal amount into integer minor units, rounding half away from zero.
pub fn to_minor_units(amount: Decimal) -> i64 {
    amount
        .round_dp_with_strategy(MINOR_UNIT_SCALE, RoundingStrategy::MidpointAwayFromZero)
        .checked_mul(Decimal::from(10_i64.pow(MINOR_UNIT_SCALE)))
        .and_then(|minor| minor.to_i64())
        .unwrap_or(i64::MAX)
}

pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE).normalize()
}

/// An amount in the shop currency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Money { amount: Decimal }

impl Money {
    pub fn tnd(amount: Decimal) -> Self { Self { amount } }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn minor_units(&self) -> i64 { to_minor_units(self.amount) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.amount, DEFAULT_CURRENCY)
    }
}

/// Email address value object, trimmed and lower-cased.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Email(String);

impl Email {
    pub fn parse(value: impl AsRef<str>) -> Result<Self, EmailError> {
        let value = Self::normalize(value.as_ref());
        if value.is_empty() { return Err(EmailError::Empty); }
        if !validator::validate_email(value.as_str()) { return Err(EmailError::Malformed); }
        Ok(Self(value))
    }

    /// Canonical lookup form, without validating the shape.
    pub fn normalize(value: &str) -> String { value.trim().to_lowercase() }

    pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for Email {
    type Error = EmailError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::parse(value) }
}

impl From<Email> for String {
    fn from(email: Email) -> Self { email.0 }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum EmailError { Empty, Malformed }
impl std::error::Error for EmailError {}
impl fmt::Display for EmailError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self { Self::Empty => write!(f, "Email is required"), Self::Malformed => write!(f, "Invalid email address") }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        let email = Email::parse("  Jane.Doe@Example.com ").unwrap();
        assert_eq!(email.as_str(), "jane.doe@example.com");
        assert_eq!(Email::parse(""), Err(EmailError::Empty));
        assert_eq!(Email::parse("not-an-email"), Err(EmailError::Malformed));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(1999, 2)), 19_990);
        assert_eq!(to_minor_units(Decimal::new(12_3455, 4)), 12_346);
        assert_eq!(from_minor_units(105_000), Decimal::new(105, 0));
        assert_eq!(Money::tnd(Decimal::new(25, 1)).minor_units(), 2_500);
    }

    #[test]
    fn test_amount_limit() {
        assert!(is_valid_amount(Decimal::ZERO));
        assert!(is_valid_amount(Decimal::new(1_000_000_000, 0)));
        assert!(!is_valid_amount(Decimal::new(1_000_000_001, 0)));
        assert!(!is_valid_amount(Decimal::new(-1, 3)));
        assert_eq!(to_minor_units(Decimal::new(1_000_000_000, 0)), MAX_AMOUNT_MINOR);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::tnd(Decimal::new(105, 0)).to_string(), "105.00 TND");
        assert_eq!(Money::tnd(Decimal::new(99980, 3)).to_string(), "99.98 TND");
    }
}
