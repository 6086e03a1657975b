//! Money and currency types
//!
//! A monetary amount is a decimal rescaled to exactly two fractional digits
//! (half-away-from-zero) tagged with a 3-letter currency code. Arithmetic is
//! closed over a single currency: any cross-currency operation fails rather
//! than converting.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

/// Errors produced by money construction and arithmetic
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: Currency, right: Currency },

    #[error("division by zero")]
    DivisionByZero,

    #[error("invalid currency code: '{0}'")]
    InvalidCurrency(String),
}

/// An ISO-style 3-letter currency code, always uppercase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency([u8; 3]);

impl Currency {
    pub const USD: Currency = Currency(*b"USD");
    pub const EUR: Currency = Currency(*b"EUR");
    pub const GBP: Currency = Currency(*b"GBP");

    /// Parse a currency code: exactly three ASCII letters, uppercased
    pub fn parse(s: &str) -> Result<Self, MoneyError> {
        let s = s.trim();
        if s.len() != 3 || !s.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(MoneyError::InvalidCurrency(s.to_string()));
        }
        let mut code = [0u8; 3];
        for (i, b) in s.bytes().enumerate() {
            code[i] = b.to_ascii_uppercase();
        }
        Ok(Self(code))
    }

    /// The code as a string slice
    pub fn as_str(&self) -> &str {
        // Constructed from validated ASCII letters only
        std::str::from_utf8(&self.0).unwrap_or("???")
    }

    /// Display symbol for the handful of codes with a conventional glyph
    fn symbol(&self) -> Option<&'static str> {
        match &self.0 {
            b"USD" => Some("$"),
            b"EUR" => Some("\u{20ac}"),
            b"GBP" => Some("\u{a3}"),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Currency {
    type Error = MoneyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.as_str().to_string()
    }
}

/// An immutable monetary amount in a single currency
///
/// The amount always carries a scale of exactly two fractional digits;
/// construction re-rounds half-away-from-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    amount: Decimal,
    currency: Currency,
}

impl Money {
    /// Create a money value, rounding to two fractional digits
    pub fn new(amount: Decimal, currency: Currency) -> Self {
        let mut amount =
            amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        amount.rescale(2);
        Self { amount, currency }
    }

    /// Zero in the given currency
    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    /// The decimal amount (scale 2)
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// The currency tag
    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn is_zero(&self) -> bool {
        self.amount.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Absolute value, same currency
    pub fn abs(&self) -> Self {
        Self::new(self.amount.abs(), self.currency)
    }

    /// Negated value, same currency
    pub fn neg(&self) -> Self {
        Self::new(-self.amount, self.currency)
    }

    fn require_same_currency(&self, other: &Self) -> Result<(), MoneyError> {
        if self.currency != other.currency {
            return Err(MoneyError::CurrencyMismatch {
                left: self.currency,
                right: other.currency,
            });
        }
        Ok(())
    }

    /// Add two amounts of the same currency
    pub fn checked_add(&self, other: Self) -> Result<Self, MoneyError> {
        self.require_same_currency(&other)?;
        Ok(Self::new(self.amount + other.amount, self.currency))
    }

    /// Subtract an amount of the same currency
    pub fn checked_sub(&self, other: Self) -> Result<Self, MoneyError> {
        self.require_same_currency(&other)?;
        Ok(Self::new(self.amount - other.amount, self.currency))
    }

    /// Multiply by a scalar factor, re-rounding the result
    pub fn mul(&self, factor: Decimal) -> Self {
        Self::new(self.amount * factor, self.currency)
    }

    /// Divide by a scalar divisor, re-rounding the result
    pub fn div(&self, divisor: Decimal) -> Result<Self, MoneyError> {
        if divisor.is_zero() {
            return Err(MoneyError::DivisionByZero);
        }
        Ok(Self::new(self.amount / divisor, self.currency))
    }

    /// Compare two amounts of the same currency
    pub fn checked_cmp(&self, other: &Self) -> Result<Ordering, MoneyError> {
        self.require_same_currency(other)?;
        Ok(self.amount.cmp(&other.amount))
    }
}

impl PartialOrd for Money {
    /// Ordering is only defined within one currency
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.currency != other.currency {
            return None;
        }
        Some(self.amount.cmp(&other.amount))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.currency.symbol() {
            Some(symbol) => write!(f, "{}{}", symbol, self.amount),
            None => write!(f, "{} {}", self.amount, self.currency),
        }
    }
}
