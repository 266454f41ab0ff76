//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Integer Inside, Decimal Outside
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Client JSON              Money (i64, hundredths)        SQLite         │
//! │                                                                         │
//! │  "price": 1000      ──►   Money(100_000)           ──►   INTEGER        │
//! │  "discount": 2.5    ──►   Money(250)               ──►   INTEGER        │
//! │                                                                         │
//! │  Arithmetic never sees a float: 0.1 + 0.2 stays exactly 0.30            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The client speaks plain decimal numbers, so serde converts at the edge and
//! rounds to the nearest hundredth. Everything behind the edge is integer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

// =============================================================================
// Money Type
// =============================================================================

/// A monetary amount in hundredths of the currency unit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Money(i64);

impl Money {
    /// Zero.
    pub const ZERO: Money = Money(0);

    /// Creates a Money value from hundredths.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// let price = Money::from_minor(150_050);
    /// assert_eq!(price.minor(), 150_050);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from a whole-unit amount.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Converts a decimal amount as sent by the client, rounding half away
    /// from zero to the nearest hundredth.
    ///
    /// ## Example
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// assert_eq!(Money::from_decimal(1000.0).minor(), 100_000);
    /// assert_eq!(Money::from_decimal(0.125).minor(), 13);
    /// ```
    pub fn from_decimal(value: f64) -> Self {
        Money((value * 100.0).round() as i64)
    }

    /// Returns the value in hundredths.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the decimal amount for the wire.
    pub fn to_decimal(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Formats with thousands separators for printed documents.
    ///
    /// ```rust
    /// use pharma_core::money::Money;
    ///
    /// assert_eq!(Money::from_major(30_000).grouped(), "30,000");
    /// assert_eq!(Money::from_minor(123_456_75).grouped(), "123,456.75");
    /// assert_eq!(Money::from_minor(-150).grouped(), "-1.50");
    /// ```
    pub fn grouped(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = (abs / 100).to_string();
        let cents = abs % 100;

        let mut out = String::with_capacity(whole.len() + whole.len() / 3 + 4);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                out.push(',');
            }
            out.push(ch);
        }

        if cents == 0 {
            format!("{sign}{out}")
        } else {
            format!("{sign}{out}.{cents:02}")
        }
    }
}

// =============================================================================
// Serde: decimal on the wire
// =============================================================================

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0 % 100 == 0 {
            serializer.serialize_i64(self.0 / 100)
        } else {
            serializer.serialize_f64(self.to_decimal())
        }
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("amount must be a finite number"));
        }
        Ok(Money::from_decimal(value))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.grouped())
    }
}

// =============================================================================
// Arithmetic
// =============================================================================

impl Add for Money {
    type Output = Money;
    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;
    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;
    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
