//! Fixed-point numbers: [`Money`], [`Quantity`] and [`Percent`].
//!
//! All three are signed **integer hundredths** so sums never drift. They share
//! parsing, formatting, arithmetic and serde through [`fixed_point!`]; the
//! operations that mix them live at the bottom of the module and are the only
//! places where rounding happens.

use std::{
    fmt,
    iter::Sum,
    ops::{Add, AddAssign, Neg, Sub, SubAssign},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{
    EngineError, ResultEngine,
    rounding::{RoundingMode, scale},
};

macro_rules! fixed_point {
    ($(#[$meta:meta])* $name:ident, $suffix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        #[repr(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const ZERO: $name = $name(0);

            /// Creates a value from integer hundredths.
            #[must_use]
            pub const fn new(hundredths: i64) -> Self {
                Self(hundredths)
            }

            /// Returns the raw value in hundredths.
            #[must_use]
            pub const fn hundredths(self) -> i64 {
                self.0
            }

            /// Returns `true` if the value is 0.
            #[must_use]
            pub const fn is_zero(self) -> bool {
                self.0 == 0
            }

            /// Returns `true` if the value is positive.
            #[must_use]
            pub const fn is_positive(self) -> bool {
                self.0 > 0
            }

            /// Returns `true` if the value is negative.
            #[must_use]
            pub const fn is_negative(self) -> bool {
                self.0 < 0
            }

            /// Negative values become zero.
            #[must_use]
            pub const fn non_negative(self) -> Self {
                if self.0 < 0 { Self(0) } else { self }
            }

            /// Converts a float, rounding half away from zero to hundredths.
            ///
            /// Non-finite input is rejected.
            pub fn from_f64(value: f64) -> ResultEngine<Self> {
                if !value.is_finite() {
                    return Err(EngineError::InvalidAmount(format!("not a number: {value}")));
                }
                parse_hundredths(&value.to_string(), Excess::Round).map(Self)
            }

            /// Lossy conversion for display and serialisation.
            #[must_use]
            pub fn to_f64(self) -> f64 {
                self.0 as f64 / 100.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let sign = if self.0 < 0 { "-" } else { "" };
                let abs = self.0.unsigned_abs();
                write!(f, "{sign}{}.{:02}{}", abs / 100, abs % 100, $suffix)
            }
        }

        impl Add for $name {
            type Output = $name;

            fn add(self, rhs: $name) -> Self::Output {
                $name(self.0.saturating_add(rhs.0))
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: $name) {
                self.0 = self.0.saturating_add(rhs.0);
            }
        }

        impl Sub for $name {
            type Output = $name;

            fn sub(self, rhs: $name) -> Self::Output {
                $name(self.0.saturating_sub(rhs.0))
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: $name) {
                self.0 = self.0.saturating_sub(rhs.0);
            }
        }

        impl Neg for $name {
            type Output = $name;

            fn neg(self) -> Self::Output {
                $name(self.0.saturating_neg())
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = $name>>(iter: I) -> Self {
                iter.fold($name::ZERO, Add::add)
            }
        }

        impl FromStr for $name {
            type Err = EngineError;

            /// Parses a decimal string into hundredths.
            ///
            /// Accepts `.` or `,` as decimal separator, an optional leading
            /// `+`/`-` and at most 2 fractional digits.
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed);
                parse_hundredths(trimmed, Excess::Reject).map(Self)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                if self.0 % 100 == 0 {
                    serializer.serialize_i64(self.0 / 100)
                } else {
                    serializer.serialize_f64(self.to_f64())
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let parsed = match RawNumber::deserialize(deserializer)? {
                    RawNumber::Integer(units) => units
                        .checked_mul(100)
                        .map($name)
                        .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string())),
                    RawNumber::Float(value) => $name::from_f64(value),
                    RawNumber::Text(text) => text.parse(),
                };
                parsed.map_err(serde::de::Error::custom)
            }
        }
    };
}

fixed_point!(
    /// Signed money amount represented as **integer cents**.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wbs_engine::Money;
    ///
    /// let amount = Money::new(12_34);
    /// assert_eq!(amount.cents(), 1234);
    /// assert_eq!(amount.to_string(), "12.34");
    /// assert_eq!("10,5".parse::<Money>().unwrap().cents(), 1050);
    /// assert!("12.345".parse::<Money>().is_err());
    /// ```
    Money,
    ""
);

fixed_point!(
    /// A measured or contracted quantity in **hundredths of a unit**.
    Quantity,
    ""
);

fixed_point!(
    /// A percentage in **hundredths of a percentage point** (`20.00%` is
    /// `Percent::new(2000)`). BDI rates use the same type.
    Percent,
    "%"
);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNumber {
    Integer(i64),
    Float(f64),
    Text(String),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Excess {
    Reject,
    Round,
}

/// Parses `[+-]digits[(.|,)digits]` into hundredths.
fn parse_hundredths(s: &str, excess: Excess) -> ResultEngine<i64> {
    let empty = || EngineError::InvalidAmount("empty amount".to_string());
    let invalid = || EngineError::InvalidAmount(format!("invalid amount: {s}"));
    let overflow = || EngineError::InvalidAmount("amount too large".to_string());

    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(empty());
    }

    let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
        (true, stripped)
    } else if let Some(stripped) = trimmed.strip_prefix('+') {
        (false, stripped)
    } else {
        (false, trimmed)
    };

    let rest = rest.trim().replace(',', ".");
    if rest.is_empty() {
        return Err(empty());
    }
    let mut parts = rest.split('.');
    let whole_str = parts.next().ok_or_else(invalid)?;
    let frac_str = parts.next().unwrap_or("");
    if parts.next().is_some() {
        return Err(invalid());
    }
    if whole_str.is_empty() || !whole_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if !frac_str.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac_str.len() > 2 && excess == Excess::Reject {
        return Err(EngineError::InvalidAmount("too many decimals".to_string()));
    }

    let whole: i64 = whole_str.parse().map_err(|_| overflow())?;
    let mut digits = frac_str.bytes().map(|b| i64::from(b - b'0'));
    let tenths = digits.next().unwrap_or(0);
    let hundredths = digits.next().unwrap_or(0);
    let round_up = digits.next().is_some_and(|thousandths| thousandths >= 5);

    let total = whole
        .checked_mul(100)
        .and_then(|v| v.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
        .ok_or_else(overflow)?;

    Ok(if negative { -total } else { total })
}

impl Money {
    /// Returns the raw value in cents.
    #[must_use]
    pub const fn cents(self) -> i64 {
        self.0
    }

    /// Unit price obtained by spreading this total over `quantity`.
    ///
    /// Rounds toward zero so the derived price never reproduces a total above
    /// the one entered. A zero quantity yields zero.
    #[must_use]
    pub fn per_unit(self, quantity: Quantity) -> Money {
        Money(scale(self.0, 100, quantity.0, RoundingMode::TowardZero))
    }

    /// How many units of `unit_price` this total pays for, rounded toward zero.
    #[must_use]
    pub fn units_at(self, unit_price: Money) -> Quantity {
        Quantity(scale(self.0, 100, unit_price.0, RoundingMode::TowardZero))
    }
}

impl Quantity {
    /// Extended amount `quantity × unit_price`, rounded to cents.
    #[must_use]
    pub fn times(self, unit_price: Money) -> Money {
        Money(scale(self.0, unit_price.0, 100, RoundingMode::HalfAwayFromZero))
    }

    /// The share of this quantity given by `percent`.
    #[must_use]
    pub fn share(self, percent: Percent) -> Quantity {
        Quantity(scale(self.0, percent.0, 100_00, RoundingMode::HalfAwayFromZero))
    }
}

impl Percent {
    /// `part / whole × 100`, zero when `whole` is zero.
    #[must_use]
    pub fn ratio(part: i64, whole: i64) -> Percent {
        Percent(scale(part, 100_00, whole, RoundingMode::HalfAwayFromZero))
    }

    /// Same as [`Percent::ratio`] for quantities.
    #[must_use]
    pub fn of_quantity(part: Quantity, whole: Quantity) -> Percent {
        Self::ratio(part.0, whole.0)
    }

    /// Same as [`Percent::ratio`] for amounts.
    #[must_use]
    pub fn of_money(part: Money, whole: Money) -> Percent {
        Self::ratio(part.0, whole.0)
    }

    pub const HUNDRED: Percent = Percent(100_00);
}
