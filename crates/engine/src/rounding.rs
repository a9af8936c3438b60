//! Integer rounding kernel.
//!
//! Every fixed-point value in the engine is an `i64` count of hundredths.
//! Products and quotients are computed in `i128` and rounded back exactly
//! once, right after the operation that produces them.

/// How a quotient is brought back to whole hundredths.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundingMode {
    /// `0.005 -> 0.01`, `-0.005 -> -0.01`.
    HalfAwayFromZero,
    /// Drops the remainder. Used when a derived value must never exceed
    /// what the user literally entered.
    TowardZero,
}

/// Divides `numerator` by `denominator` with the given rounding.
///
/// A zero denominator yields zero. The result saturates into `i64`.
#[must_use]
pub fn divide(numerator: i128, denominator: i128, mode: RoundingMode) -> i64 {
    if denominator == 0 {
        return 0;
    }
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    let rounded = match mode {
        RoundingMode::TowardZero => quotient,
        RoundingMode::HalfAwayFromZero => {
            if remainder.abs() * 2 >= denominator.abs() {
                if (numerator < 0) == (denominator < 0) {
                    quotient + 1
                } else {
                    quotient - 1
                }
            } else {
                quotient
            }
        }
    };
    saturate(rounded)
}

/// Computes `value * numerator / denominator` with a single rounding step.
#[must_use]
pub fn scale(value: i64, numerator: i64, denominator: i64, mode: RoundingMode) -> i64 {
    divide(
        i128::from(value) * i128::from(numerator),
        i128::from(denominator),
        mode,
    )
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_away_from_zero_rounds_ties_outwards() {
        assert_eq!(divide(5, 10, RoundingMode::HalfAwayFromZero), 1);
        assert_eq!(divide(-5, 10, RoundingMode::HalfAwayFromZero), -1);
        assert_eq!(divide(4, 10, RoundingMode::HalfAwayFromZero), 0);
        assert_eq!(divide(15, -10, RoundingMode::HalfAwayFromZero), -2);
    }

    #[test]
    fn toward_zero_drops_remainder() {
        assert_eq!(divide(19, 10, RoundingMode::TowardZero), 1);
        assert_eq!(divide(-19, 10, RoundingMode::TowardZero), -1);
    }

    #[test]
    fn zero_denominator_is_zero() {
        assert_eq!(divide(42, 0, RoundingMode::HalfAwayFromZero), 0);
        assert_eq!(scale(42, 3, 0, RoundingMode::TowardZero), 0);
    }

    #[test]
    fn scale_saturates() {
        assert_eq!(scale(i64::MAX, 10, 1, RoundingMode::TowardZero), i64::MAX);
        assert_eq!(scale(i64::MIN, 10, 1, RoundingMode::TowardZero), i64::MIN);
    }
}
