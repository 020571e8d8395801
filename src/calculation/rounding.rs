//! Rounding policies.
//!
//! Each [`RoundingPolicyKind`] is implemented by a stateless strategy behind
//! the [`RoundingPolicy`] trait. Outputs always carry two fractional digits.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::models::RoundingPolicyKind;

/// Number of fractional digits monetary amounts carry.
pub const MONEY_SCALE: u32 = 2;

/// A rounding strategy for monetary amounts.
pub trait RoundingPolicy: Send + Sync {
    /// The policy's name.
    fn kind(&self) -> RoundingPolicyKind;

    /// Rounds a full-precision amount.
    fn round(&self, amount: Decimal) -> Decimal;
}

/// Half away from zero, to two fractional digits.
///
/// ```
/// use payroll_engine::calculation::{RoundingPolicy, StandardRounding};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let d = |s| Decimal::from_str(s).unwrap();
/// assert_eq!(StandardRounding.round(d("100.005")), d("100.01"));
/// assert_eq!(StandardRounding.round(d("-100.005")), d("-100.01"));
/// assert_eq!(StandardRounding.round(d("100.004")), d("100.00"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardRounding;

impl RoundingPolicy for StandardRounding {
    fn kind(&self) -> RoundingPolicyKind {
        RoundingPolicyKind::Standard
    }

    fn round(&self, amount: Decimal) -> Decimal {
        let mut rounded =
            amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(MONEY_SCALE);
        rounded
    }
}

/// Housing fund rounding: keep the integer part and add one when the
/// discarded fraction is at least 0.1.
///
/// Negative amounts are rounded on their magnitude and the sign restored.
///
/// ```
/// use payroll_engine::calculation::{RoundingPolicy, ThresholdRounding};
/// use rust_decimal::Decimal;
/// use std::str::FromStr;
///
/// let d = |s| Decimal::from_str(s).unwrap();
/// assert_eq!(ThresholdRounding.round(d("100.09")), d("100"));
/// assert_eq!(ThresholdRounding.round(d("100.1")), d("101"));
/// assert_eq!(ThresholdRounding.round(d("-100.15")), d("-101"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdRounding;

impl ThresholdRounding {
    /// The fraction at or above which the integer part is bumped.
    pub fn threshold() -> Decimal {
        Decimal::new(1, 1)
    }
}

impl RoundingPolicy for ThresholdRounding {
    fn kind(&self) -> RoundingPolicyKind {
        RoundingPolicyKind::Threshold
    }

    fn round(&self, amount: Decimal) -> Decimal {
        let magnitude = amount.abs();
        let integer = magnitude.trunc();
        let mut rounded = if magnitude - integer >= Self::threshold() {
            integer + Decimal::ONE
        } else {
            integer
        };
        if amount.is_sign_negative() && !rounded.is_zero() {
            rounded = -rounded;
        }
        rounded.rescale(MONEY_SCALE);
        rounded
    }
}

static STANDARD: StandardRounding = StandardRounding;
static THRESHOLD: ThresholdRounding = ThresholdRounding;

/// Returns the strategy for a named policy.
pub fn rounding_policy(kind: RoundingPolicyKind) -> &'static dyn RoundingPolicy {
    match kind {
        RoundingPolicyKind::Standard => &STANDARD,
        RoundingPolicyKind::Threshold => &THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_threshold_rounding_table() {
        let cases = [
            ("100.0", "100"),
            ("100.05", "100"),
            ("100.09", "100"),
            ("0.1", "1"),
            ("100.1", "101"),
            ("100.15", "101"),
            ("100.99", "101"),
            ("0.05", "0"),
            ("0.99", "1"),
        ];
        for (input, expected) in cases {
            assert_eq!(
                ThresholdRounding.round(dec(input)),
                dec(expected),
                "threshold rounding of {input}"
            );
        }
    }

    #[test]
    fn test_threshold_rounding_negative_magnitude() {
        assert_eq!(ThresholdRounding.round(dec("-100.09")), dec("-100"));
        assert_eq!(ThresholdRounding.round(dec("-0.1")), dec("-1"));
        assert_eq!(ThresholdRounding.round(dec("-0.05")), Decimal::ZERO);
        assert!(!ThresholdRounding.round(dec("-0.05")).is_sign_negative());
    }

    #[test]
    fn test_threshold_output_has_two_decimal_places() {
        assert_eq!(ThresholdRounding.round(dec("1234.5678")).to_string(), "1235.00");
        assert_eq!(ThresholdRounding.round(dec("7")).to_string(), "7.00");
    }

    #[test]
    fn test_standard_rounding_half_away_from_zero() {
        assert_eq!(StandardRounding.round(dec("800.125")), dec("800.13"));
        assert_eq!(StandardRounding.round(dec("800.124999")), dec("800.12"));
        assert_eq!(StandardRounding.round(dec("-0.005")), dec("-0.01"));
        assert_eq!(StandardRounding.round(dec("8")).to_string(), "8.00");
    }

    #[test]
    fn test_policy_lookup() {
        assert_eq!(
            rounding_policy(RoundingPolicyKind::Threshold).kind(),
            RoundingPolicyKind::Threshold
        );
        assert_eq!(
            rounding_policy(RoundingPolicyKind::Standard).round(dec("1.005")),
            dec("1.01")
        );
    }

    proptest! {
        #[test]
        fn prop_threshold_rounds_to_integer_within_one(cents in 0i64..100_000_000) {
            let amount = Decimal::new(cents, 2);
            let rounded = ThresholdRounding.round(amount);
            let integer = amount.trunc();

            prop_assert_eq!(rounded.fract(), Decimal::ZERO);
            prop_assert!(rounded == integer || rounded == integer + Decimal::ONE);
            prop_assert_eq!(rounded > integer, amount - integer >= dec("0.1"));
        }

        #[test]
        fn prop_threshold_is_symmetric(cents in 10i64..100_000_000) {
            let amount = Decimal::new(cents, 2);
            prop_assert_eq!(
                ThresholdRounding.round(-amount),
                -ThresholdRounding.round(amount)
            );
        }

        #[test]
        fn prop_standard_stays_within_half_cent(milli in -1_000_000_000i64..1_000_000_000) {
            let amount = Decimal::new(milli, 3);
            let rounded = StandardRounding.round(amount);
            prop_assert!((rounded - amount).abs() <= dec("0.005"));
            prop_assert_eq!(rounded.scale(), MONEY_SCALE);
        }
    }
}
