//! # Fee Calculator
//!
//! Splits a transfer amount into the net amount for the recipient and two
//! fixed-rate fees:
//!
//! ```text
//! fee            = floor(value * 300 / 100_000)    // 0.3%
//! prosynergy_fee = floor(value * 125 / 100_000)    // 0.125%
//! net            = value - fee - prosynergy_fee
//! ```
//!
//! Conservation is by subtraction, never by adding rounded parts, so
//! `net + fee + prosynergy_fee == value` for every input. The products are
//! evaluated without ever forming `value * numerator`, which keeps the split
//! exact and overflow-free across the entire `u128` range.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{FEE_DENOMINATOR, FEE_NUMERATOR, PROSYNERGY_FEE_NUMERATOR};
use crate::types::Amount;

/// Errors produced when constructing a fee schedule.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FeeError {
    #[error("fee denominator must be non-zero")]
    ZeroDenominator,

    /// Denominators are capped at 64 bits so the remainder product fits.
    #[error("fee denominator {0} exceeds 64 bits")]
    DenominatorTooLarge(u128),

    /// The two rates together would take more than the whole amount.
    #[error("fee numerators {fee} + {prosynergy} exceed denominator {denominator}")]
    RatesExceedWhole {
        fee: u128,
        prosynergy: u128,
        denominator: u128,
    },
}

/// The result of splitting one transfer amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSplit {
    /// Amount credited to the recipient.
    pub net: Amount,
    /// Amount credited to the primary fee collector.
    pub fee: Amount,
    /// Amount credited to the prosynergy fee collector.
    pub prosynergy_fee: Amount,
}

impl FeeSplit {
    /// A split that passes the whole value through untouched. Used by the
    /// exempt path.
    pub fn passthrough(value: Amount) -> Self {
        Self {
            net: value,
            fee: 0,
            prosynergy_fee: 0,
        }
    }

    /// Sum of all three legs. Equal to the original value by construction.
    pub fn total(&self) -> Amount {
        self.net + self.fee + self.prosynergy_fee
    }
}

/// Two rate fractions over a shared denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    fee_numerator: u128,
    prosynergy_numerator: u128,
    denominator: u128,
}

impl FeeSchedule {
    /// The schedule every ledger is deployed with: 0.3% + 0.125%.
    pub const STANDARD: FeeSchedule = FeeSchedule {
        fee_numerator: FEE_NUMERATOR,
        prosynergy_numerator: PROSYNERGY_FEE_NUMERATOR,
        denominator: FEE_DENOMINATOR,
    };

    /// Builds a custom schedule.
    ///
    /// # Errors
    ///
    /// Returns [`FeeError::ZeroDenominator`] for a zero denominator,
    /// [`FeeError::DenominatorTooLarge`] above 64 bits, and
    /// [`FeeError::RatesExceedWhole`] if the numerators sum past it.
    pub fn new(
        fee_numerator: u128,
        prosynergy_numerator: u128,
        denominator: u128,
    ) -> Result<Self, FeeError> {
        if denominator == 0 {
            return Err(FeeError::ZeroDenominator);
        }
        if denominator > u128::from(u64::MAX) {
            return Err(FeeError::DenominatorTooLarge(denominator));
        }
        let combined = fee_numerator.checked_add(prosynergy_numerator);
        if combined.map_or(true, |c| c > denominator) {
            return Err(FeeError::RatesExceedWhole {
                fee: fee_numerator,
                prosynergy: prosynergy_numerator,
                denominator,
            });
        }
        Ok(Self {
            fee_numerator,
            prosynergy_numerator,
            denominator,
        })
    }

    /// `floor(value * numerator / denominator)` without the intermediate product.
    ///
    /// With `value = q * d + r`: `floor(value * n / d) = q * n + floor(r * n / d)`.
    /// `q * n <= value` because `n <= d`, and `r * n < d * d < 2^128`.
    fn portion(&self, value: Amount, numerator: u128) -> Amount {
        let q = value / self.denominator;
        let r = value % self.denominator;
        q * numerator + (r * numerator) / self.denominator
    }

    /// Splits `value` into `(net, fee, prosynergy_fee)`.
    pub fn split(&self, value: Amount) -> FeeSplit {
        let fee = self.portion(value, self.fee_numerator);
        let prosynergy_fee = self.portion(value, self.prosynergy_numerator);
        FeeSplit {
            net: value - fee - prosynergy_fee,
            fee,
            prosynergy_fee,
        }
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self::STANDARD
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_million_splits_exactly() {
        let split = FeeSchedule::STANDARD.split(1_000_000);
        assert_eq!(split.fee, 3_000);
        assert_eq!(split.prosynergy_fee, 1_250);
        assert_eq!(split.net, 995_750);
        assert_eq!(split.total(), 1_000_000);
    }

    #[test]
    fn one_hundred_thousand_splits_exactly() {
        let split = FeeSchedule::STANDARD.split(100_000);
        assert_eq!(
            split,
            FeeSplit {
                net: 99_575,
                fee: 300,
                prosynergy_fee: 125
            }
        );
    }

    #[test]
    fn small_amounts_floor_to_zero_fees() {
        // 333 * 300 / 100000 = 0.999 -> 0; 799 * 125 / 100000 = 0.99875 -> 0
        assert_eq!(FeeSchedule::STANDARD.split(333).fee, 0);
        assert_eq!(FeeSchedule::STANDARD.split(799).prosynergy_fee, 0);
        assert_eq!(FeeSchedule::STANDARD.split(0), FeeSplit::default());
        assert_eq!(FeeSchedule::STANDARD.split(1).net, 1);
    }

    #[test]
    fn flooring_matches_naive_formula() {
        for value in [1u128, 333, 334, 799, 800, 12_345, 99_999, 100_001, 7_777_777] {
            let split = FeeSchedule::STANDARD.split(value);
            assert_eq!(split.fee, value * 300 / 100_000, "fee for {value}");
            assert_eq!(split.prosynergy_fee, value * 125 / 100_000, "pfee for {value}");
            assert_eq!(split.total(), value);
        }
    }

    #[test]
    fn max_amount_does_not_overflow() {
        let split = FeeSchedule::STANDARD.split(u128::MAX);
        assert_eq!(split.total(), u128::MAX);
        assert!(split.fee > split.prosynergy_fee);
    }

    #[test]
    fn invalid_schedules_rejected() {
        assert_eq!(FeeSchedule::new(1, 1, 0), Err(FeeError::ZeroDenominator));
        assert!(matches!(
            FeeSchedule::new(60, 50, 100),
            Err(FeeError::RatesExceedWhole { .. })
        ));
        assert!(FeeSchedule::new(u128::MAX, 1, 100).is_err());
        assert_eq!(
            FeeSchedule::new(1, 1, u128::MAX),
            Err(FeeError::DenominatorTooLarge(u128::MAX))
        );
        assert!(FeeSchedule::new(50, 50, 100).is_ok());
    }

    #[test]
    fn passthrough_has_no_fees() {
        let split = FeeSplit::passthrough(42);
        assert_eq!(split.net, 42);
        assert_eq!(split.total(), 42);
    }
}
