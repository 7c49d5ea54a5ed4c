//! Money primitives.
//!
//! Amounts are `rust_decimal::Decimal` values with at most two fractional
//! digits. All rounding is half away from zero so fees and scores are
//! reproducible across processes.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::ledger::LedgerError;

/// Fractional digits accepted for monetary amounts.
pub const AMOUNT_SCALE: u32 = 2;

/// Validates an amount against the default two-digit scale.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` if the amount is not strictly
/// positive or carries more than two fractional digits.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    validate_amount_with_scale(amount, AMOUNT_SCALE)
}

/// Validates an amount against a custom maximum scale.
///
/// Trailing zeros do not count: `1.500` is accepted at scale 2.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` on a non-positive or over-precise amount.
pub fn validate_amount_with_scale(amount: Decimal, max_scale: u32) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "amount must be positive, got {amount}"
        )));
    }
    if amount.normalize().scale() > max_scale {
        return Err(LedgerError::InvalidAmount(format!(
            "amount {amount} has more than {max_scale} decimal places"
        )));
    }
    Ok(amount)
}

/// Result of splitting a payment into fee and merchant proceeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeBreakdown {
    /// Fee withheld from the payee.
    pub fee: Decimal,
    /// Amount credited to the payee.
    pub net: Decimal,
    /// Fee rate as a whole percentage, for remarks.
    pub fee_percent: i64,
}

impl FeeBreakdown {
    /// A breakdown with no fee.
    #[must_use]
    pub const fn free(amount: Decimal) -> Self {
        Self {
            fee: Decimal::ZERO,
            net: amount,
            fee_percent: 0,
        }
    }

    /// Appends the system fee annotation to a payer remark.
    #[must_use]
    pub fn annotate(&self, remark: &str) -> String {
        let note = format!("[system]: charged merchant {}% fee", self.fee_percent);
        let remark = remark.trim();
        if remark.is_empty() {
            note
        } else {
            format!("{remark} {note}")
        }
    }
}

/// Splits `amount` into fee and net proceeds at `fee_rate`.
///
/// `fee = round(amount * fee_rate, 2)`, `net = amount - fee`, so
/// `fee + net == amount` always holds exactly.
#[must_use]
pub fn compute_fee(amount: Decimal, fee_rate: Decimal) -> FeeBreakdown {
    let fee = (amount * fee_rate)
        .round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::MidpointAwayFromZero);
    FeeBreakdown {
        fee,
        net: amount - fee,
        fee_percent: round_to_integer(fee_rate * Decimal::ONE_HUNDRED),
    }
}

/// Score accrued for moving `amount` at `score_rate`.
#[must_use]
pub fn score_delta(amount: Decimal, score_rate: Decimal) -> i64 {
    round_to_integer(amount * score_rate)
}

/// Formats an amount as a fixed two-digit string, truncating extra digits.
///
/// Used for signed merchant parameters where both sides must agree on the text.
#[must_use]
pub fn format_money(amount: Decimal) -> String {
    let truncated = amount.round_dp_with_strategy(AMOUNT_SCALE, RoundingStrategy::ToZero);
    format!("{truncated:.2}")
}

fn round_to_integer(value: Decimal) -> i64 {
    value
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(10.00), dec!(0.03), dec!(0.30), dec!(9.70), 3)]
    #[case(dec!(0.05), dec!(0.10), dec!(0.01), dec!(0.04), 10)]
    #[case(dec!(0.15), dec!(0.03), dec!(0.00), dec!(0.15), 3)]
    #[case(dec!(1.50), dec!(0.05), dec!(0.08), dec!(1.42), 5)]
    #[case(dec!(99.99), dec!(0.025), dec!(2.50), dec!(97.49), 3)]
    #[case(dec!(250), dec!(0), dec!(0), dec!(250), 0)]
    fn test_compute_fee(
        #[case] amount: Decimal,
        #[case] rate: Decimal,
        #[case] fee: Decimal,
        #[case] net: Decimal,
        #[case] percent: i64,
    ) {
        let breakdown = compute_fee(amount, rate);
        assert_eq!(breakdown.fee, fee);
        assert_eq!(breakdown.net, net);
        assert_eq!(breakdown.fee_percent, percent);
    }

    #[rstest]
    #[case(dec!(10.00), dec!(1), 10)]
    #[case(dec!(2.50), dec!(1), 3)]
    #[case(dec!(2.49), dec!(1), 2)]
    #[case(dec!(10.00), dec!(0.05), 1)]
    #[case(dec!(9.00), dec!(0.05), 0)]
    #[case(dec!(0.01), dec!(0), 0)]
    fn test_score_delta(#[case] amount: Decimal, #[case] rate: Decimal, #[case] expected: i64) {
        assert_eq!(score_delta(amount, rate), expected);
    }

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(dec!(0.01)).is_ok());
        assert!(validate_amount(dec!(1.500)).is_ok());
        assert!(validate_amount(dec!(100)).is_ok());
        assert!(matches!(
            validate_amount(dec!(0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(dec!(-5.00)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            validate_amount(dec!(1.005)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_validate_amount_custom_scale() {
        assert!(validate_amount_with_scale(dec!(1.005), 3).is_ok());
        assert!(validate_amount_with_scale(dec!(1.5), 0).is_err());
        assert!(validate_amount_with_scale(dec!(7), 0).is_ok());
    }

    #[test]
    fn test_annotate_remark() {
        let breakdown = compute_fee(dec!(10.00), dec!(0.03));
        assert_eq!(
            breakdown.annotate("coffee"),
            "coffee [system]: charged merchant 3% fee"
        );
        assert_eq!(
            breakdown.annotate("  "),
            "[system]: charged merchant 3% fee"
        );
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(dec!(10)), "10.00");
        assert_eq!(format_money(dec!(9.999)), "9.99");
        assert_eq!(format_money(dec!(0.5)), "0.50");
    }
}
