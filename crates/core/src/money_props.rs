//! Property-based tests for money primitives.

use proptest::prelude::*;
use rust_decimal::Decimal;

use super::money::{compute_fee, score_delta, validate_amount};

/// Strategy to generate valid amounts (0.01 to 1,000,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..100_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Strategy to generate fee rates between 0.0000 and 1.0000.
fn fee_rate() -> impl Strategy<Value = Decimal> {
    (0i64..=10_000i64).prop_map(|v| Decimal::new(v, 4))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Fee and net always add back up to the original amount.
    #[test]
    fn prop_fee_plus_net_is_amount(amount in positive_amount(), rate in fee_rate()) {
        let breakdown = compute_fee(amount, rate);
        prop_assert_eq!(breakdown.fee + breakdown.net, amount);
    }

    /// Fee never exceeds the amount and never goes negative.
    #[test]
    fn prop_fee_bounded(amount in positive_amount(), rate in fee_rate()) {
        let breakdown = compute_fee(amount, rate);
        prop_assert!(breakdown.fee >= Decimal::ZERO);
        prop_assert!(breakdown.fee <= amount);
        prop_assert!(breakdown.net >= Decimal::ZERO);
    }

    /// Fee is always representable with two decimal places.
    #[test]
    fn prop_fee_has_cent_precision(amount in positive_amount(), rate in fee_rate()) {
        let breakdown = compute_fee(amount, rate);
        prop_assert!(breakdown.fee.normalize().scale() <= 2);
    }

    /// Score accrual at rate 1 is the amount rounded half away from zero.
    #[test]
    fn prop_unit_score_rate(cents in 1i64..100_000_000i64) {
        let amount = Decimal::new(cents, 2);
        let expected = (cents + 50) / 100;
        prop_assert_eq!(score_delta(amount, Decimal::ONE), expected);
    }

    /// Generated amounts always pass validation; a third decimal never does.
    #[test]
    fn prop_validation(cents in 1i64..100_000_000i64, extra in 1i64..10i64) {
        prop_assert!(validate_amount(Decimal::new(cents, 2)).is_ok());
        prop_assert!(validate_amount(Decimal::new(cents * 10 + extra, 3)).is_err());
    }
}
