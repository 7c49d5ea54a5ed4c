//! Property-based tests for the order lifecycle.

use proptest::prelude::*;

use super::order::{OrderLifecycle, OrderStatus};

fn arb_status() -> impl Strategy<Value = OrderStatus> {
    prop::sample::select(OrderStatus::ALL.to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// No transition ever returns an order to pending.
    #[test]
    fn prop_never_back_to_pending(from in arb_status()) {
        prop_assert!(!OrderLifecycle::is_valid_transition(from, OrderStatus::Pending));
    }

    /// Valid transitions only start from non-terminal statuses.
    #[test]
    fn prop_terminal_is_final(from in arb_status(), to in arb_status()) {
        if OrderLifecycle::is_valid_transition(from, to) {
            prop_assert!(!from.is_terminal());
            prop_assert_ne!(from, to);
        }
    }

    /// `transition` agrees with `is_valid_transition`.
    #[test]
    fn prop_transition_matches_predicate(from in arb_status(), to in arb_status()) {
        let result = OrderLifecycle::transition(from, to);
        prop_assert_eq!(result.is_ok(), OrderLifecycle::is_valid_transition(from, to));
        if let Ok(status) = result {
            prop_assert_eq!(status, to);
        }
    }
}
