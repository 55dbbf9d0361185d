//! Property-based test data generators

use proptest::prelude::*;

use core_kernel::{Money, Term};
use domain_billing::{FeeItem, PaymentMethod};

use crate::fixtures::TEST_CURRENCY;

/// Positive amounts in minor units, as Money
pub fn money_strategy() -> impl Strategy<Value = Money> {
    (1i64..10_000_000i64).prop_map(|minor| Money::from_minor(minor, TEST_CURRENCY))
}

/// Non-negative amounts (zero included), as Money
pub fn credit_strategy() -> impl Strategy<Value = Money> {
    (0i64..10_000_000i64).prop_map(|minor| Money::from_minor(minor, TEST_CURRENCY))
}

/// A non-empty set of named fee items
pub fn fee_items_strategy() -> impl Strategy<Value = Vec<FeeItem>> {
    proptest::collection::vec(
        ((1i64..1_000_000i64), "[A-Z][a-z]{3,10}"),
        1..6,
    )
    .prop_map(|entries| {
        entries
            .into_iter()
            .map(|(minor, name)| FeeItem::new(name, Money::from_minor(minor, TEST_CURRENCY)))
            .collect()
    })
}

/// Any payment method
pub fn payment_method_strategy() -> impl Strategy<Value = PaymentMethod> {
    prop_oneof![
        Just(PaymentMethod::Cash),
        Just(PaymentMethod::BankTransfer),
        Just(PaymentMethod::Credit),
        Just(PaymentMethod::MobileMoney),
    ]
}

/// Any academic term
pub fn term_strategy() -> impl Strategy<Value = Term> {
    prop_oneof![Just(Term::First), Just(Term::Second), Just(Term::Third)]
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_money_is_positive(money in money_strategy()) {
            prop_assert!(money.is_positive());
        }

        #[test]
        fn generated_fee_items_are_valid(items in fee_items_strategy()) {
            prop_assert!(!items.is_empty());
            for item in &items {
                prop_assert!(item.amount.is_positive());
                prop_assert!(!item.name.is_empty());
            }
        }
    }
}
