//! Property-based tests for journal entry validation rules.

use proptest::prelude::*;
use quire_shared::types::{AccountId, Amount};
use rust_decimal::Decimal;

use super::types::LineInput;
use super::validation::JournalValidator;
use crate::error::LedgerError;

/// Strategy to generate a valid positive amount (> 0).
fn positive_amount() -> impl Strategy<Value = Amount> {
    // Generate amounts from 0.01 to 1,000,000.00
    (1i64..100_000_000i64).prop_map(|cents| Amount::new(Decimal::new(cents, 2)))
}

/// Strategy for a list of positive amounts.
fn amounts(max: usize) -> impl Strategy<Value = Vec<Amount>> {
    prop::collection::vec(positive_amount(), 1..max)
}

fn lines_from(debits: &[Amount], credits: &[Amount]) -> Vec<LineInput> {
    debits
        .iter()
        .map(|d| LineInput::debit(AccountId::new(), *d))
        .chain(credits.iter().map(|c| LineInput::credit(AccountId::new(), *c)))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// An entry whose credits mirror its debits always balances.
    #[test]
    fn prop_mirrored_entry_balances(debits in amounts(8)) {
        let total: Amount = debits.iter().sum();
        let lines = lines_from(&debits, &[total]);
        let structured = JournalValidator::check_structure("mirror", &lines).unwrap();
        let totals = JournalValidator::check_balance(&structured).unwrap();
        prop_assert_eq!(totals.debit, totals.credit);
    }

    /// Any nonzero cent difference is rejected and reported exactly.
    #[test]
    fn prop_difference_reported(
        debits in amounts(8),
        skew in (1i64..10_000i64).prop_map(|c| Amount::new(Decimal::new(c, 2))),
    ) {
        let total: Amount = debits.iter().sum();
        let lines = lines_from(&debits, &[total + skew]);
        let structured = JournalValidator::check_structure("skewed", &lines).unwrap();
        let result = JournalValidator::check_balance(&structured);
        prop_assert!(
            matches!(result, Err(LedgerError::Unbalanced { difference, .. }) if difference == -skew),
            "expected difference {}", -skew
        );
    }

    /// Sub-cent noise that rounds away does not unbalance an entry.
    #[test]
    fn prop_sub_cent_noise_tolerated(debit in positive_amount(), noise in 0i64..5i64) {
        let noisy = debit + Amount::new(Decimal::new(noise, 3));
        let lines = lines_from(&[noisy], &[debit]);
        let structured = JournalValidator::check_structure("noise", &lines).unwrap();
        prop_assert!(JournalValidator::check_balance(&structured).is_ok());
    }

    /// Negative amounts are always rejected, wherever they appear.
    #[test]
    fn prop_negative_amount_rejected(
        good in positive_amount(),
        bad in positive_amount(),
        position in 0usize..2,
    ) {
        let mut lines = lines_from(&[good], &[good]);
        lines[position] = LineInput::debit(AccountId::new(), -bad);
        let result = JournalValidator::check_structure("negative", &lines);
        prop_assert!(matches!(result, Err(LedgerError::NegativeAmount { position: p }) if p == position), "expected NegativeAmount at position {}, got {:?}", position, result);
    }
}
