//! Property tests for version ordering.

use proptest::prelude::*;
use rrepo_core::version::{compare, is_well_formed};
use std::cmp::Ordering;

fn version() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[0-9]{1,3}([.-][0-9]{1,3}){0,4}",
        2 => "[0-9a-z]{1,3}([.-][0-9a-z]{1,3}){0,3}",
        1 => "[0-9.a-]{0,6}",
    ]
}

proptest! {
    #[test]
    fn compare_is_reflexive(a in version()) {
        prop_assert_eq!(compare(&a, &a), Ordering::Equal);
    }

    #[test]
    fn compare_is_antisymmetric(a in version(), b in version()) {
        prop_assert_eq!(compare(&a, &b), compare(&b, &a).reverse());
    }

    #[test]
    fn compare_is_transitive(a in version(), b in version(), c in version()) {
        if compare(&a, &b) != Ordering::Greater && compare(&b, &c) != Ordering::Greater {
            prop_assert_ne!(compare(&a, &c), Ordering::Greater);
        }
    }

    #[test]
    fn trailing_zero_segments_are_ignored(a in "[0-9]{1,3}([.-][0-9]{1,3}){0,3}") {
        let padded = format!("{}.0", a);
        prop_assert_eq!(compare(&a, &padded), Ordering::Equal);
    }

    #[test]
    fn malformed_never_beats_well_formed(a in version(), b in version()) {
        if !is_well_formed(&a) && is_well_formed(&b) {
            prop_assert_eq!(compare(&a, &b), Ordering::Less);
        }
    }
}

#[test]
fn numeric_not_lexicographic() {
    assert_eq!(compare("1.2-1", "1.10-1"), Ordering::Less);
}

#[test]
fn zero_padding_equality() {
    assert_eq!(compare("1.0", "1.0.0"), Ordering::Equal);
}
