//! Property-based tests for argument filtering and package pattern matching.
//!
//! - Idempotency: filtering an already-filtered argv changes nothing
//! - Accounting: every input token ends up in exactly one output list
//! - Wildcards: `*` matches every non-empty name, empty inputs match nothing
#![allow(missing_docs)]

use proptest::prelude::*;
use toolrig_core::args::{FilterOptions, filter_args};
use toolrig_core::pattern::is_match;

/// Option and positional tokens drawn from a small vocabulary so that allow
/// and block sets actually hit.
fn token_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("-w".to_string()),
        Just("--watch".to_string()),
        Just("--fix".to_string()),
        Just("--config".to_string()),
        Just("--out-dir=dist".to_string()),
        Just("--".to_string()),
        "--[a-z]{1,6}".prop_map(String::from),
        "--[a-z]{1,6}=[a-z0-9]{1,4}".prop_map(String::from),
        "-[a-z]".prop_map(String::from),
        "[a-z][a-z0-9./]{0,8}".prop_map(String::from),
    ]
}

fn argv_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(token_strategy(), 0..12)
}

fn options_strategy() -> impl Strategy<Value = FilterOptions> {
    let names = prop::collection::vec(
        prop_oneof![
            Just("-w"),
            Just("--watch"),
            Just("--fix"),
            Just("--config"),
            Just("--out-dir")
        ],
        0..4,
    );
    (names, any::<bool>()).prop_map(|(names, allow)| {
        if allow {
            FilterOptions::allow(names)
        } else {
            FilterOptions::block(names)
        }
    })
}

proptest! {
    #[test]
    fn filter_args_is_idempotent(argv in argv_strategy(), options in options_strategy()) {
        let once = filter_args(&argv, &options);
        let twice = filter_args(&once.filtered, &options);
        prop_assert_eq!(twice.filtered, once.filtered);
        prop_assert!(twice.unknown.is_empty());
    }

    #[test]
    fn filter_args_accounts_for_every_token(argv in argv_strategy(), options in options_strategy()) {
        let result = filter_args(&argv, &options);
        prop_assert_eq!(result.filtered.len() + result.unknown.len(), argv.len());
    }

    #[test]
    fn star_matches_every_name(name in "[@a-z/._-]{1,24}") {
        prop_assert!(is_match(&name, "*"));
        prop_assert!(!is_match(&name, ""));
        prop_assert!(!is_match("", &name));
    }

    #[test]
    fn comma_list_matches_each_member(names in prop::collection::vec("[a-z]{1,8}", 1..5)) {
        let pattern = names.join(",");
        for name in &names {
            prop_assert!(is_match(name, &pattern));
        }
    }
}

#[test]
fn test_allow_list_scenario() {
    let argv: Vec<String> = ["--foo", "123", "--bar=456", "-w"]
        .map(String::from)
        .to_vec();
    let result = filter_args(&argv, &FilterOptions::allow(["-w"]));

    assert_eq!(result.filtered, vec!["-w"]);
    assert_eq!(result.unknown, vec!["--foo", "123", "--bar=456"]);
}
