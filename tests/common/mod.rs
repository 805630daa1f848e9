#![allow(dead_code)]
#![allow(unused_imports)]
//! Shared integration test utilities.
//!
//! Import with:
//! ```
//! mod common;
//! use common::*;
//! ```

use causeway::{Cause, Defect, FiberId};
use proptest::prelude::*;
use proptest::test_runner::RngSeed;

pub use causeway::test_utils::{block_on, init_test_logging};

/// Default seed for property tests when running under CI.
pub const DEFAULT_PROPTEST_SEED: u64 = 0x5EED_5EED;

const PROPTEST_SEED_ENV: &str = "CAUSEWAY_PROPTEST_SEED";

/// Build a ProptestConfig with deterministic seed support for CI.
#[must_use]
pub fn test_proptest_config(cases: u32) -> ProptestConfig {
    let mut config = ProptestConfig::with_cases(cases);
    // Honor existing PROPTEST_RNG_SEED, otherwise apply our own.
    if matches!(config.rng_seed, RngSeed::Random) {
        if let Some(seed) = read_proptest_seed() {
            config.rng_seed = RngSeed::Fixed(seed);
        }
    }
    config
}

fn read_proptest_seed() -> Option<u64> {
    if let Ok(value) = std::env::var(PROPTEST_SEED_ENV) {
        return value.parse::<u64>().ok();
    }
    if std::env::var("CI").is_ok() {
        return Some(DEFAULT_PROPTEST_SEED);
    }
    None
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

/// A runtime fiber id drawn from a small pool so collisions happen.
pub fn arb_runtime_id() -> impl Strategy<Value = FiberId> {
    (0u64..6).prop_map(|n| FiberId::runtime(n, 0))
}

/// Any fiber id, including `None` and nested composites.
pub fn arb_fiber_id() -> impl Strategy<Value = FiberId> {
    let leaf = prop_oneof![Just(FiberId::None), arb_runtime_id()];
    leaf.prop_recursive(3, 16, 2, |inner| {
        (inner.clone(), inner).prop_map(|(a, b)| FiberId::composite(a, b))
    })
}

/// A single leaf cause.
pub fn arb_leaf() -> impl Strategy<Value = Cause<u8>> {
    prop_oneof![
        4 => (0u8..8).prop_map(Cause::fail),
        2 => prop::sample::select(vec!["boom", "oops", "bad state"])
            .prop_map(|text| Cause::die(Defect::text(text))),
        2 => arb_runtime_id().prop_map(Cause::interrupt),
    ]
}

/// A cause built only through the smart constructors, so `Empty` never
/// appears below the root.
pub fn arb_cause() -> impl Strategy<Value = Cause<u8>> {
    let leaf = prop_oneof![1 => Just(Cause::Empty), 8 => arb_leaf()];
    leaf.prop_recursive(4, 24, 2, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Cause::sequential(l, r)),
            (inner.clone(), inner).prop_map(|(l, r)| Cause::parallel(l, r)),
        ]
    })
}

/// Hash of any hashable value with the std hasher.
pub fn hash_of<T: std::hash::Hash>(value: &T) -> u64 {
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
