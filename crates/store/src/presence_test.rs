//! Presence merge policy tests
//!
//! The merge must be precision-monotonic, keep the earliest event timestamp,
//! and be order-independent under any permutation of observations.

use chrono::{DateTime, TimeZone, Utc};

use sb_geo::{AdminCodes, PrecisionClass};

use crate::presence::PresenceFacts;

fn ts(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 25, 10, minute, 0).unwrap()
}

fn facts(precision: PrecisionClass, accuracy: Option<f64>, h3: &str, minute: u32) -> PresenceFacts {
    PresenceFacts {
        h3_r7: Some(format!("{h3}-r7")),
        h3_r9: Some(format!("{h3}-r9")),
        h3_r11: Some(format!("{h3}-r11")),
        place_id: Some(format!("plc_{h3}")),
        admin: AdminCodes {
            country: Some("DO".to_string()),
            province: Some("DO-01".to_string()),
            municipality: None,
            sector: None,
        },
        geo_accuracy_m: accuracy,
        precision,
        first_event_ts: ts(minute),
    }
}

/// Fold a sequence of observations the way the upsert does.
fn fold(observations: &[PresenceFacts]) -> PresenceFacts {
    let mut acc = observations[0].clone();
    for obs in &observations[1..] {
        acc = PresenceFacts::merge(&acc, obs);
    }
    acc
}

// =============================================================================
// Precision monotonicity
// =============================================================================

#[test]
fn test_better_precision_replaces_dims() {
    let coarse = facts(PrecisionClass::Coarse, Some(500.0), "cell_a", 5);
    let high = facts(PrecisionClass::High, Some(20.0), "cell_b", 30);

    let merged = PresenceFacts::merge(&coarse, &high);
    assert_eq!(merged.precision, PrecisionClass::High);
    assert_eq!(merged.h3_r11.as_deref(), Some("cell_b-r11"));
    // The earlier ping still sets first_event_ts.
    assert_eq!(merged.first_event_ts, ts(5));
}

#[test]
fn test_worse_precision_keeps_dims_but_lowers_first_ts() {
    let high = facts(PrecisionClass::High, Some(20.0), "cell_a", 30);
    let coarse = facts(PrecisionClass::Coarse, Some(500.0), "cell_b", 5);

    let merged = PresenceFacts::merge(&high, &coarse);
    assert_eq!(merged.precision, PrecisionClass::High);
    assert_eq!(merged.h3_r11.as_deref(), Some("cell_a-r11"));
    assert_eq!(merged.first_event_ts, ts(5));
}

#[test]
fn test_equal_precision_better_accuracy_wins() {
    let wide = facts(PrecisionClass::Medium, Some(150.0), "cell_a", 5);
    let tight = facts(PrecisionClass::Medium, Some(60.0), "cell_b", 10);

    let merged = PresenceFacts::merge(&wide, &tight);
    assert_eq!(merged.h3_r11.as_deref(), Some("cell_b-r11"));
    assert_eq!(merged.first_event_ts, ts(5));
}

#[test]
fn test_best_observed_survives_any_sequence() {
    let observations = vec![
        facts(PrecisionClass::Medium, Some(100.0), "cell_a", 10),
        facts(PrecisionClass::High, Some(20.0), "cell_b", 20),
        facts(PrecisionClass::Coarse, None, "cell_c", 2),
        facts(PrecisionClass::Medium, Some(80.0), "cell_d", 40),
    ];

    let result = fold(&observations);
    assert_eq!(result.precision, PrecisionClass::High);
    assert_eq!(result.h3_r9.as_deref(), Some("cell_b-r9"));
    assert_eq!(result.first_event_ts, ts(2));
}

// =============================================================================
// Commutativity
// =============================================================================

#[test]
fn test_merge_is_commutative_pairwise() {
    let cases = [
        (
            facts(PrecisionClass::Coarse, Some(500.0), "cell_a", 5),
            facts(PrecisionClass::High, Some(20.0), "cell_b", 30),
        ),
        (
            facts(PrecisionClass::Medium, Some(60.0), "cell_a", 5),
            facts(PrecisionClass::Medium, Some(60.0), "cell_b", 30),
        ),
        (
            facts(PrecisionClass::High, None, "cell_a", 1),
            facts(PrecisionClass::High, Some(10.0), "cell_b", 2),
        ),
    ];

    for (a, b) in cases {
        assert_eq!(
            PresenceFacts::merge(&a, &b),
            PresenceFacts::merge(&b, &a),
            "merge({a:?}, {b:?})"
        );
    }
}

#[test]
fn test_fold_is_permutation_invariant() {
    let observations = [
        facts(PrecisionClass::Coarse, Some(500.0), "cell_a", 50),
        facts(PrecisionClass::High, Some(20.0), "cell_b", 10),
        facts(PrecisionClass::Medium, Some(90.0), "cell_c", 5),
        facts(PrecisionClass::High, Some(20.0), "cell_d", 20),
    ];

    // All 24 permutations of 4 observations.
    let mut results = Vec::new();
    let indices = [0usize, 1, 2, 3];
    for &i in &indices {
        for &j in &indices {
            for &k in &indices {
                for &l in &indices {
                    let set = [i, j, k, l];
                    let mut sorted = set;
                    sorted.sort_unstable();
                    if sorted != [0, 1, 2, 3] {
                        continue;
                    }
                    let seq: Vec<_> = set.iter().map(|&n| observations[n].clone()).collect();
                    results.push(fold(&seq));
                }
            }
        }
    }

    assert_eq!(results.len(), 24);
    for result in &results[1..] {
        assert_eq!(result, &results[0]);
    }
}

#[test]
fn test_merge_is_idempotent() {
    let a = facts(PrecisionClass::Medium, Some(90.0), "cell_a", 5);
    assert_eq!(PresenceFacts::merge(&a, &a), a);
}
