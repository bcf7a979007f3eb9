//! Customer 360 fold tests
//!
//! The snapshot must converge to the same row no matter how deliveries are
//! ordered, with each "last X" group gated independently.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use sb_geo::{AdminCodes, GeoDimensions, PrecisionClass};

use crate::customer::{Customer360, EventSummary};
use crate::license::{LicenseState, LicenseUpdate};

fn ts(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 25, h, m, 0).unwrap()
}

fn summary(event_type: &str, at: DateTime<Utc>) -> EventSummary {
    EventSummary {
        app_uuid: Uuid::nil(),
        anon_user_id: "u_demo_0001".to_string(),
        device_id_hash: "d_demo_0001".to_string(),
        event_ts: at,
        event_type: event_type.to_string(),
        session_id: "s_demo_0001".to_string(),
        sdk_version: "2.4.1".to_string(),
        event_version: "1".to_string(),
    }
}

fn dims(h3: &str) -> GeoDimensions {
    GeoDimensions {
        lat: 18.4861,
        lon: -69.9312,
        accuracy_m: Some(20.0),
        precision: PrecisionClass::High,
        h3_r7: format!("{h3}-r7"),
        h3_r9: format!("{h3}-r9"),
        h3_r11: format!("{h3}-r11"),
        place_id: Some(format!("plc_{h3}")),
        admin: AdminCodes {
            country: Some("DO".to_string()),
            province: Some("DO-01".to_string()),
            municipality: Some("DO-01-01".to_string()),
            sector: None,
        },
    }
}

/// One event in a replayable sequence
#[derive(Clone)]
enum Step {
    Geo(&'static str, DateTime<Utc>),
    License(&'static str, &'static str, DateTime<Utc>),
    Plain(&'static str, DateTime<Utc>),
}

/// Fold a sequence exactly the way the processor does: license events pass
/// through the license gate first, then mirror the settled state.
fn run(steps: &[Step]) -> (Option<Customer360>, Option<LicenseState>) {
    let mut cust: Option<Customer360> = None;
    let mut license: Option<LicenseState> = None;

    for step in steps {
        match step {
            Step::Geo(h3, at) => {
                cust = Some(Customer360::fold_geo(cust, &summary("geo.ping", *at), &dims(h3)));
            }
            Step::License(plan, status, at) => {
                let ev = summary("license.update", *at);
                let update = LicenseUpdate {
                    app_uuid: ev.app_uuid,
                    anon_user_id: ev.anon_user_id.clone(),
                    device_id_hash: Some(ev.device_id_hash.clone()),
                    plan_type: plan.to_string(),
                    license_status: status.to_string(),
                    started_at: None,
                    renewed_at: None,
                    expires_at: None,
                    event_ts: *at,
                };
                let (settled, _) = LicenseState::settle(license.take(), &update);
                cust = Some(Customer360::fold_license(cust, &ev, &settled));
                license = Some(settled);
            }
            Step::Plain(name, at) => {
                cust = Some(Customer360::fold_event(cust, &summary(name, *at)));
            }
        }
    }

    (cust, license)
}

// =============================================================================
// Base fold
// =============================================================================

#[test]
fn test_first_and_last_seen() {
    let (cust, _) = run(&[
        Step::Plain("session.start", ts(10, 0)),
        Step::Plain("ui.tap", ts(9, 0)),
        Step::Plain("screen.view", ts(11, 0)),
    ]);
    let cust = cust.unwrap();

    assert_eq!(cust.first_seen_at, ts(9, 0));
    assert_eq!(cust.last_seen_at, ts(11, 0));
    assert_eq!(cust.last_event_type.as_deref(), Some("screen.view"));
}

#[test]
fn test_late_event_does_not_steal_last_event() {
    let (cust, _) = run(&[
        Step::Plain("screen.view", ts(11, 0)),
        Step::Plain("ui.tap", ts(9, 0)),
    ]);
    let cust = cust.unwrap();

    assert_eq!(cust.first_seen_at, ts(9, 0));
    assert_eq!(cust.last_event_type.as_deref(), Some("screen.view"));
}

// =============================================================================
// Geo fold
// =============================================================================

#[test]
fn test_geo_counts_and_dims() {
    let (cust, _) = run(&[
        Step::Geo("cell_a", ts(10, 0)),
        Step::Geo("cell_b", ts(10, 30)),
    ]);
    let cust = cust.unwrap();

    assert_eq!(cust.geo_events_count, 2);
    assert_eq!(cust.last_h3_r9.as_deref(), Some("cell_b-r9"));
    assert_eq!(cust.last_place_id.as_deref(), Some("plc_cell_b"));
}

#[test]
fn test_equal_timestamp_geo_applies() {
    // The gate is >=, so an incoming event at the same timestamp wins.
    let (cust, _) = run(&[
        Step::Geo("cell_a", ts(10, 0)),
        Step::Geo("cell_b", ts(10, 0)),
    ]);
    let cust = cust.unwrap();

    assert_eq!(cust.geo_events_count, 2);
    assert_eq!(cust.last_h3_r9.as_deref(), Some("cell_b-r9"));
}

#[test]
fn test_newer_plain_event_does_not_block_geo_dims() {
    // A session event after the straggler geo ping must not prevent the geo
    // dims from landing; the geo gate is independent of last_seen.
    let in_order = run(&[
        Step::Geo("cell_a", ts(10, 0)),
        Step::Geo("cell_b", ts(10, 30)),
        Step::Plain("session.end", ts(11, 0)),
    ]);
    let reordered = run(&[
        Step::Geo("cell_a", ts(10, 0)),
        Step::Plain("session.end", ts(11, 0)),
        Step::Geo("cell_b", ts(10, 30)),
    ]);

    assert_eq!(in_order.0, reordered.0);
    assert_eq!(
        in_order.0.unwrap().last_h3_r9.as_deref(),
        Some("cell_b-r9")
    );
}

// =============================================================================
// License fold
// =============================================================================

#[test]
fn test_license_mirrors_track_the_gate() {
    let (cust, license) = run(&[
        Step::License("pro", "active", ts(10, 0)),
        Step::License("free", "expired", ts(9, 0)),
    ]);
    let cust = cust.unwrap();

    // The late event increments the counter but the mirrors keep the newer
    // settled state.
    assert_eq!(cust.license_events_count, 2);
    assert_eq!(cust.last_plan_type.as_deref(), Some("pro"));
    assert_eq!(cust.last_license_status.as_deref(), Some("active"));
    assert_eq!(license.unwrap().plan_type, "pro");
}

// =============================================================================
// Commutativity across families
// =============================================================================

#[test]
fn test_mixed_sequence_is_permutation_invariant() {
    // All timestamps are distinct; ties resolve by arrival order under the
    // >= gates and are exercised separately.
    let steps = [
        Step::Geo("cell_a", ts(10, 0)),
        Step::License("pro", "active", ts(10, 15)),
        Step::Plain("session.start", ts(9, 45)),
        Step::Geo("cell_b", ts(10, 30)),
        Step::License("pro", "expired", ts(12, 0)),
        Step::Plain("system.crash", ts(12, 30)),
    ];

    let baseline = run(&steps);
    assert!(baseline.0.is_some());

    // A handful of adversarial permutations, including full reversal.
    let permutations: [[usize; 6]; 5] = [
        [5, 4, 3, 2, 1, 0],
        [1, 0, 3, 2, 5, 4],
        [4, 1, 5, 0, 2, 3],
        [2, 5, 0, 4, 3, 1],
        [3, 0, 5, 1, 4, 2],
    ];

    for perm in permutations {
        let seq: Vec<Step> = perm.iter().map(|&i| steps[i].clone()).collect();
        let result = run(&seq);
        assert_eq!(result.0, baseline.0, "permutation {perm:?}");
        assert_eq!(result.1, baseline.1, "permutation {perm:?}");
    }
}

#[test]
fn test_final_snapshot_content() {
    let (cust, _) = run(&[
        Step::Geo("cell_a", ts(10, 0)),
        Step::License("pro", "active", ts(10, 15)),
        Step::Geo("cell_b", ts(10, 30)),
    ]);
    let cust = cust.unwrap();

    assert_eq!(cust.first_seen_at, ts(10, 0));
    assert_eq!(cust.last_seen_at, ts(10, 30));
    assert_eq!(cust.last_event_type.as_deref(), Some("geo.ping"));
    assert_eq!(cust.geo_events_count, 2);
    assert_eq!(cust.license_events_count, 1);
    assert_eq!(cust.last_h3_r9.as_deref(), Some("cell_b-r9"));
    assert_eq!(cust.last_plan_type.as_deref(), Some("pro"));
}
