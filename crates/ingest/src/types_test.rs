//! Batch outcome and response shape tests

use sb_protocol::EnvelopeError;

use crate::types::{BatchOutcome, RejectedItem};

#[test]
fn test_outcome_counts() {
    let mut outcome = BatchOutcome::with_capacity(4);
    outcome.accept(false);
    outcome.accept(true);
    outcome.reject(RejectedItem::opted_out(2));
    outcome.accept(true);

    assert_eq!(outcome.accepted(), 3);
    assert_eq!(outcome.deduped_count(), 2);
    assert_eq!(outcome.rejected_count(), 1);
    assert!(!outcome.all_rejected());

    let response = outcome.into_response();
    assert_eq!(response.accepted, 3);
    assert_eq!(response.deduped, vec![false, true, false, true]);
    assert_eq!(response.rejected.len(), 1);
    assert_eq!(response.rejected[0].code, "opted_out");
}

#[test]
fn test_duplicate_submission_shape() {
    // The same envelope twice: both accepted, second flagged deduped.
    let mut outcome = BatchOutcome::with_capacity(2);
    outcome.accept(false);
    outcome.accept(true);

    let response = outcome.into_response();
    assert_eq!(response.accepted, 2);
    assert_eq!(response.deduped, vec![false, true]);
    assert!(response.rejected.is_empty());
}

#[test]
fn test_all_rejected_flag() {
    let mut outcome = BatchOutcome::with_capacity(2);
    outcome.reject(RejectedItem::from_envelope_error(
        0,
        &EnvelopeError::MissingField("event_id"),
    ));
    outcome.reject(RejectedItem::from_envelope_error(
        1,
        &EnvelopeError::NotAnObject,
    ));
    assert!(outcome.all_rejected());
}

#[test]
fn test_rejected_item_codes() {
    let item = RejectedItem::from_envelope_error(3, &EnvelopeError::MissingField("producer"));
    assert_eq!(item.index, 3);
    assert_eq!(item.code, "missing_field");
    assert!(item.message.contains("producer"));

    let serialized = serde_json::to_value(&item).unwrap();
    assert_eq!(serialized["index"], 3);
    assert_eq!(serialized["code"], "missing_field");
}

#[test]
fn test_empty_outcome_is_not_all_rejected() {
    let outcome = BatchOutcome::with_capacity(0);
    assert!(!outcome.all_rejected());
}
