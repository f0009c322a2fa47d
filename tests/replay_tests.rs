//! Replay guard behavior under contention and at capacity, including the
//! engine-level guarantee that two concurrent submissions of one token
//! admit exactly one winner.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{init_tracing, mint_hs256, test_policy, MockRequest};
use serde_json::json;
use tokengate::{DecisionEngine, ReplayGuard};

const FAR_FUTURE: i64 = 9_999_999_999;
const NOW: i64 = 1_700_000_000;

#[test]
fn concurrent_checks_of_one_jti_admit_exactly_one() {
    init_tracing();
    let guard = Arc::new(ReplayGuard::new(Duration::from_secs(300), 1024, false));
    let mut handles = Vec::new();
    for _ in 0..8 {
        let guard = Arc::clone(&guard);
        handles.push(thread::spawn(move || {
            guard.check_and_record("contested", FAR_FUTURE, NOW).is_ok()
        }));
    }
    let admitted = handles
        .into_iter()
        .map(|h| h.join())
        .filter(|r| matches!(r, Ok(true)))
        .count();
    assert_eq!(admitted, 1);
    assert_eq!(guard.stats().replays_rejected, 7);
}

#[test]
fn concurrent_identical_requests_admit_exactly_one() {
    init_tracing();
    let engine = Arc::new(DecisionEngine::new(test_policy()));
    let token = mint_hs256(&json!({"jti": "same-token", "exp": FAR_FUTURE}));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let engine = Arc::clone(&engine);
        let token = token.clone();
        handles.push(thread::spawn(move || {
            let req = MockRequest::get().bearer(&token);
            engine.decide_at(&req, NOW).is_admitted()
        }));
    }
    let admitted = handles
        .into_iter()
        .map(|h| h.join())
        .filter(|r| matches!(r, Ok(true)))
        .count();
    assert_eq!(admitted, 1);
}

#[test]
fn distinct_jtis_do_not_contend() {
    init_tracing();
    let guard = Arc::new(ReplayGuard::new(Duration::from_secs(300), 1024, false));
    let mut handles = Vec::new();
    for i in 0..8 {
        let guard = Arc::clone(&guard);
        handles.push(thread::spawn(move || {
            guard
                .check_and_record(&format!("jti-{i}"), FAR_FUTURE, NOW)
                .is_ok()
        }));
    }
    assert!(handles
        .into_iter()
        .map(|h| h.join())
        .all(|r| matches!(r, Ok(true))));
    assert_eq!(guard.stats().size, 8);
}

#[test]
fn window_expiry_frees_capacity_over_time() {
    init_tracing();
    let guard = ReplayGuard::new(Duration::from_secs(60), 1024, false);
    assert!(guard.check_and_record("a", FAR_FUTURE, NOW).is_ok());
    assert!(guard.check_and_record("b", FAR_FUTURE, NOW + 10).is_ok());
    // Past the window both entries are gone and the size reflects it.
    assert!(guard.check_and_record("c", FAR_FUTURE, NOW + 100).is_ok());
    assert_eq!(guard.stats().size, 1);
}

#[test]
fn engine_replay_window_applies_to_long_lived_tokens() {
    init_tracing();
    // Policy window of 300s: a token valid for days can still only be
    // replayed-blocked within the window; afterwards the id is forgotten.
    let engine = DecisionEngine::new(test_policy());
    let token = mint_hs256(&json!({"jti": "long-lived", "exp": FAR_FUTURE}));
    assert!(engine
        .decide_at(&MockRequest::get().bearer(&token), NOW)
        .is_admitted());
    assert!(!engine
        .decide_at(&MockRequest::get().bearer(&token), NOW + 299)
        .is_admitted());
    assert!(engine
        .decide_at(&MockRequest::get().bearer(&token), NOW + 301)
        .is_admitted());
}
