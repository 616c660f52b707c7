//! Precedence, release and limit-mode scenarios.

use querycost::cost::{ChainedEnforcer, Cost, Enforcer, Limit, QUERY_LEVEL};
use regex::Regex;

use super::{assert_clean, cur_cost, enforcer, tree};

fn assert_error_matches(report: &querycost::Report, pattern: &str) {
    let err = report.error.as_ref().expect("expected an error");
    let re = Regex::new(pattern).unwrap();
    assert!(re.is_match(&err.to_string()), "{:?} does not match {}", err.to_string(), pattern);
}

#[test]
fn test_local_limit_takes_precedence() {
    let query = tree(&[100.0, 5.0]).child("query");
    let report = query.add(Cost::new(6.0));
    assert_error_matches(&report, r"^exceeded query limit: 6 exceeds limit of 5$");
}

#[test]
fn test_global_limit_reported_when_local_is_clean() {
    let root = tree(&[5.0, 100.0]);
    let query = root.child("query");

    let report = query.add(Cost::new(6.0));
    assert_error_matches(&report, r"^exceeded global limit: 6 exceeds limit of 5$");

    // not rejected locally
    let (local, _) = query.state();
    assert_clean(&local, 6.0);
}

#[test]
fn test_disabled_limit_never_rejects() {
    let root = ChainedEnforcer::new(
        "global",
        vec![
            Enforcer::with_limit(Limit::disabled(Cost::new(1.0))),
            Enforcer::with_limit(Limit::disabled(Cost::new(1.0))),
        ],
    )
    .unwrap();
    let query = root.child(QUERY_LEVEL);

    let report = query.add(Cost::new(1000.0));
    assert_clean(&report, 1000.0);
    assert_eq!(cur_cost(root.as_ref()), Cost::new(1000.0));
}

#[test]
fn test_release_zeroes_contribution() {
    for cost in [0.0, 1.0, 2.5, 99.0, 1e9, -3.0] {
        for limits in [[10.0, 5.0], [1.0, 1e12], [1e12, 1e12]] {
            let root = tree(&limits);
            let existing = root.child("existing");
            existing.add(Cost::new(4.0));
            let before = cur_cost(root.as_ref());

            let query = root.child("query");
            query.add(Cost::new(cost));
            query.release().unwrap();

            assert_eq!(cur_cost(root.as_ref()), before, "cost {} limits {:?}", cost, limits);
        }
    }
}

#[test]
fn test_state_is_idempotent() {
    let query = tree(&[10.0, 5.0]).child("query");
    query.add(Cost::new(7.0));
    assert_eq!(query.state(), query.state());
}

#[test]
fn test_sibling_scopes_with_distinct_limits() {
    // root 10, child A 5, child B 100
    let root = tree(&[10.0, 100.0]);
    let a = root.child_with("a", &enforcer(5.0));
    let b = root.child_with("b", &enforcer(100.0));

    let report = a.add(Cost::new(6.0));
    assert_error_matches(&report, "^exceeded a limit");
    assert_eq!(cur_cost(root.as_ref()), Cost::new(6.0));
    assert!(root.state().0.is_ok());

    assert!(b.add(Cost::new(3.0)).is_ok());
    assert_eq!(cur_cost(root.as_ref()), Cost::new(9.0));

    let report = b.add(Cost::new(2.0));
    assert_error_matches(&report, "^exceeded global limit: 11 exceeds limit of 10");
    assert_eq!(report.error.as_ref().unwrap().scope(), Some("global"));
    assert_clean(&b.state().0, 5.0);

    a.release().unwrap();
    assert_eq!(cur_cost(root.as_ref()), Cost::new(5.0));
}

#[test]
fn test_release_returns_final_report() {
    let root = tree(&[100.0, 100.0]);
    let query = root.child("query");
    query.add(Cost::new(30.0));

    let report = query.release().unwrap();
    assert_clean(&report, 0.0);
}

#[test]
fn test_parent_released_before_child() {
    let root = tree(&[100.0, 100.0, 100.0]);
    let query = root.child("query");
    let block = query.child("block");
    block.add(Cost::new(8.0));

    // releasing the query first already returns the block's share to global
    query.release().unwrap();
    assert_eq!(cur_cost(root.as_ref()), Cost::ZERO);

    block.release().unwrap();
    assert_eq!(cur_cost(root.as_ref()), Cost::ZERO);
}

#[test]
fn test_noop_interior_level() {
    let root = ChainedEnforcer::new("global", vec![enforcer(10.0), Enforcer::noop(), enforcer(5.0)])
        .unwrap();
    let query = root.child("query");
    let block = query.child("block");

    assert_clean(&block.add(Cost::new(3.0)), 3.0);
    assert_clean(&query.state().0, 0.0);
    assert_eq!(cur_cost(root.as_ref()), Cost::new(3.0));

    // block limit still enforced under the unmetered level
    let report = block.add(Cost::new(3.0));
    assert_error_matches(&report, r"^exceeded block limit: 6 exceeds limit of 5$");
    assert_eq!(cur_cost(root.as_ref()), Cost::new(6.0));

    block.release().unwrap();
    assert_clean(&query.release().unwrap(), 0.0);
    assert_eq!(cur_cost(root.as_ref()), Cost::ZERO);
}

#[test]
fn test_noop_leaf_level() {
    let root = ChainedEnforcer::new("global", vec![enforcer(10.0), enforcer(5.0), Enforcer::noop()])
        .unwrap();
    let query = root.child("query");
    let block = query.child("block");

    assert_clean(&block.add(Cost::new(4.0)), 0.0);
    assert_eq!(cur_cost(query.as_ref()), Cost::new(4.0));
    assert_eq!(cur_cost(root.as_ref()), Cost::new(4.0));

    // the leaf holds nothing to release, the query hands back its own total
    block.release().unwrap();
    assert_eq!(cur_cost(root.as_ref()), Cost::new(4.0));
    query.release().unwrap();
    assert_eq!(cur_cost(root.as_ref()), Cost::ZERO);
}
