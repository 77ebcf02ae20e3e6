//! Unit tests for one-shot blocked alert tracking.

use citadel::daemon::BlockedAlertCache;

#[test]
fn alerts_once_per_episode() {
    let cache = BlockedAlertCache::new();
    assert!(cache.is_empty());
    assert!(cache.should_alert("pixel"));

    assert!(cache.record("pixel"));
    assert!(!cache.should_alert("pixel"));
    assert!(!cache.record("pixel"), "second record is a no-op");
    assert_eq!(cache.len(), 1);
}

#[test]
fn unblocked_agents_are_forgotten() {
    let cache = BlockedAlertCache::new();
    cache.record("pixel");
    cache.record("ledger");

    cache.retain_blocked(["ledger"]);

    assert!(!cache.contains("pixel"));
    assert!(cache.should_alert("pixel"), "a new episode alerts again");
    assert!(cache.contains("ledger"));
}

#[test]
fn empty_blocked_set_clears_cache() {
    let cache = BlockedAlertCache::new();
    cache.record("pixel");
    cache.retain_blocked(std::iter::empty());
    assert!(cache.is_empty());

    cache.record("ledger");
    cache.clear();
    assert_eq!(cache.len(), 0);
}
