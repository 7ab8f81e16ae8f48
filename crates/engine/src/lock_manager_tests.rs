// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use turnstile_adapters::{FakeLockStore, StoreCall, StoreError};
use turnstile_core::{KeyError, OptionsError, SequentialTokenMint};

const KEY: &str = "lock:orders:42";

fn manager() -> (LockManager<FakeLockStore, SequentialTokenMint>, FakeLockStore) {
    let store = FakeLockStore::new();
    let manager = LockManager::with_mint(store.clone(), SequentialTokenMint::new("t"));
    (manager, store)
}

fn quick(retries: u32) -> LockOptions {
    LockOptions::default()
        .with_retry_attempts(retries)
        .with_retry_delay(Duration::from_millis(1))
}

fn set_calls(store: &FakeLockStore) -> usize {
    store
        .calls()
        .iter()
        .filter(|c| matches!(c, StoreCall::SetIfAbsent { .. }))
        .count()
}

// =============================================================================
// acquire
// =============================================================================

#[tokio::test]
async fn acquire_free_lock_returns_token() {
    let (manager, store) = manager();

    let outcome = manager.acquire("orders", "42", &quick(0)).await.unwrap();

    assert_eq!(outcome, AcquireOutcome::Acquired(LockToken::new("t-1")));
    assert_eq!(store.holder(KEY), Some(LockToken::new("t-1")));
    assert_eq!(
        store.calls(),
        vec![StoreCall::SetIfAbsent {
            key: KEY.to_string(),
            token: LockToken::new("t-1"),
            ttl: Duration::from_secs(30),
        }]
    );
}

#[tokio::test]
async fn contended_lock_retries_then_reports_attempts() {
    let (manager, store) = manager();
    store.hold(KEY, "other", Duration::from_secs(30));

    let outcome = manager.acquire("orders", "42", &quick(2)).await.unwrap();

    assert_eq!(outcome, AcquireOutcome::Contended { attempts: 3 });
    assert_eq!(set_calls(&store), 3);
    assert_eq!(store.holder(KEY), Some(LockToken::new("other")));
}

#[tokio::test]
async fn retries_reuse_one_token() {
    let (manager, store) = manager();
    store.hold(KEY, "other", Duration::from_secs(30));

    manager.acquire("orders", "42", &quick(2)).await.unwrap();

    let tokens: HashSet<LockToken> = store
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            StoreCall::SetIfAbsent { token, .. } => Some(token),
            _ => None,
        })
        .collect();
    assert_eq!(tokens.len(), 1);
}

#[tokio::test]
async fn acquire_succeeds_once_holder_releases() {
    let (manager, store) = manager();
    store.hold(KEY, "other", Duration::from_secs(30));

    let releaser = {
        let store = store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(15)).await;
            store
                .delete_if_owner(KEY, &LockToken::new("other"))
                .await
                .unwrap()
        })
    };

    let options = quick(50)
        .with_retry_delay(Duration::from_millis(5))
        .with_backoff_multiplier(1.0);
    let outcome = manager.acquire("orders", "42", &options).await.unwrap();

    assert!(releaser.await.unwrap());
    assert!(outcome.is_acquired());
}

#[tokio::test]
async fn not_ready_store_is_unavailable_without_store_calls() {
    let (manager, store) = manager();
    store.set_ready(false);

    let outcome = manager.acquire("orders", "42", &quick(3)).await.unwrap();

    assert_eq!(outcome, AcquireOutcome::Unavailable);
    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn connection_drop_mid_acquire_stops_retrying() {
    let (manager, store) = manager();
    store.hold(KEY, "other", Duration::from_secs(30));
    store.fail_next(StoreError::NotReady);

    let outcome = manager.acquire("orders", "42", &quick(5)).await.unwrap();

    assert_eq!(outcome, AcquireOutcome::Unavailable);
    assert_eq!(set_calls(&store), 1);
}

#[tokio::test]
async fn connection_error_during_acquire_is_unavailable() {
    let (manager, store) = manager();
    store.fail_next(StoreError::Connection("broken pipe".into()));

    let outcome = manager.acquire("orders", "42", &quick(0)).await.unwrap();

    assert_eq!(outcome, AcquireOutcome::Unavailable);
    assert_eq!(store.holder(KEY), None);
}

#[tokio::test]
async fn connection_error_during_release_and_extend_is_false() {
    let (manager, store) = manager();
    let token = manager
        .acquire("orders", "42", &quick(0))
        .await
        .unwrap()
        .into_token()
        .unwrap();

    store.fail_next(StoreError::Connection("broken pipe".into()));
    assert!(!manager.release("orders", "42", &token).await.unwrap());

    store.fail_next(StoreError::Connection("broken pipe".into()));
    assert!(!manager
        .extend("orders", "42", &token, Duration::from_secs(60))
        .await
        .unwrap());
}

#[tokio::test(start_paused = true)]
async fn contended_retries_sleep_with_exponential_backoff() {
    let (manager, store) = manager();
    store.hold(KEY, "other", Duration::from_secs(30));
    let started = tokio::time::Instant::now();

    let outcome = manager
        .acquire("orders", "42", &LockOptions::default())
        .await
        .unwrap();

    // 100ms + 200ms + 400ms between the four attempts
    let elapsed = started.elapsed();
    assert_eq!(outcome, AcquireOutcome::Contended { attempts: 4 });
    assert!(elapsed >= Duration::from_millis(700), "slept {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(710), "slept {:?}", elapsed);
    assert_eq!(set_calls(&store), 4);
}

#[tokio::test]
async fn store_error_is_retried_before_the_last_attempt() {
    let (manager, store) = manager();
    store.fail_next(StoreError::Command("busy".into()));

    let outcome = manager.acquire("orders", "42", &quick(1)).await.unwrap();

    assert!(outcome.is_acquired());
    assert_eq!(set_calls(&store), 2);
}

#[tokio::test]
async fn store_error_on_last_attempt_is_returned() {
    let (manager, store) = manager();
    store.fail_next(StoreError::Command("busy".into()));

    let err = manager.acquire("orders", "42", &quick(0)).await.unwrap_err();

    assert!(matches!(err, LockError::Store(StoreError::Command(_))));
}

#[tokio::test]
async fn invalid_key_and_options_are_rejected_before_the_store() {
    let (manager, store) = manager();

    let err = manager.acquire("", "42", &quick(0)).await.unwrap_err();
    assert!(matches!(err, LockError::InvalidKey(KeyError::EmptyResource)));

    let err = manager.acquire("orders", " ", &quick(0)).await.unwrap_err();
    assert!(matches!(err, LockError::InvalidKey(KeyError::EmptyResourceId)));

    let zero = quick(0).with_ttl(Duration::ZERO);
    let err = manager.acquire("orders", "42", &zero).await.unwrap_err();
    assert!(matches!(err, LockError::InvalidOptions(OptionsError::ZeroTtl)));

    assert!(store.calls().is_empty());
}

#[tokio::test]
async fn acquire_default_uses_manager_defaults() {
    let (manager, store) = manager();
    let manager = manager.with_defaults(quick(0).with_ttl(Duration::from_secs(7)));

    manager.acquire_default("orders", "42").await.unwrap();

    assert!(matches!(
        store.calls().as_slice(),
        [StoreCall::SetIfAbsent { ttl, .. }] if *ttl == Duration::from_secs(7)
    ));
}

#[tokio::test]
async fn every_acquisition_gets_a_distinct_token() {
    let store = FakeLockStore::new();
    let manager = LockManager::new(store.clone());
    let mut seen = HashSet::new();

    for id in 0..20 {
        let outcome = manager
            .acquire("orders", &id.to_string(), &quick(0))
            .await
            .unwrap();
        assert!(seen.insert(outcome.into_token().unwrap()));
    }
}

// =============================================================================
// release / extend / exists
// =============================================================================

#[tokio::test]
async fn release_is_owner_only_and_idempotent() {
    let (manager, store) = manager();
    let token = manager
        .acquire("orders", "42", &quick(0))
        .await
        .unwrap()
        .into_token()
        .unwrap();

    assert!(!manager
        .release("orders", "42", &LockToken::new("intruder"))
        .await
        .unwrap());
    assert!(store.holder(KEY).is_some());

    assert!(manager.release("orders", "42", &token).await.unwrap());
    assert!(!manager.release("orders", "42", &token).await.unwrap());
    assert!(store.holder(KEY).is_none());
}

#[tokio::test]
async fn expired_owner_cannot_release_the_next_holder() {
    let (manager, store) = manager();
    let options = quick(0).with_ttl(Duration::from_secs(1));
    let first = manager
        .acquire("orders", "42", &options)
        .await
        .unwrap()
        .into_token()
        .unwrap();

    store.clock().advance(Duration::from_secs(2));
    let second = manager
        .acquire("orders", "42", &options)
        .await
        .unwrap()
        .into_token()
        .unwrap();

    assert!(!manager.release("orders", "42", &first).await.unwrap());
    assert_eq!(store.holder(KEY), Some(second));
}

#[tokio::test]
async fn ttl_expiry_frees_the_lock() {
    let (manager, store) = manager();
    let options = quick(0).with_ttl(Duration::from_secs(1));
    manager.acquire("orders", "42", &options).await.unwrap();
    assert!(manager.exists("orders", "42").await.unwrap());

    store.clock().advance(Duration::from_millis(1000));

    assert!(!manager.exists("orders", "42").await.unwrap());
    assert!(manager
        .acquire("orders", "42", &options)
        .await
        .unwrap()
        .is_acquired());
}

#[tokio::test]
async fn extend_keeps_the_owner_past_its_original_ttl() {
    let (manager, store) = manager();
    let options = quick(0).with_ttl(Duration::from_secs(1));
    let token = manager
        .acquire("orders", "42", &options)
        .await
        .unwrap()
        .into_token()
        .unwrap();

    store.clock().advance(Duration::from_millis(800));
    assert!(manager
        .extend("orders", "42", &token, Duration::from_secs(5))
        .await
        .unwrap());
    store.clock().advance(Duration::from_secs(2));

    assert_eq!(store.holder(KEY), Some(token));
}

#[tokio::test]
async fn extend_by_non_owner_is_refused() {
    let (manager, store) = manager();
    store.hold(KEY, "other", Duration::from_secs(5));

    let extended = manager
        .extend("orders", "42", &LockToken::new("t-9"), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(!extended);
}

#[tokio::test]
async fn extend_rejects_zero_ttl() {
    let (manager, _) = manager();
    let err = manager
        .extend("orders", "42", &LockToken::new("t"), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, LockError::InvalidOptions(OptionsError::ZeroTtl)));
}

#[tokio::test]
async fn not_ready_release_extend_exists_return_false() {
    let (manager, store) = manager();
    store.hold(KEY, "t-1", Duration::from_secs(5));
    store.set_ready(false);
    let token = LockToken::new("t-1");

    assert!(!manager.release("orders", "42", &token).await.unwrap());
    assert!(!manager
        .extend("orders", "42", &token, Duration::from_secs(5))
        .await
        .unwrap());
    assert!(!manager.exists("orders", "42").await.unwrap());
    assert!(store.calls().is_empty());

    store.set_ready(true);
    assert_eq!(store.holder(KEY), Some(token));
}

// =============================================================================
// with_lock
// =============================================================================

#[tokio::test]
async fn with_lock_runs_task_and_releases() {
    let (manager, store) = manager();
    let observed = store.clone();

    let value = manager
        .with_lock("orders", "42", &quick(0), || async move {
            assert!(observed.holder(KEY).is_some());
            Ok::<_, String>(7)
        })
        .await
        .unwrap();

    assert_eq!(value, 7);
    assert!(store.holder(KEY).is_none());
}

#[tokio::test]
async fn with_lock_releases_when_task_fails() {
    let (manager, store) = manager();

    let err = manager
        .with_lock("orders", "42", &quick(0), || async {
            Err::<(), _>("payment declined".to_string())
        })
        .await
        .unwrap_err();

    assert_eq!(err.into_task().as_deref(), Some("payment declined"));
    assert!(store.holder(KEY).is_none());
}

#[tokio::test]
async fn with_lock_releases_then_resumes_panic() {
    let (manager, store) = manager();

    let handle = tokio::spawn(async move {
        manager
            .with_lock("orders", "42", &quick(0), || async {
                if true {
                    panic!("task blew up");
                }
                Ok::<(), String>(())
            })
            .await
    });

    let join = handle.await.unwrap_err();
    assert!(join.is_panic());
    assert!(store.holder(KEY).is_none());
}

#[tokio::test]
async fn with_lock_skips_task_when_contended() {
    let (manager, store) = manager();
    store.hold(KEY, "other", Duration::from_secs(30));
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);

    let err = manager
        .with_lock("orders", "42", &quick(1), || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<(), String>(())
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WithLockError::NotAcquired(AcquireOutcome::Contended { attempts: 2 })
    ));
    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(store.holder(KEY), Some(LockToken::new("other")));
}

#[tokio::test]
async fn with_lock_reports_unavailable_store() {
    let (manager, store) = manager();
    store.set_ready(false);

    let err = manager
        .with_lock("orders", "42", &quick(0), || async { Ok::<(), String>(()) })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WithLockError::NotAcquired(AcquireOutcome::Unavailable)
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_callers_never_overlap() {
    let store = FakeLockStore::new();
    let manager = LockManager::new(store.clone());
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let options = LockOptions::default()
        .with_retry_attempts(1000)
        .with_retry_delay(Duration::from_millis(1))
        .with_backoff_multiplier(1.0);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let manager = manager.clone();
        let active = Arc::clone(&active);
        let peak = Arc::clone(&peak);
        let options = options.clone();
        tasks.push(tokio::spawn(async move {
            manager
                .with_lock("rooms", "7", &options, move || async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<(), String>(())
                })
                .await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn two_bookings_for_one_slot_only_one_wins() {
    let store = FakeLockStore::new();
    let alice = LockManager::new(store.clone());
    let bob = LockManager::new(store.clone());
    let options = quick(0);

    let (a, b) = tokio::join!(
        alice.acquire("bookings", "slot-9", &options),
        bob.acquire("bookings", "slot-9", &options),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    assert_eq!(outcomes.iter().filter(|o| o.is_acquired()).count(), 1);
    assert!(outcomes
        .iter()
        .any(|o| *o == AcquireOutcome::Contended { attempts: 1 }));
}
