//! Batch lifecycle sweeps: disabling inactive accounts and purging
//! long-disabled ones.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::TestApp;
use credential_service::models::TokenKind;
use credential_service::scheduler::{LifecycleSweeper, BATCH_SIZE};
use credential_service::store::IdentityStore;

const THRESHOLD_DAYS: i64 = 90;

fn sweeper(app: &TestApp) -> LifecycleSweeper {
    LifecycleSweeper::new(app.store.clone() as Arc<dyn IdentityStore>, THRESHOLD_DAYS)
}

#[tokio::test]
async fn disable_sweep_processes_everything_in_batches() {
    let app = TestApp::new();
    let stale = Utc::now() - Duration::days(THRESHOLD_DAYS + 1);

    // Two full batches plus a partial third.
    let total = BATCH_SIZE as usize * 2 + 3;
    for i in 0..total {
        app.add_local_account_with_login(&format!("stale{}", i), true, stale)
            .await;
    }

    let outcome = sweeper(&app).disable_inactive().await;
    assert_eq!(outcome.total, total);
    assert_eq!(outcome.errors, 0);

    for i in 0..total {
        let account = app
            .store
            .find_account_by_username(&format!("STALE{}", i))
            .await
            .unwrap()
            .unwrap();
        assert!(!account.enabled);
    }
}

#[tokio::test]
async fn disable_sweep_leaves_recent_and_external_accounts_alone() {
    let app = TestApp::new();
    let recent = Utc::now() - Duration::days(1);
    let stale = Utc::now() - Duration::days(THRESHOLD_DAYS + 1);

    app.add_local_account_with_login("active", true, recent).await;
    let mut shadow = app.add_local_account_with_login("shadow", true, stale).await;
    shadow.source_code = "directory".to_string();
    app.store.update_account(&shadow).await.unwrap();

    let outcome = sweeper(&app).disable_inactive().await;
    assert_eq!(outcome.total, 0);
    assert_eq!(outcome.errors, 0);

    for username in ["ACTIVE", "SHADOW"] {
        let account = app
            .store
            .find_account_by_username(username)
            .await
            .unwrap()
            .unwrap();
        assert!(account.enabled);
    }
}

#[tokio::test]
async fn a_failed_batch_is_counted_and_the_sweep_retries() {
    let app = TestApp::new();
    app.store.inject_query_failures(1);

    let outcome = sweeper(&app).disable_inactive().await;
    assert_eq!(outcome.total, 0);
    assert_eq!(outcome.errors, 1);
}

#[tokio::test]
async fn sweep_halts_after_three_failed_batches() {
    let app = TestApp::new();
    let stale = Utc::now() - Duration::days(THRESHOLD_DAYS + 1);
    app.add_local_account_with_login("stale", true, stale).await;
    app.store.inject_query_failures(5);

    let outcome = sweeper(&app).disable_inactive().await;
    assert_eq!(outcome.total, 0);
    assert_eq!(outcome.errors, 3);

    // Halting left the account untouched.
    let account = app
        .store
        .find_account_by_username("STALE")
        .await
        .unwrap()
        .unwrap();
    assert!(account.enabled);
}

#[tokio::test]
async fn failures_interleaved_with_progress_still_drain_the_backlog() {
    let app = TestApp::new();
    let stale = Utc::now() - Duration::days(THRESHOLD_DAYS + 1);
    for i in 0..3 {
        app.add_local_account_with_login(&format!("stale{}", i), true, stale)
            .await;
    }
    app.store.inject_query_failures(1);

    let outcome = sweeper(&app).disable_inactive().await;
    assert_eq!(outcome.total, 3);
    assert_eq!(outcome.errors, 1);
}

#[tokio::test]
async fn delete_sweep_purges_account_and_dependents() {
    let app = TestApp::new();
    let dormant = Utc::now() - Duration::days(400);
    let account = app
        .add_local_account_with_login("dormant", false, dormant)
        .await;

    app.tokens.issue(&account, TokenKind::Reset).await.unwrap();
    app.store.increment_retry_count("DORMANT").await.unwrap();

    let outcome = sweeper(&app).delete_disabled().await;
    assert_eq!(outcome.total, 1);
    assert_eq!(outcome.errors, 0);

    assert_eq!(app.store.account_count(), 0);
    assert_eq!(app.store.token_count(), 0);
    assert!(app.store.get_retry_count("DORMANT").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_sweep_spares_recently_disabled_accounts() {
    let app = TestApp::new();
    let recently_disabled = Utc::now() - Duration::days(100);
    app.add_local_account_with_login("resting", false, recently_disabled)
        .await;

    let outcome = sweeper(&app).delete_disabled().await;
    assert_eq!(outcome.total, 0);
    assert_eq!(app.store.account_count(), 1);
}

#[tokio::test]
async fn enabled_accounts_are_never_deleted() {
    let app = TestApp::new();
    let dormant = Utc::now() - Duration::days(400);
    app.add_local_account_with_login("dormant", true, dormant).await;

    let outcome = sweeper(&app).delete_disabled().await;
    assert_eq!(outcome.total, 0);
    assert_eq!(app.store.account_count(), 1);
}
