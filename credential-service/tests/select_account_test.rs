//! Re-homing a reset token after an ambiguous email match.

mod common;

use common::{token_from_link, TestApp, RESET_URL_BASE};
use credential_service::store::IdentityStore;
use credential_service::services::ServiceError;

async fn ambiguous_reset(app: &TestApp) -> String {
    app.add_local_account("asmith", Some("shared@example.com")).await;
    app.add_local_account("bsmith", Some("shared@example.com")).await;

    let link = app
        .credentials
        .request_reset("shared@example.com", RESET_URL_BASE)
        .await
        .unwrap()
        .expect("link issued");
    token_from_link(&link).to_string()
}

#[tokio::test]
async fn token_moves_to_the_selected_account() {
    let app = TestApp::new();
    let original = ambiguous_reset(&app).await;

    let fresh = app
        .credentials
        .move_token_to_account(&original, "bsmith")
        .await
        .unwrap();

    assert_ne!(fresh, original);
    assert!(app.store.find_token(&original).await.unwrap().is_none());

    let moved = app.store.find_token(&fresh).await.unwrap().unwrap();
    let target = app
        .store
        .find_account_by_username("BSMITH")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(moved.account_id, target.account_id);

    // The fresh token drives the rest of the reset as usual.
    app.credentials
        .set_password(&fresh, "brand-new-secret")
        .await
        .unwrap();
}

#[tokio::test]
async fn selecting_the_current_owner_is_a_no_op() {
    let app = TestApp::new();
    let original = ambiguous_reset(&app).await;

    let token = app
        .credentials
        .move_token_to_account(&original, "asmith")
        .await
        .unwrap();

    assert_eq!(token, original);
    assert!(app.store.find_token(&original).await.unwrap().is_some());
}

#[tokio::test]
async fn target_with_different_email_is_rejected() {
    let app = TestApp::new();
    let original = ambiguous_reset(&app).await;
    app.add_local_account("csmith", Some("other@example.com")).await;

    let err = app
        .credentials
        .move_token_to_account(&original, "csmith")
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::EmailMismatch));
    assert!(app.store.find_token(&original).await.unwrap().is_some());
}

#[tokio::test]
async fn unknown_target_is_rejected() {
    let app = TestApp::new();
    let original = ambiguous_reset(&app).await;

    let err = app
        .credentials
        .move_token_to_account(&original, "nobody")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound));
}

#[tokio::test]
async fn unknown_token_is_rejected() {
    let app = TestApp::new();
    app.add_local_account("asmith", Some("shared@example.com")).await;

    let err = app
        .credentials
        .move_token_to_account("no-such-token", "asmith")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));
}
