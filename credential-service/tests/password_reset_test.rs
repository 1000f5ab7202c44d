//! Password reset flows: request by username or email, anti-enumeration
//! behaviour, delivery retries, and setting the new password.

mod common;

use chrono::Utc;
use common::{directory_staff, token_from_link, TestApp, RESET_URL_BASE};
use credential_service::models::{ExternalAccount, LockReason, TokenKind};
use credential_service::store::IdentityStore;
use credential_service::services::notify::Channel;
use credential_service::services::ServiceError;

#[tokio::test]
async fn unknown_username_is_swallowed() {
    let app = TestApp::new();

    let link = app
        .credentials
        .request_reset("nobody", RESET_URL_BASE)
        .await
        .unwrap();

    assert!(link.is_none());
    assert_eq!(app.notifier.sent_count(), 0);
    assert_eq!(app.store.token_count(), 0);
}

#[tokio::test]
async fn local_account_gets_confirm_link_and_email() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap()
        .expect("link issued");

    assert!(link.starts_with(&format!("{}-confirm?token=", RESET_URL_BASE)));

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template_id, "reset-confirm");
    assert_eq!(sent[0].to, "jo@example.com");
    assert_eq!(sent[0].personalisation["firstName"], "Jo");
    assert_eq!(sent[0].personalisation["resetLink"], link);
}

#[tokio::test]
async fn username_lookup_is_case_insensitive() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .request_reset("  JsMiTh ", RESET_URL_BASE)
        .await
        .unwrap();
    assert!(link.is_some());
}

#[tokio::test]
async fn directory_match_materializes_shadow_account() {
    let app = TestApp::new();
    app.directory
        .add(directory_staff("jsmith", Some("jo@justice.example.com")));

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap();
    assert!(link.is_some());

    let shadow = app
        .store
        .find_account_by_username("JSMITH")
        .await
        .unwrap()
        .expect("shadow materialized");
    assert_eq!(shadow.source_code, "directory");
    assert!(shadow.verified);
}

#[tokio::test]
async fn ineligible_directory_match_gets_unavailable_email_and_no_shadow() {
    let app = TestApp::new();
    let mut staff = directory_staff("jsmith", Some("jo@justice.example.com"));
    staff.locked = true;
    staff.lock_reason = Some(LockReason::Administrative);
    app.directory.add(staff);

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap();

    assert!(link.is_none());
    assert_eq!(app.store.account_count(), 0);
    assert_eq!(app.store.token_count(), 0);

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template_id, "reset-unavailable");
}

#[tokio::test]
async fn failed_login_lock_is_still_resettable() {
    let app = TestApp::new();
    let mut staff = directory_staff("jsmith", Some("jo@justice.example.com"));
    staff.locked = true;
    staff.lock_reason = Some(LockReason::FailedLogin);
    app.directory.add(staff);

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap();
    assert!(link.is_some());
}

#[tokio::test]
async fn hr_directory_is_consulted_after_primary() {
    let app = TestApp::new();
    app.hr.add(ExternalAccount {
        username: "NCLARK".to_string(),
        active: true,
        locked: false,
        lock_reason: None,
        first_name: Some("Nina".to_string()),
        name: Some("Nina Clark".to_string()),
        email: Some("nina@hr.example.com".to_string()),
    });

    let link = app
        .credentials
        .request_reset("nclark", RESET_URL_BASE)
        .await
        .unwrap();
    assert!(link.is_some());

    let shadow = app
        .store
        .find_account_by_username("NCLARK")
        .await
        .unwrap()
        .expect("shadow materialized");
    assert_eq!(shadow.source_code, "hr");
}

#[tokio::test]
async fn email_with_no_match_notifies_the_address() {
    let app = TestApp::new();

    let link = app
        .credentials
        .request_reset("stranger@example.com", RESET_URL_BASE)
        .await
        .unwrap();

    assert!(link.is_none());
    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template_id, "reset-no-account");
    assert_eq!(sent[0].to, "stranger@example.com");
}

#[tokio::test]
async fn ambiguous_email_match_gets_select_link() {
    let app = TestApp::new();
    app.add_local_account("asmith", Some("shared@example.com")).await;
    app.add_local_account("bsmith", Some("shared@example.com")).await;

    let link = app
        .credentials
        .request_reset("shared@example.com", RESET_URL_BASE)
        .await
        .unwrap()
        .expect("link issued");

    assert!(link.starts_with(&format!("{}-select?token=", RESET_URL_BASE)));

    let sent = app.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].template_id, "reset-select");

    // The token starts on the first eligible match.
    let token = app
        .store
        .find_token(token_from_link(&link))
        .await
        .unwrap()
        .expect("token stored");
    let first = app
        .store
        .find_account_by_username("ASMITH")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.account_id, first.account_id);
}

#[tokio::test]
async fn single_email_match_gets_confirm_link() {
    let app = TestApp::new();
    app.add_local_account("asmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .request_reset("jo@example.com", RESET_URL_BASE)
        .await
        .unwrap()
        .expect("link issued");
    assert!(link.starts_with(&format!("{}-confirm?token=", RESET_URL_BASE)));
}

#[tokio::test]
async fn email_delivery_retries_once_on_server_error() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;
    app.notifier.queue_failure(503);

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap();

    assert!(link.is_some());
    assert_eq!(app.notifier.sent_count(), 1);
}

#[tokio::test]
async fn email_delivery_gives_up_after_one_retry() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;
    app.notifier.queue_failure(503);
    app.notifier.queue_failure(503);

    let err = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Delivery(e) if e.status == 503));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;
    app.notifier.queue_failure(400);

    let err = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Delivery(e) if e.status == 400));
    assert_eq!(app.notifier.sent_count(), 0);
}

#[tokio::test]
async fn set_password_completes_the_reset() {
    let app = TestApp::new();
    let account = app.add_local_account("jsmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap()
        .unwrap();
    let token = token_from_link(&link);

    app.store.increment_retry_count("JSMITH").await.unwrap();

    app.credentials
        .set_password(token, "brand-new-secret")
        .await
        .unwrap();

    let updated = app
        .store
        .find_account_by_id(account.account_id)
        .await
        .unwrap()
        .unwrap();
    assert!(updated.password_hash.is_some());
    assert!(!updated.locked);
    assert!(updated.password_expiry.is_none());

    let retries = app.store.get_retry_count("JSMITH").await.unwrap().unwrap();
    assert_eq!(retries.count, 0);

    // Token is gone; a second attempt fails.
    let err = app
        .credentials
        .set_password(token, "another-secret")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::TokenInvalid));

    // Confirmation email followed the reset email.
    let sent = app.notifier.sent();
    assert_eq!(sent.last().unwrap().template_id, "password-changed");
    assert!(sent.iter().all(|n| n.channel == Channel::Email));
}

#[tokio::test]
async fn set_password_rejects_short_passwords() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap()
        .unwrap();

    let err = app
        .credentials
        .set_password(token_from_link(&link), "short")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn set_password_rejects_username_as_password() {
    let app = TestApp::new();
    app.add_local_account("longusername", Some("jo@example.com")).await;

    let link = app
        .credentials
        .request_reset("longusername", RESET_URL_BASE)
        .await
        .unwrap()
        .unwrap();

    let err = app
        .credentials
        .set_password(token_from_link(&link), "LongUserName")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}

#[tokio::test]
async fn set_password_rejects_disabled_account() {
    let app = TestApp::new();
    let mut account = app.add_local_account("jsmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .request_reset("jsmith", RESET_URL_BASE)
        .await
        .unwrap()
        .unwrap();

    account.enabled = false;
    app.store.update_account(&account).await.unwrap();

    let err = app
        .credentials
        .set_password(token_from_link(&link), "brand-new-secret")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Locked));
}

#[tokio::test]
async fn set_password_accepts_initial_password_token() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .create_initial_password_link("jsmith", RESET_URL_BASE)
        .await
        .unwrap();

    app.credentials
        .set_password(token_from_link(&link), "brand-new-secret")
        .await
        .unwrap();
}

#[tokio::test]
async fn initial_password_link_lives_seven_days() {
    let app = TestApp::new();
    app.add_local_account("jsmith", Some("jo@example.com")).await;

    let link = app
        .credentials
        .create_initial_password_link("jsmith", RESET_URL_BASE)
        .await
        .unwrap();

    let token = app
        .store
        .find_token(token_from_link(&link))
        .await
        .unwrap()
        .expect("token stored");
    assert_eq!(token.kind(), Some(TokenKind::InitialPassword));

    let remaining = token.expiry_utc - Utc::now();
    assert!(remaining > chrono::Duration::days(6));
    assert!(remaining <= chrono::Duration::days(7));
}
