//! HTTP handlers - thin plumbing over the credential lifecycle service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    AccountSearchQuery, AccountSummary, ConfirmEmailResponse, ConfirmMobileRequest,
    ConfirmMobileResponse, ConfirmTokenQuery, EmailVerificationRequest,
    MessageResponse, MobileVerificationRequest, ResetRequest,
    ResetResponse, SelectAccountRequest, SelectAccountResponse, SetPasswordRequest,
    VerifyCodeResponse, VerifyLinkResponse,
};
use crate::services::{ConfirmEmailOutcome, ConfirmMobileOutcome, ServiceError};
use crate::utils::ValidatedJson;
use crate::AppState;

/// Short reason word for token-holder failures, rendered to the caller.
fn token_reason(err: &ServiceError) -> Option<&'static str> {
    match err {
        ServiceError::TokenInvalid => Some("invalid"),
        ServiceError::TokenExpired => Some("expired"),
        ServiceError::TokenMismatch => Some("tokenMismatch"),
        ServiceError::EmailMismatch => Some("email"),
        ServiceError::NotFound => Some("notfound"),
        _ => None,
    }
}

fn token_error(err: ServiceError) -> AppError {
    match token_reason(&err) {
        Some(reason) => AppError::BadRequest(anyhow::anyhow!(reason)),
        None => err.into(),
    }
}

/// Service health
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service healthy"),
        (status = 500, description = "Store unreachable", body = crate::dtos::ErrorResponse)
    ),
    tag = "Observability"
)]
pub async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    state.store.health_check().await?;
    Ok((StatusCode::OK, Json(MessageResponse {
        message: "ok".to_string(),
    })))
}

/// Search accounts by email, username, or name
#[utoipa::path(
    get,
    path = "/accounts/search",
    params(AccountSearchQuery),
    responses(
        (status = 200, description = "Matching accounts, possibly empty", body = [AccountSummary])
    ),
    tag = "Accounts"
)]
pub async fn search_accounts(
    State(state): State<AppState>,
    Query(query): Query<AccountSearchQuery>,
) -> Result<impl IntoResponse, AppError> {
    let accounts = state.credentials.search_accounts(&query.query).await?;
    let summaries: Vec<AccountSummary> =
        accounts.into_iter().map(AccountSummary::from).collect();
    Ok((StatusCode::OK, Json(summaries)))
}

/// Request a password reset link by username or email
#[utoipa::path(
    post,
    path = "/reset/request",
    request_body = ResetRequest,
    responses(
        (status = 200, description = "Request accepted", body = ResetResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Delivery failure", body = crate::dtos::ErrorResponse)
    ),
    tag = "Password Reset"
)]
pub async fn request_reset(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ResetRequest>,
) -> Result<impl IntoResponse, AppError> {
    let reset_link = state
        .credentials
        .request_reset(&req.user, &state.config.reset_url_base)
        .await?;

    Ok((
        StatusCode::OK,
        Json(ResetResponse {
            reset_link,
            message: "If the account exists, a reset link has been sent.".to_string(),
        }),
    ))
}

/// Set a new password with a reset token
#[utoipa::path(
    post,
    path = "/reset/set-password",
    request_body = SetPasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Invalid or expired token", body = crate::dtos::ErrorResponse),
        (status = 403, description = "Account not eligible", body = crate::dtos::ErrorResponse)
    ),
    tag = "Password Reset"
)]
pub async fn set_password(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SetPasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    state
        .credentials
        .set_password(&req.token, &req.new_password)
        .await
        .map_err(token_error)?;

    Ok((
        StatusCode::OK,
        Json(MessageResponse {
            message: "Password changed".to_string(),
        }),
    ))
}

/// Re-home an ambiguous reset token onto the selected account
#[utoipa::path(
    post,
    path = "/reset/select-account",
    request_body = SelectAccountRequest,
    responses(
        (status = 200, description = "Token moved", body = SelectAccountResponse),
        (status = 400, description = "Invalid token or mismatched email", body = crate::dtos::ErrorResponse)
    ),
    tag = "Password Reset"
)]
pub async fn select_account(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<SelectAccountRequest>,
) -> Result<impl IntoResponse, AppError> {
    let token = state
        .credentials
        .move_token_to_account(&req.token, &req.username)
        .await
        .map_err(token_error)?;

    Ok((StatusCode::OK, Json(SelectAccountResponse { token })))
}

/// Start email verification for an account
#[utoipa::path(
    post,
    path = "/verify/email/request",
    request_body = EmailVerificationRequest,
    responses(
        (status = 200, description = "Verification email sent", body = VerifyLinkResponse),
        (status = 404, description = "No such account", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Validation error", body = crate::dtos::ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn request_email_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<EmailVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let verify_link = state
        .credentials
        .request_email_verification(&req.username, &req.email, &state.config.verify_url_base)
        .await?;

    Ok((StatusCode::OK, Json(VerifyLinkResponse { verify_link })))
}

/// Confirm an email address from the emailed link
#[utoipa::path(
    get,
    path = "/verify/email/confirm",
    params(ConfirmTokenQuery),
    responses(
        (status = 200, description = "Email verified", body = ConfirmEmailResponse),
        (status = 400, description = "Invalid, mismatched, or expired token", body = crate::dtos::ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn confirm_email(
    State(state): State<AppState>,
    Query(query): Query<ConfirmTokenQuery>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .credentials
        .confirm_email(&query.token)
        .await
        .map_err(token_error)?;

    let outcome = match outcome {
        ConfirmEmailOutcome::Success => "success",
        ConfirmEmailOutcome::AlreadyVerified => "alreadyverified",
    };

    Ok((
        StatusCode::OK,
        Json(ConfirmEmailResponse {
            outcome: outcome.to_string(),
        }),
    ))
}

/// Start mobile verification for an account
#[utoipa::path(
    post,
    path = "/verify/mobile/request",
    request_body = MobileVerificationRequest,
    responses(
        (status = 200, description = "Verification code sent", body = VerifyCodeResponse),
        (status = 400, description = "Malformed mobile number", body = crate::dtos::ErrorResponse),
        (status = 404, description = "No such account", body = crate::dtos::ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn request_mobile_verification(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<MobileVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    let verify_code = state
        .credentials
        .request_mobile_verification(&req.username, &req.mobile)
        .await?;

    Ok((StatusCode::OK, Json(VerifyCodeResponse { verify_code })))
}

/// Confirm a mobile number from its SMS code
#[utoipa::path(
    post,
    path = "/verify/mobile/confirm",
    request_body = ConfirmMobileRequest,
    responses(
        (status = 200, description = "Verified, or a fresh code when expired", body = ConfirmMobileResponse),
        (status = 400, description = "Invalid code", body = crate::dtos::ErrorResponse)
    ),
    tag = "Verification"
)]
pub async fn confirm_mobile(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ConfirmMobileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = state
        .credentials
        .confirm_mobile(&req.code)
        .await
        .map_err(token_error)?;

    let response = match outcome {
        ConfirmMobileOutcome::Verified => ConfirmMobileResponse {
            outcome: "verified".to_string(),
            verify_code: None,
        },
        ConfirmMobileOutcome::Expired { verify_code } => ConfirmMobileResponse {
            outcome: "expired".to_string(),
            verify_code: Some(verify_code),
        },
    };

    Ok((StatusCode::OK, Json(response)))
}
