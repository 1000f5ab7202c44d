//! Request and response DTOs for the HTTP surface.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Reset request by username or email address.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetRequest {
    #[validate(length(min = 1, max = 240))]
    pub user: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ResetResponse {
    /// Present only when a reset link was actually issued; absent responses
    /// are indistinguishable between unknown and ineligible identities.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reset_link: Option<String>,
    pub message: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SetPasswordRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 8, max = 240))]
    pub new_password: String,
}

/// Select the target account for a reset issued against an ambiguous
/// email match.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SelectAccountRequest {
    #[validate(length(min = 1))]
    pub token: String,
    #[validate(length(min = 1, max = 240))]
    pub username: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SelectAccountResponse {
    /// Token value now in force for the selected account.
    pub token: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EmailVerificationRequest {
    #[validate(length(min = 1, max = 240))]
    pub username: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyLinkResponse {
    pub verify_link: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ConfirmTokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AccountSearchQuery {
    /// Email, username, or name ("first last" or "last, first").
    pub query: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AccountSummary {
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub source: String,
    pub verified: bool,
    pub enabled: bool,
}

impl From<crate::models::Account> for AccountSummary {
    fn from(account: crate::models::Account) -> Self {
        Self {
            username: account.username,
            email: account.email,
            first_name: account.first_name,
            last_name: account.last_name,
            source: account.source_code,
            verified: account.verified,
            enabled: account.enabled,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmEmailResponse {
    pub outcome: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct MobileVerificationRequest {
    #[validate(length(min = 1, max = 240))]
    pub username: String,
    #[validate(length(min = 1, max = 30))]
    pub mobile: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VerifyCodeResponse {
    pub verify_code: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ConfirmMobileRequest {
    #[validate(length(min = 1))]
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConfirmMobileResponse {
    pub outcome: String,
    /// Fresh code issued when the submitted one had expired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verify_code: Option<String>,
}
