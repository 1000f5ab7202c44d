pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod providers;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod utils;

use std::sync::Arc;

use service_core::axum::{
    routing::{get, post},
    Router,
};
use service_core::axum::http::Method;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::CredentialConfig;
use crate::services::CredentialService;
use crate::store::IdentityStore;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::search_accounts,
        handlers::request_reset,
        handlers::set_password,
        handlers::select_account,
        handlers::request_email_verification,
        handlers::confirm_email,
        handlers::request_mobile_verification,
        handlers::confirm_mobile,
    ),
    components(
        schemas(
            dtos::AccountSummary,
            dtos::ErrorResponse,
            dtos::MessageResponse,
            dtos::ResetRequest,
            dtos::ResetResponse,
            dtos::SetPasswordRequest,
            dtos::SelectAccountRequest,
            dtos::SelectAccountResponse,
            dtos::EmailVerificationRequest,
            dtos::VerifyLinkResponse,
            dtos::ConfirmEmailResponse,
            dtos::MobileVerificationRequest,
            dtos::VerifyCodeResponse,
            dtos::ConfirmMobileRequest,
            dtos::ConfirmMobileResponse,
        )
    ),
    tags(
        (name = "Accounts", description = "Account lookup"),
        (name = "Password Reset", description = "Password reset and token selection"),
        (name = "Verification", description = "Email and mobile verification"),
        (name = "Observability", description = "Service health")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: CredentialConfig,
    pub store: Arc<dyn IdentityStore>,
    pub credentials: Arc<CredentialService>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(handlers::health))
        .route("/accounts/search", get(handlers::search_accounts))
        .route("/reset/request", post(handlers::request_reset))
        .route("/reset/set-password", post(handlers::set_password))
        .route("/reset/select-account", post(handlers::select_account))
        .route(
            "/verify/email/request",
            post(handlers::request_email_verification),
        )
        .route("/verify/email/confirm", get(handlers::confirm_email))
        .route(
            "/verify/mobile/request",
            post(handlers::request_mobile_verification),
        )
        .route("/verify/mobile/confirm", post(handlers::confirm_mobile))
        // Reset and verification links are opened from arbitrary mail
        // clients and portals.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
