use service_core::error::AppError;
use thiserror::Error;

use crate::services::notify::DeliveryError;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Store error: {0}")]
    Store(#[from] AppError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Account not found")]
    NotFound,

    #[error("Account is not eligible for a credential change")]
    Locked,

    #[error("Invalid token")]
    TokenInvalid,

    #[error("Token expired")]
    TokenExpired,

    #[error("Token does not belong to this account")]
    TokenMismatch,

    #[error("Account email does not match the token's account")]
    EmailMismatch,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Notification delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Store(e) => e,
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::NotFound => AppError::NotFound(anyhow::anyhow!("Account not found")),
            ServiceError::Locked => AppError::Forbidden(anyhow::anyhow!("Account locked")),
            ServiceError::TokenInvalid => AppError::BadRequest(anyhow::anyhow!("Invalid token")),
            ServiceError::TokenExpired => AppError::BadRequest(anyhow::anyhow!("Token expired")),
            ServiceError::TokenMismatch => {
                AppError::BadRequest(anyhow::anyhow!("Token mismatch"))
            }
            ServiceError::EmailMismatch => {
                AppError::BadRequest(anyhow::anyhow!("Email mismatch"))
            }
            ServiceError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            ServiceError::Delivery(e) => AppError::DeliveryError(e.to_string()),
        }
    }
}
