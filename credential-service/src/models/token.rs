//! One-time token model and per-kind expiry policy.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Token kinds. Expiry duration is determined solely by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Reset,
    EmailVerify,
    MobileVerify,
    ChangePassword,
    Mfa,
    MfaCode,
    InitialPassword,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Reset => "reset",
            TokenKind::EmailVerify => "email_verify",
            TokenKind::MobileVerify => "mobile_verify",
            TokenKind::ChangePassword => "change_password",
            TokenKind::Mfa => "mfa",
            TokenKind::MfaCode => "mfa_code",
            TokenKind::InitialPassword => "initial_password",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "reset" => Some(TokenKind::Reset),
            "email_verify" => Some(TokenKind::EmailVerify),
            "mobile_verify" => Some(TokenKind::MobileVerify),
            "change_password" => Some(TokenKind::ChangePassword),
            "mfa" => Some(TokenKind::Mfa),
            "mfa_code" => Some(TokenKind::MfaCode),
            "initial_password" => Some(TokenKind::InitialPassword),
            _ => None,
        }
    }

    /// Expiry duration at issue time. Initial-password tokens start at the
    /// default and are extended to 7 days by the lifecycle service.
    pub fn expiry_duration(&self) -> Duration {
        match self {
            TokenKind::ChangePassword | TokenKind::Mfa => Duration::minutes(20),
            _ => Duration::days(1),
        }
    }

    /// Short numeric codes are delivered over SMS (or read out inline);
    /// everything else is a high-entropy opaque value.
    pub fn is_numeric_code(&self) -> bool {
        matches!(self, TokenKind::MobileVerify | TokenKind::MfaCode)
    }

    pub const ALL: [TokenKind; 7] = [
        TokenKind::Reset,
        TokenKind::EmailVerify,
        TokenKind::MobileVerify,
        TokenKind::ChangePassword,
        TokenKind::Mfa,
        TokenKind::MfaCode,
        TokenKind::InitialPassword,
    ];
}

/// A single-use token. Consumed (deleted) exactly once on successful use.
#[derive(Debug, Clone, FromRow)]
pub struct Token {
    pub token: String,
    pub kind_code: String,
    pub account_id: Uuid,
    pub expiry_utc: DateTime<Utc>,
    pub created_utc: DateTime<Utc>,
}

impl Token {
    pub fn new(value: String, kind: TokenKind, account_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            token: value,
            kind_code: kind.as_str().to_string(),
            account_id,
            expiry_utc: now + kind.expiry_duration(),
            created_utc: now,
        }
    }

    pub fn kind(&self) -> Option<TokenKind> {
        TokenKind::from_code(&self.kind_code)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry_utc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_policy_by_kind() {
        assert_eq!(
            TokenKind::ChangePassword.expiry_duration(),
            Duration::minutes(20)
        );
        assert_eq!(TokenKind::Mfa.expiry_duration(), Duration::minutes(20));
        assert_eq!(TokenKind::Reset.expiry_duration(), Duration::days(1));
        assert_eq!(TokenKind::MobileVerify.expiry_duration(), Duration::days(1));
    }

    #[test]
    fn kind_codes_round_trip() {
        for kind in TokenKind::ALL {
            assert_eq!(TokenKind::from_code(kind.as_str()), Some(kind));
        }
        assert_eq!(TokenKind::from_code("bogus"), None);
    }

    #[test]
    fn fresh_token_is_not_expired() {
        let token = Token::new("abc".to_string(), TokenKind::Reset, Uuid::new_v4());
        assert!(!token.is_expired());
        assert_eq!(token.kind(), Some(TokenKind::Reset));
    }
}
