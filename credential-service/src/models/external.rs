//! External directory account shape, as exposed by the read-only adapters.

use serde::{Deserialize, Serialize};

/// Why an external account is locked. A failed-login lock is recoverable
/// through the reset flow; any other lock is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    FailedLogin,
    Administrative,
}

/// Account record returned by an external directory lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalAccount {
    pub username: String,
    pub active: bool,
    pub locked: bool,
    pub lock_reason: Option<LockReason>,
    pub first_name: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl ExternalAccount {
    /// Reset-eligibility predicate: active staff, and either not locked or
    /// locked only because of failed logins.
    pub fn reset_allowed(&self) -> bool {
        self.active && (!self.locked || self.lock_reason == Some(LockReason::FailedLogin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staff(active: bool, locked: bool, reason: Option<LockReason>) -> ExternalAccount {
        ExternalAccount {
            username: "JSMITH".to_string(),
            active,
            locked,
            lock_reason: reason,
            first_name: Some("Jo".to_string()),
            name: Some("Jo Smith".to_string()),
            email: Some("jo.smith@example.gov.uk".to_string()),
        }
    }

    #[test]
    fn active_unlocked_is_eligible() {
        assert!(staff(true, false, None).reset_allowed());
    }

    #[test]
    fn failed_login_lock_is_recoverable() {
        assert!(staff(true, true, Some(LockReason::FailedLogin)).reset_allowed());
    }

    #[test]
    fn administrative_lock_is_not_recoverable() {
        assert!(!staff(true, true, Some(LockReason::Administrative)).reset_allowed());
    }

    #[test]
    fn inactive_staff_is_not_eligible() {
        assert!(!staff(false, false, None).reset_allowed());
    }
}
