//! Domain models for the credential service.

mod account;
mod external;
mod retry_count;
mod token;

pub use account::{Account, AuthSource, ContactMethod, ContactType, MfaPreference};
pub use external::{ExternalAccount, LockReason};
pub use retry_count::RetryCount;
pub use token::{Token, TokenKind};
