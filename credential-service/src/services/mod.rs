//! Services layer for the credential service.

mod credential;
pub mod error;
pub mod notify;
pub mod resolver;
mod tokens;

pub use credential::{ConfirmEmailOutcome, ConfirmMobileOutcome, CredentialService};
pub use error::ServiceError;
pub use notify::{DeliveryError, MockNotifier, Notifier, NotifyClient};
pub use resolver::{EmailResolution, IdentityResolver, Resolution};
pub use tokens::TokenManager;
