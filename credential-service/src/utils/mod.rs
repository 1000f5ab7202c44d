mod password;
mod validation;

pub use password::{hash_password, Password, PasswordHashString};
pub use validation::{is_valid_uk_mobile, strip_whitespace, ValidatedJson};
