use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};

/// Newtype for a raw password to prevent accidental logging.
#[derive(Clone)]
pub struct Password(String);

impl Password {
    pub fn new(password: String) -> Self {
        Self(password)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Password(***)")
    }
}

/// Newtype for an encoded password hash.
#[derive(Debug, Clone)]
pub struct PasswordHashString(String);

impl PasswordHashString {
    pub fn new(hash: String) -> Self {
        Self(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &Password) -> Result<PasswordHashString, anyhow::Error> {
    let argon2 = Argon2::default();
    let salt = SaltString::generate(&mut OsRng);

    let password_hash = argon2
        .hash_password(password.as_str().as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
        .to_string();

    Ok(PasswordHashString::new(password_hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use argon2::password_hash::{PasswordHash, PasswordVerifier};

    #[test]
    fn hashed_password_verifies_against_original() {
        let password = Password::new("correct horse battery".to_string());
        let hash = hash_password(&password).expect("Failed to hash password");

        let parsed = PasswordHash::new(hash.as_str()).expect("Argon2 PHC string");
        Argon2::default()
            .verify_password(password.as_str().as_bytes(), &parsed)
            .expect("Password should verify");
    }

    #[test]
    fn wrong_password_fails_verification() {
        let hash = hash_password(&Password::new("one".to_string())).unwrap();
        let parsed = PasswordHash::new(hash.as_str()).unwrap();
        assert!(Argon2::default()
            .verify_password("two".as_bytes(), &parsed)
            .is_err());
    }

    #[test]
    fn debug_does_not_leak_password() {
        let password = Password::new("secret".to_string());
        assert_eq!(format!("{:?}", password), "Password(***)");
    }
}
