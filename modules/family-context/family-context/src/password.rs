//! Password hashing using Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$...`), so the salt and the
//! parameters travel with the hash.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::debug;

pub const MIN_PASSWORD_LEN: usize = 8;

/// Hash `password` with a fresh random salt.
///
/// # Errors
/// Returns the hasher error if Argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

/// Verify `password` against a PHC hash. Malformed hashes never match.
#[must_use]
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!(error = %e, "Stored password hash is malformed");
            return false;
        }
    };
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => true,
        Err(argon2::password_hash::Error::Password) => false,
        Err(e) => {
            debug!(error = %e, "Password verification failed");
            false
        }
    }
}

/// Rules `password` breaks; empty when it is strong enough.
#[must_use]
pub fn validate_password_strength(password: &str) -> Vec<&'static str> {
    let mut errors = Vec::new();
    if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push("Password must be at least 8 characters");
    }
    if !password.chars().any(char::is_uppercase) {
        errors.push("Password must contain an uppercase letter");
    }
    if !password.chars().any(char::is_lowercase) {
        errors.push("Password must contain a lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain a number");
    }
    if password.chars().all(char::is_alphanumeric) {
        errors.push("Password must contain a special character");
    }
    errors
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("Hunter2!x").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("Hunter2!x", &hash));
        assert!(!verify_password("hunter2!x", &hash));
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        assert_ne!(hash_password("pw").unwrap(), hash_password("pw").unwrap());
    }

    #[test]
    fn malformed_hash_does_not_verify() {
        assert!(!verify_password("pw", "not-a-hash"));
        assert!(!verify_password("pw", ""));
    }

    #[test]
    fn strength_rules() {
        assert!(validate_password_strength("Str0ng!pass").is_empty());

        let weak = validate_password_strength("abc");
        assert_eq!(weak.len(), 4);
        assert!(weak.contains(&"Password must be at least 8 characters"));
        assert!(!weak.contains(&"Password must contain a lowercase letter"));

        assert_eq!(
            validate_password_strength("Abcdefg1"),
            vec!["Password must contain a special character"]
        );
    }
}
