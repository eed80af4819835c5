use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use rand_core::OsRng;

use crate::errors::{AppError, AppResult};

const MIN_PASSWORD_LENGTH: usize = 8;

/// Validate and hash a plaintext password with argon2id.
pub fn hash_password(password: &str) -> AppResult<String> {
    validate_password(password)?;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| AppError::internal(format!("password hashing failed: {err}")))?;

    Ok(hash.to_string())
}

/// Check a plaintext password against a stored argon2 hash. A malformed
/// stored hash is an internal error, not a failed login.
pub fn verify_password(password: &str, stored_hash: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|err| AppError::internal(format!("stored password hash is invalid: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

/// Single timestamp source for handlers; created/updated pairs written in one
/// request share one instant.
pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}
