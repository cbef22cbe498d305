//! Argon2id password hashing and the account password policy.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::error::{AppError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 12;

pub const PASSWORD_RULES: &str = "Password must be at least 12 characters and contain a lowercase letter, an uppercase letter, a digit and a symbol";

/// At least [`MIN_PASSWORD_LENGTH`] characters with a lowercase letter, an
/// uppercase letter, a digit and a non-alphanumeric character.
pub fn meets_policy(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| !c.is_ascii_alphanumeric())
}

pub fn validate_password(password: &str) -> Result<()> {
    if meets_policy(password) {
        Ok(())
    } else {
        Err(AppError::Validation(PASSWORD_RULES.to_string()))
    }
}

/// Hashes with a random salt. `cost` is the Argon2 time cost; memory and
/// parallelism stay at the library defaults.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    let params = Params::new(
        Params::DEFAULT_M_COST,
        cost.max(1),
        Params::DEFAULT_P_COST,
        None,
    )
    .map_err(|e| AppError::Internal(format!("Invalid password hash parameters: {e}")))?;
    let salt = SaltString::generate(&mut OsRng);
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

/// Parameters are read back from the stored PHC string.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AppError::Internal(format!("Password verification failed: {e}"))),
    }
}
