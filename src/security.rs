use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::distributions::{Alphanumeric, Uniform};
use rand::Rng;

use crate::error::{AppError, Result};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Opaque token for sessions, email confirmations and password resets.
pub fn random_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

pub fn numeric_code(len: usize) -> String {
    let digits = Uniform::from(0..10u8);
    rand::thread_rng()
        .sample_iter(digits)
        .take(len)
        .map(|d| char::from(b'0' + d))
        .collect()
}

/// Upper-case alphanumeric code for check-in desks.
pub fn checkin_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(|b| char::from(b).to_ascii_uppercase())
        .collect()
}
