//! One-way password storage as argon2id PHC strings.

use anyhow::anyhow;
use argon2::{
    password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tracing::error;

fn argon2() -> Argon2<'static> {
    Argon2::default()
}

/// Hashes `plain` with a fresh random salt.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2()
        .hash_password(plain.as_bytes(), &salt)
        .map(|phc| phc.to_string())
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow!("hash password: {e}")
        })
}

/// `Ok(false)` on a mismatch. Errors only when the stored hash cannot be
/// read or checked at all.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash is malformed");
        anyhow!("parse stored password hash: {e}")
    })?;
    match argon2().verify_password(plain.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow!("verify password: {e}")),
    }
}
