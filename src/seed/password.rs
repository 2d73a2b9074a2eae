//! Credentials for seeded users
//!
//! Plaintext passwords from a seed file are never written to the store.
//! Each becomes an Argon2id PHC string with its own random salt.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::types::{RepoInitError, Result};

fn hasher() -> Argon2<'static> {
    Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default())
}

/// Hash the seed password of `userid` for the `passwords` collection
pub fn hash_seed_password(userid: &str, plain: &str) -> Result<String> {
    if plain.trim().is_empty() {
        return Err(RepoInitError::Seed(format!(
            "password for user '{}' is empty",
            userid
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    hasher()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| RepoInitError::Seed(format!("cannot hash password for user '{}': {}", userid, e)))
}

/// Check `plain` against a stored `passwords` record value
pub fn verify_password(plain: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| RepoInitError::Seed(format!("stored password is not a PHC hash: {}", e)))?;
    Ok(hasher().verify_password(plain.as_bytes(), &parsed).is_ok())
}
