//! Password hashing and salt generation.
//!
//! `hash(password, salt) = hex(SHA256(utf8(password) || utf8(salt)))`.
//! Client and server compute it the same way; only the hash and the salt
//! are ever stored.

use rand::distr::Alphanumeric;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Default salt length in characters
pub const DEFAULT_SALT_LENGTH: usize = 16;

/// Random alphanumeric salt of `length` characters.
pub fn generate_salt(length: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Lowercase hex SHA-256 of the password followed by the salt.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two hashes without an early exit on the first differing byte.
pub fn hashes_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
