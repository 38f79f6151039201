//! Salted PBKDF2-HMAC-SHA256 password hashing.
//!
//! The salt is 32 random bytes rendered as 64 hex characters; the key
//! derivation runs over the UTF-8 bytes of the password and of that hex salt
//! string, and the derived key is stored hex encoded next to it.

use anyhow::{Context, Result};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;

pub const PBKDF2_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 32;
const KEY_LEN: usize = 32;

/// Verified against when login finds no usable record, so an unknown email
/// costs the same key derivation as a wrong password. Matches no password
/// anyone is expected to know; the result is discarded regardless.
pub const DECOY_SALT_HEX: &str = "86c9f1d1d50a93d6e46ae855ff5b50050b49ee518fc542262afba51cad03e077";
pub const DECOY_HASH_HEX: &str = "ba668209068492eb2f10a82bd87beb84bae947a3e2739758b5c39fbd98cf6b1c";

/// Stored credential material. Both fields are lowercase hex.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash_hex: String,
    pub salt_hex: String,
}

/// Derive a hash for a new password with a fresh random salt.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn hash_password(password: &str) -> Result<PasswordHash> {
    let mut salt = [0u8; SALT_LEN];
    OsRng
        .try_fill_bytes(&mut salt)
        .context("failed to generate password salt")?;
    let salt_hex = hex::encode(salt);

    Ok(PasswordHash {
        hash_hex: hex::encode(derive(password, &salt_hex)),
        salt_hex,
    })
}

/// Recompute with the stored salt and compare in full.
///
/// Malformed input (empty or non-hex salt, hash of the wrong length) never
/// verifies.
#[must_use]
pub fn verify_password(password: &str, hash_hex: &str, salt_hex: &str) -> bool {
    if salt_hex.is_empty() || hex::decode(salt_hex).is_err() {
        return false;
    }
    let Ok(expected) = hex::decode(hash_hex) else {
        return false;
    };
    if expected.len() != KEY_LEN {
        return false;
    }

    constant_time_eq(&derive(password, salt_hex), &expected)
}

fn derive(password: &str, salt_hex: &str) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt_hex.as_bytes(), PBKDF2_ROUNDS, &mut key);
    key
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }

    diff == 0
}
