//! Room-lock password hashing.
//!
//! A room password is a local lock, not an account credential — there is
//! no external identity service that owns it (§6), so it is salted and
//! hashed here with SHA-256 rather than a memory-hard KDF. See DESIGN.md
//! for why this tradeoff was chosen over `argon2`/`bcrypt`.

use rand::RngCore;
use sha2::{Digest, Sha256};

const SALT_BYTES: usize = 16;

/// Hashes `password` under a freshly generated random salt and returns the
/// `"<salt-hex>:<hash-hex>"` string stored as `passwordHash`.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut salt);
    hash_with_salt(password, &salt)
}

/// Checks `password` against a previously stored `"<salt-hex>:<hash-hex>"`
/// string. Returns `false` (never errors) on a malformed stored value —
/// that can only happen from corrupted internal state, not client input.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once(':') else {
        return false;
    };
    let Ok(salt) = hex_decode(salt_hex) else {
        return false;
    };
    hash_with_salt(password, &salt) == format!("{salt_hex}:{hash_hex}")
}

fn hash_with_salt(password: &str, salt: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    format!("{}:{}", hex_encode(salt), hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}
