//! Password hashing.
//!
//! Current format: `pbkdf2$<iterations>$<base64 salt>$<base64 hash>` with
//! HMAC-SHA-256. Rows imported from the first deployment may instead hold
//! `"hash_" + base64(password)`; those still verify, and callers are
//! expected to re-hash on a successful legacy match.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

pub const PBKDF2_ITERATIONS: u32 = 120_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordMatch {
    Mismatch,
    Match,
    /// Matched via the legacy encoding; the stored hash should be upgraded.
    LegacyMatch,
}

pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);

    let mut derived = [0u8; HASH_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, PBKDF2_ITERATIONS, &mut derived);

    format!(
        "pbkdf2${}${}${}",
        PBKDF2_ITERATIONS,
        BASE64.encode(salt),
        BASE64.encode(derived)
    )
}

pub fn verify_password(password: &str, stored: &str) -> PasswordMatch {
    if let Some(rest) = stored.strip_prefix("pbkdf2$") {
        return verify_pbkdf2(password, rest);
    }

    let legacy = format!("hash_{}", BASE64.encode(password.as_bytes()));
    if legacy.as_bytes().ct_eq(stored.as_bytes()).into() {
        PasswordMatch::LegacyMatch
    } else {
        PasswordMatch::Mismatch
    }
}

fn verify_pbkdf2(password: &str, encoded: &str) -> PasswordMatch {
    let mut parts = encoded.split('$');
    let (Some(iterations), Some(salt), Some(hash), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return PasswordMatch::Mismatch;
    };

    let Ok(iterations) = iterations.parse::<u32>() else {
        return PasswordMatch::Mismatch;
    };
    let (Ok(salt), Ok(expected)) = (BASE64.decode(salt), BASE64.decode(hash)) else {
        return PasswordMatch::Mismatch;
    };
    if iterations == 0 || expected.is_empty() {
        return PasswordMatch::Mismatch;
    }

    let mut derived = vec![0u8; expected.len()];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut derived);

    if derived.ct_eq(&expected).into() {
        PasswordMatch::Match
    } else {
        PasswordMatch::Mismatch
    }
}
