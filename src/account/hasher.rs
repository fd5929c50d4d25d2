//! Salted HMAC-SHA-512 password hashing.
//!
//! The per-account salt is the HMAC key itself: `digest = HMAC-SHA-512(salt, password)`.
//! Verification recomputes the digest and compares it in fixed time.

use hmac::{Hmac, Mac};
use rand::{rngs::OsRng, RngCore};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Salt length in bytes, one SHA-512 block.
pub const SALT_LEN: usize = 128;

/// Digest length in bytes.
pub const DIGEST_LEN: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("malformed credential input: {0}")]
    MalformedInput(&'static str),
    #[error("failed to generate salt")]
    Entropy(#[from] rand::Error),
}

/// Hash a password under a freshly generated salt.
///
/// Returns `(digest, salt)`.
///
/// # Errors
/// Returns `HashError::Entropy` if the OS random number generator fails.
pub fn hash(password: &str) -> Result<(Vec<u8>, Vec<u8>), HashError> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.try_fill_bytes(&mut salt)?;

    let digest = keyed(&salt, password)?.finalize().into_bytes().to_vec();

    Ok((digest, salt))
}

/// Check a password against a stored digest and salt.
///
/// A digest of the wrong length is a mismatch, not an error.
///
/// # Errors
/// Returns `HashError::MalformedInput` when the salt or digest is empty.
pub fn verify(password: &str, digest: &[u8], salt: &[u8]) -> Result<bool, HashError> {
    if salt.is_empty() {
        return Err(HashError::MalformedInput("missing salt"));
    }

    if digest.is_empty() {
        return Err(HashError::MalformedInput("empty digest"));
    }

    // verify_slice is constant time and rejects length mismatches
    Ok(keyed(salt, password)?.verify_slice(digest).is_ok())
}

fn keyed(salt: &[u8], password: &str) -> Result<HmacSha512, HashError> {
    let mut mac = HmacSha512::new_from_slice(salt)
        .map_err(|_| HashError::MalformedInput("invalid salt"))?;
    mac.update(password.as_bytes());
    Ok(mac)
}
