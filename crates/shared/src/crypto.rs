//! Cryptographic utilities for check-in token generation and comparison.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use sha2::{Digest, Sha256};

/// Check-in token prefix.
pub const CHECK_IN_TOKEN_PREFIX: &str = "chk_";

/// Length of random bytes for token generation.
const TOKEN_RANDOM_BYTES: usize = 24;

/// Computes SHA-256 hash of the input and returns it as a hex string.
pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Short, non-reversible identifier of a token, safe to log.
pub fn token_fingerprint(token: &str) -> String {
    sha256_hex(token)[..12].to_string()
}

/// Generate a new opaque URL-safe token with the given prefix.
pub fn generate_token(prefix: &str) -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: Vec<u8> = (0..TOKEN_RANDOM_BYTES).map(|_| rng.gen()).collect();
    format!("{}{}", prefix, URL_SAFE_NO_PAD.encode(&random_bytes))
}

/// Generate a new check-in token.
pub fn generate_check_in_token() -> String {
    generate_token(CHECK_IN_TOKEN_PREFIX)
}

/// Compare a presented token against the expected one.
///
/// Both sides are hashed first so the comparison always runs over 32 bytes
/// and does not short-circuit on the first differing byte.
pub fn tokens_match(presented: &str, expected: &str) -> bool {
    let a = Sha256::digest(presented.as_bytes());
    let b = Sha256::digest(expected.as_bytes());
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
