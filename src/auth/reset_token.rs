/// Password Reset and OTP Secrets
///
/// Reset tokens are:
/// - 32 cryptographically random bytes, hex encoded for the user
/// - Stored only as a SHA-256 hex digest (never the plaintext)
/// - Single use: the digest is cleared when the token is consumed

use rand::{thread_rng, Rng, RngCore};
use sha2::{Digest, Sha256};

const RESET_TOKEN_BYTES: usize = 32;

/// Generate a new password reset token (64 hex characters)
pub fn generate_reset_token() -> String {
    let mut bytes = [0u8; RESET_TOKEN_BYTES];
    thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One-way digest under which a reset token is stored and looked up
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Six-digit numeric code for mobile verification
pub fn generate_otp() -> String {
    thread_rng().gen_range(100_000..=999_999).to_string()
}
