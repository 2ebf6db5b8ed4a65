//! PKCE (Proof Key for Code Exchange) implementation per RFC 7636
//!
//! Generates the code verifier and S256 challenge used during the
//! authorization flow. The verifier stays with the participant's browser
//! session until the callback redeems it; the challenge goes to Spotify in
//! the authorize URL so the token endpoint can check that the party
//! redeeming the code is the one that started the flow.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

use crate::constants::{STATE_LENGTH, VERIFIER_LENGTH};
use crate::error::{Error, Result};

/// Characters verifiers and state are drawn from. A strict subset of the
/// RFC 7636 unreserved set (`-._~` are left out), which keeps both values
/// safe to embed in a cookie without escaping.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Shortest verifier RFC 7636 permits
pub const MIN_VERIFIER_LENGTH: usize = 43;

/// Longest verifier RFC 7636 permits
pub const MAX_VERIFIER_LENGTH: usize = 128;

/// A verifier and the challenge derived from it.
#[derive(Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    /// Generate a fresh pair with a [`VERIFIER_LENGTH`]-character verifier.
    pub fn generate() -> Self {
        let verifier = random_alphanumeric(VERIFIER_LENGTH);
        let challenge = compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
        }
    }
}

impl std::fmt::Debug for PkcePair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkcePair")
            .field("verifier", &"[REDACTED]")
            .field("challenge", &self.challenge)
            .finish()
    }
}

/// Generate a PKCE code verifier of exactly `length` characters.
///
/// Each character is drawn uniformly from `[A-Za-z0-9]` using the thread-local
/// CSPRNG. Lengths outside 43..=128 are rejected with
/// [`Error::InvalidVerifierLength`].
pub fn generate_verifier(length: usize) -> Result<String> {
    if !(MIN_VERIFIER_LENGTH..=MAX_VERIFIER_LENGTH).contains(&length) {
        return Err(Error::InvalidVerifierLength(length));
    }
    Ok(random_alphanumeric(length))
}

/// Generate an anti-CSRF state value.
///
/// State is opaque to the provider and not subject to the verifier length
/// rules. It shares the alphabet only so it can live in the same cookie.
pub fn generate_state() -> String {
    random_alphanumeric(STATE_LENGTH)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`, padding stripped.
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}

/// Whether `value` could have come out of this module's generators.
pub(crate) fn is_alphanumeric_token(value: &str) -> bool {
    !value.is_empty() && value.bytes().all(|b| b.is_ascii_alphanumeric())
}

fn random_alphanumeric(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| char::from(ALPHABET[rng.random_range(0..ALPHABET.len())]))
        .collect()
}
