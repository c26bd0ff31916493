//! Secret generation for API keys
//!
//! Generates cryptographically secure secrets with hashing. The stored
//! record keeps only the hash and a short display prefix; the plaintext
//! secret exists exactly once, in the generation result.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of leading characters of the random portion kept for display
const DISPLAY_PREFIX_CHARS: usize = 8;

/// Result of generating a new secret
#[derive(Debug, Clone)]
pub struct GeneratedSecret {
    /// The full plaintext secret (only surfaced once, at creation/rotation)
    pub secret: String,
    /// The display prefix used for identification and auth lookup
    pub prefix: String,
    /// The hashed secret for storage
    pub hash: String,
}

/// Generator for API key secrets
#[derive(Debug, Clone)]
pub struct SecretGenerator {
    /// Type prefix prepended to every secret (e.g. "pa_live_", "pa_test_")
    type_prefix: String,
    /// Number of random bytes per secret
    secret_bytes: usize,
}

impl SecretGenerator {
    /// Create a generator with a custom type prefix
    pub fn new(type_prefix: impl Into<String>) -> Self {
        Self {
            type_prefix: type_prefix.into(),
            secret_bytes: 32,
        }
    }

    /// Generator for production keys
    pub fn live() -> Self {
        Self::new("pa_live_")
    }

    /// Generator for test keys
    pub fn test() -> Self {
        Self::new("pa_test_")
    }

    /// Generate a fresh secret
    pub fn generate(&self) -> GeneratedSecret {
        let mut random_bytes = vec![0u8; self.secret_bytes];
        rand::thread_rng().fill_bytes(&mut random_bytes);

        let encoded = URL_SAFE_NO_PAD.encode(&random_bytes);
        self.assemble(&encoded)
    }

    /// Build a secret from known material (deterministic keys for bootstrap
    /// and integration testing)
    pub fn from_material(&self, material: &str) -> GeneratedSecret {
        self.assemble(material)
    }

    fn assemble(&self, material: &str) -> GeneratedSecret {
        let secret = format!("{}{}", self.type_prefix, material);
        let prefix = format!(
            "{}{}",
            self.type_prefix,
            &material[..DISPLAY_PREFIX_CHARS.min(material.len())]
        );
        let hash = self.hash_secret(&secret);

        GeneratedSecret {
            secret,
            prefix,
            hash,
        }
    }

    /// Hash a secret for storage
    pub fn hash_secret(&self, secret: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        format!("sha256${}", URL_SAFE_NO_PAD.encode(digest))
    }

    /// Verify a plaintext secret against a stored hash
    pub fn verify_secret(&self, secret: &str, stored_hash: &str) -> bool {
        let computed = self.hash_secret(secret);
        constant_time_compare(&computed, stored_hash)
    }

    /// Extract the display prefix from a full secret: everything up to and
    /// including the second underscore, plus the first random characters
    pub fn extract_prefix(secret: &str) -> Option<&str> {
        let first = secret.find('_')?;
        let second = secret[first + 1..].find('_')?;
        let type_prefix_end = first + 1 + second + 1;

        if type_prefix_end >= secret.len() {
            return None;
        }

        let prefix_end = (type_prefix_end + DISPLAY_PREFIX_CHARS).min(secret.len());
        Some(&secret[..prefix_end])
    }
}

impl Default for SecretGenerator {
    fn default() -> Self {
        Self::live()
    }
}

/// Constant-time string comparison to prevent timing attacks
fn constant_time_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;

    for (x, y) in a.bytes().zip(b.bytes()) {
        result |= x ^ y;
    }

    result == 0
}
