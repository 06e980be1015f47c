//! API key generation and hashing.

use rand::Rng;
use rand::distr::Alphanumeric;
use sha2::{Digest, Sha256};

/// Prefix on every raw key handed out.
pub const KEY_PREFIX: &str = "sk_";

/// Generates a new raw API key: `sk_` followed by 32 alphanumerics.
pub fn generate_api_key() -> String {
    let raw: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect();
    format!("{}{}", KEY_PREFIX, raw)
}

/// Hashes an API key using SHA-256. Only the hash is ever stored.
pub fn hash_api_key(key: &str) -> String {
    let hash = Sha256::digest(key.as_bytes());
    hex::encode(hash)
}
