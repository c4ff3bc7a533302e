//! Access-code hashing for confidential documents.
//!
//! Codes arrive as plaintext in the change-set and are hashed before
//! they reach the document row. Format: `sha256:{64-char-hex}`.

use sha2::{Digest, Sha256};

/// Hash a plaintext access code.
pub fn hash_access_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    format!("sha256:{}", hex::encode(digest))
}

/// Constant-shape check of a plaintext code against a stored hash.
pub fn verify_access_code(code: &str, stored_hash: &str) -> bool {
    hash_access_code(code) == stored_hash
}
