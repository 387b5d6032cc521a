//! Shared foundation for the WhatsBox file-sharing server: configuration,
//! the application error taxonomy, the process-wide stats collector, and
//! small utilities (short ids, filename sanitizing, content hashing).

pub mod config;
pub mod error;
pub mod filename;
pub mod ids;
pub mod stats;

pub use config::Config;
pub use error::AppError;

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of the plaintext file contents. Stored for
/// bookkeeping and duplicate lookup; the upstream handle carries its own
/// ciphertext hashes.
pub fn hash_file(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Raw SHA-256 digest of the plaintext, as the upstream expects it.
pub fn sha256_bytes(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_file_is_hex_sha256() {
        // SHA-256("hello")
        assert_eq!(
            hash_file(b"hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn sha256_bytes_matches_hex_form() {
        let raw = sha256_bytes(b"hello");
        assert_eq!(hex::encode(raw), hash_file(b"hello"));
    }
}
