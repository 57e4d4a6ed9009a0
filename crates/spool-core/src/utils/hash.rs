//! Tarball digests for registry documents.
//!
//! Published versions carry a legacy SHA-1 `shasum` and an SRI `integrity`
//! string (`sha512-<base64>`) in their `dist` block.

use base64::{engine::general_purpose, Engine as _};
use sha1::Sha1;
use sha2::{Digest, Sha512};

/// Hex-encoded SHA-1 of data
pub fn sha1_hex(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Subresource integrity string using SHA-512
pub fn sha512_integrity(data: &[u8]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(data);
    format!("sha512-{}", general_purpose::STANDARD.encode(hasher.finalize()))
}

/// Standard base64 encoding, as used for document attachments
pub fn encode_base64(data: &[u8]) -> String {
    general_purpose::STANDARD.encode(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_hex() {
        // Well-known digest of "hello world"
        assert_eq!(
            sha1_hex(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn test_sha512_integrity_shape() {
        let integrity = sha512_integrity(b"tarball bytes");
        assert!(integrity.starts_with("sha512-"));
        // 64 digest bytes encode to 88 base64 characters
        assert_eq!(integrity.len(), "sha512-".len() + 88);
    }

    #[test]
    fn test_encode_base64() {
        assert_eq!(encode_base64(b"spool"), "c3Bvb2w=");
    }
}
