//! Cryptographic Utilities

use sha2::{Digest, Sha256};

/// Compute SHA-256 hash
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Constant-time comparison to prevent timing attacks
///
/// Only constant-time for equal-length inputs; length mismatch returns early.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Timing-safe equality for shared secrets
///
/// Both inputs are hashed to fixed-size digests first, so neither the
/// position of the first differing byte nor a length mismatch changes the
/// amount of work done in the comparison.
pub fn secrets_equal(provided: &str, expected: &str) -> bool {
    let provided = sha256(provided.as_bytes());
    let expected = sha256(expected.as_bytes());
    constant_time_eq(&provided, &expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_values() {
        // SHA-256 of empty string
        let hash = sha256(b"");
        let expected =
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);

        // SHA-256 of "hello"
        let hash = sha256(b"hello");
        let expected =
            hex::decode("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824")
                .unwrap();
        assert_eq!(hash.to_vec(), expected);
    }

    #[test]
    fn test_constant_time_eq() {
        let a = [1u8, 2, 3, 4];
        let b = [1u8, 2, 3, 4];
        let c = [1u8, 2, 3, 5];
        assert!(constant_time_eq(&a, &b));
        assert!(!constant_time_eq(&a, &c));
        assert!(!constant_time_eq(&a, &a[..3]));
    }

    #[test]
    fn test_secrets_equal_matches_string_equality() {
        let cases = [
            ("", ""),
            ("", "a"),
            ("a", ""),
            ("secret", "secret"),
            ("secret", "Secret"),
            ("secret", "secret "),
            ("short", "a-much-longer-value-than-short"),
        ];

        for (a, b) in cases {
            assert_eq!(secrets_equal(a, b), a == b, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_secrets_equal_long_secret() {
        let secret = "x".repeat(40);
        assert!(secrets_equal(&secret, &"x".repeat(40)));
        assert!(!secrets_equal(&secret, &"x".repeat(39)));
        assert!(!secrets_equal(&secret, &format!("{}y", "x".repeat(39))));
    }
}
