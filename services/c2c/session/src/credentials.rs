//! Credential hashing and salted signatures for the handshakes.

use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Salt length in characters
pub const SALT_LEN: usize = 32;

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

fn sha256_b64(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// `base64(SHA256(user + pass))`
pub fn credential(user: &str, pass: &str) -> String {
    sha256_b64(&[user, pass])
}

/// `base64(SHA256(user + salt + credential))`
pub fn signature(user: &str, salt: &str, credential: &str) -> String {
    sha256_b64(&[user, salt, credential])
}

/// Fresh random salt of [`SALT_LEN`] latin letters.
///
/// Uses the thread-local generator, which is seeded once per thread.
pub fn generate_salt() -> String {
    let mut rng = rand::thread_rng();
    (0..SALT_LEN)
        .map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char)
        .collect()
}

/// INIT payload `salt;signature` with a fresh salt
pub fn init_payload(user: &str, pass: &str) -> String {
    let salt = generate_salt();
    let sign = signature(user, &salt, &credential(user, pass));
    format!("{};{}", salt, sign)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_known_value() {
        assert_eq!(
            credential("alice", "secret"),
            "9iiMd3pIH96vrOdpvrhe3iw1952heww0G3vPdRNDYU8="
        );
    }

    #[test]
    fn test_signature_known_value() {
        let cred = credential("alice", "secret");
        assert_eq!(
            signature("alice", "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdef", &cred),
            "51NuSKjaiPcer+GsnZy/Rd7FNnBCmzTfn64RfUZfk/c="
        );
    }

    #[test]
    fn test_salt_shape() {
        let salt = generate_salt();
        assert_eq!(salt.len(), SALT_LEN);
        assert!(salt.bytes().all(|b| b.is_ascii_alphabetic()));
    }

    #[test]
    fn test_salt_is_fresh() {
        let a = generate_salt();
        let b = generate_salt();
        assert_ne!(a, b);
    }

    #[test]
    fn test_init_payload_verifies() {
        let payload = init_payload("alice", "secret");
        let (salt, sign) = payload.split_once(';').unwrap();
        assert_eq!(salt.len(), SALT_LEN);
        assert_eq!(sign, signature("alice", salt, &credential("alice", "secret")));
        assert_ne!(payload, init_payload("alice", "secret"));
    }
}
