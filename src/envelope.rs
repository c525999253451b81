//! Authenticated symmetric encryption for credentials.
//!
//! Every credential handed to a client or written to the database is an
//! AES-256-GCM envelope serialized as `hex(iv):hex(tag):hex(ciphertext)`.
//! The 32-byte key is derived once from the process secret with Argon2id
//! and a fixed salt, so every process sharing the secret shares the key.

use aes_gcm::{
    Aes256Gcm, Key, Nonce, Tag,
    aead::{AeadInPlace, KeyInit},
};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// IV length for AES-GCM (96 bits).
pub const IV_LEN: usize = 12;

/// Authentication tag length for AES-GCM (128 bits).
pub const TAG_LEN: usize = 16;

/// Derived key length (AES-256).
pub const KEY_LEN: usize = 32;

/// Fixed salt for deriving the envelope key from the process secret.
const KEY_SALT: &[u8] = b"medsafe.envelope.v1";

/// Argon2id cost: 19 MiB, 2 passes, 1 lane.
const KDF_MEMORY_KIB: u32 = 19 * 1024;
const KDF_ITERATIONS: u32 = 2;
const KDF_PARALLELISM: u32 = 1;

/// Errors from envelope operations.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Malformed envelope: {0}")]
    Malformed(&'static str),

    #[error("Decryption failed: authentication tag mismatch")]
    Decryption,
}

/// The symmetric key used for every envelope.
///
/// Key bytes are zeroized on drop and never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EnvelopeKey([u8; KEY_LEN]);

impl EnvelopeKey {
    /// Derive the envelope key from the process-wide secret.
    ///
    /// Deterministic: the same secret always yields the same key.
    pub fn derive(secret: &[u8]) -> Result<Self, EnvelopeError> {
        let params = Params::new(
            KDF_MEMORY_KIB,
            KDF_ITERATIONS,
            KDF_PARALLELISM,
            Some(KEY_LEN),
        )
        .map_err(|e| EnvelopeError::KeyDerivation(format!("Invalid Argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut key = [0u8; KEY_LEN];
        argon2
            .hash_password_into(secret, KEY_SALT, &mut key)
            .map_err(|e| EnvelopeError::KeyDerivation(e.to_string()))?;

        Ok(Self(key))
    }

    /// Wrap raw key bytes that were derived elsewhere.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.0))
    }
}

impl std::fmt::Debug for EnvelopeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnvelopeKey(..)")
    }
}

/// Encrypt `plaintext` into an envelope string with a fresh random IV.
pub fn encrypt(plaintext: &[u8], key: &EnvelopeKey) -> Result<String, EnvelopeError> {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);

    let mut buffer = plaintext.to_vec();
    let tag = key
        .cipher()
        .encrypt_in_place_detached(Nonce::from_slice(&iv), b"", &mut buffer)
        .map_err(|_| EnvelopeError::Encryption)?;

    Ok(format!(
        "{}:{}:{}",
        hex::encode(iv),
        hex::encode(tag),
        hex::encode(&buffer)
    ))
}

/// Decrypt an envelope string. Fails closed: either the exact plaintext
/// comes back or an error does.
pub fn decrypt(envelope: &str, key: &EnvelopeKey) -> Result<Vec<u8>, EnvelopeError> {
    let (iv, tag, ciphertext) = split_segments(envelope)?;

    let iv = hex::decode(iv).map_err(|_| EnvelopeError::Malformed("IV is not valid hex"))?;
    let tag = hex::decode(tag).map_err(|_| EnvelopeError::Malformed("tag is not valid hex"))?;
    let mut buffer = hex::decode(ciphertext)
        .map_err(|_| EnvelopeError::Malformed("ciphertext is not valid hex"))?;

    if iv.len() != IV_LEN {
        return Err(EnvelopeError::Malformed("IV has the wrong length"));
    }
    if tag.len() != TAG_LEN {
        return Err(EnvelopeError::Malformed("tag has the wrong length"));
    }

    key.cipher()
        .decrypt_in_place_detached(
            Nonce::from_slice(&iv),
            b"",
            &mut buffer,
            Tag::from_slice(&tag),
        )
        .map_err(|_| EnvelopeError::Decryption)?;

    Ok(buffer)
}

fn split_segments(envelope: &str) -> Result<(&str, &str, &str), EnvelopeError> {
    let mut parts = envelope.split(':');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(iv), Some(tag), Some(ciphertext), None) => Ok((iv, tag, ciphertext)),
        _ => Err(EnvelopeError::Malformed("expected exactly three segments")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> EnvelopeKey {
        EnvelopeKey::from_bytes([7u8; KEY_LEN])
    }

    /// Replace the hex digit at `index` with a different hex digit.
    fn flip_hex_char(s: &str, index: usize) -> String {
        let mut chars: Vec<char> = s.chars().collect();
        chars[index] = if chars[index] == '0' { '1' } else { '0' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = test_key();
        for plaintext in [
            &b""[..],
            b"a",
            b"eyJhbGciOiJIUzI1NiJ9.payload.signature",
            &[0u8, 255, 1, 254, 58, 58],
        ] {
            let envelope = encrypt(plaintext, &key).unwrap();
            assert_eq!(decrypt(&envelope, &key).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_envelope_format() {
        let envelope = encrypt(b"hello", &test_key()).unwrap();
        let parts: Vec<&str> = envelope.split(':').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].len(), IV_LEN * 2);
        assert_eq!(parts[1].len(), TAG_LEN * 2);
        assert_eq!(parts[2].len(), "hello".len() * 2);
        assert!(
            envelope
                .chars()
                .all(|c| c == ':' || c.is_ascii_hexdigit())
        );
    }

    #[test]
    fn test_encryption_is_not_deterministic() {
        let key = test_key();
        let first = encrypt(b"same plaintext", &key).unwrap();
        let second = encrypt(b"same plaintext", &key).unwrap();

        assert_ne!(first, second);
        assert_ne!(first.split(':').next(), second.split(':').next());
    }

    #[test]
    fn test_any_tag_or_ciphertext_flip_fails() {
        let key = test_key();
        let envelope = encrypt(b"user 42 session", &key).unwrap();
        let tag_start = IV_LEN * 2 + 1;

        for index in tag_start..envelope.len() {
            if envelope.as_bytes()[index] == b':' {
                continue;
            }
            let tampered = flip_hex_char(&envelope, index);
            assert!(
                decrypt(&tampered, &key).is_err(),
                "tampering at index {} was not detected",
                index
            );
        }
    }

    #[test]
    fn test_iv_flip_fails() {
        let key = test_key();
        let envelope = encrypt(b"payload", &key).unwrap();
        let tampered = flip_hex_char(&envelope, 0);

        assert!(matches!(
            decrypt(&tampered, &key),
            Err(EnvelopeError::Decryption)
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let envelope = encrypt(b"payload", &test_key()).unwrap();
        let other = EnvelopeKey::from_bytes([8u8; KEY_LEN]);

        assert!(matches!(
            decrypt(&envelope, &other),
            Err(EnvelopeError::Decryption)
        ));
    }

    #[test]
    fn test_malformed_envelopes_rejected() {
        let key = test_key();
        let valid = encrypt(b"payload", &key).unwrap();
        let (iv, rest) = valid.split_once(':').unwrap();
        let (tag, ciphertext) = rest.split_once(':').unwrap();

        let cases = [
            String::new(),
            "not-an-envelope".to_string(),
            format!("{}:{}", iv, tag),
            format!("{}:{}:{}:{}", iv, tag, ciphertext, ciphertext),
            format!("zz{}:{}:{}", &iv[2..], tag, ciphertext),
            format!("{}:{}:{}x", iv, tag, ciphertext),
            format!("{}:{}:{}", &iv[2..], tag, ciphertext),
            format!("{}:{}:{}", iv, &tag[2..], ciphertext),
        ];

        for case in cases {
            assert!(
                matches!(decrypt(&case, &key), Err(EnvelopeError::Malformed(_))),
                "expected malformed error for {:?}",
                case
            );
        }
    }

    #[test]
    fn test_derive_is_deterministic() {
        let first = EnvelopeKey::derive(b"a-process-secret-that-is-long-enough").unwrap();
        let second = EnvelopeKey::derive(b"a-process-secret-that-is-long-enough").unwrap();
        let other = EnvelopeKey::derive(b"a-different-secret-that-is-long-enough").unwrap();

        let envelope = encrypt(b"payload", &first).unwrap();
        assert_eq!(decrypt(&envelope, &second).unwrap(), b"payload");
        assert!(decrypt(&envelope, &other).is_err());
    }

    #[test]
    fn test_debug_hides_key_bytes() {
        let debug = format!("{:?}", test_key());
        assert_eq!(debug, "EnvelopeKey(..)");
    }
}
