// Copyright 2026 Tessera Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Cryptographic Envelope.
//!
//! Derives a 256-bit key from an operator secret (or a generated per-device
//! fallback secret) and a persisted random salt via PBKDF2-HMAC-SHA256, then
//! seals payloads with AES-256-GCM. Framing is
//! `base64(version ‖ nonce ‖ ciphertext)` with a fresh random nonce per call.
//!
//! Decrypt fails closed: tag mismatch, truncation, and unknown versions are
//! errors, never partial plaintext. Key derivation is CPU-bound, so the
//! derived cipher is built once at construction and cached for the lifetime
//! of the (secret, salt) pair.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::Sha256;

use crate::config::Config;
use crate::core::constants::{crypto, store};
use crate::core::errors::{CryptoError, StoreError};
use crate::core::store::KeyValueBackend;

/// A framed ciphertext: `version ‖ nonce(12B) ‖ ciphertext`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedPayload {
    pub version: u8,
    pub nonce: [u8; crypto::NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub fn encode(&self) -> String {
        let mut framed = Vec::with_capacity(1 + crypto::NONCE_LEN + self.ciphertext.len());
        framed.push(self.version);
        framed.extend_from_slice(&self.nonce);
        framed.extend_from_slice(&self.ciphertext);
        BASE64.encode(framed)
    }

    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let framed = BASE64.decode(encoded)?;
        // Smallest valid frame: version + nonce + empty-plaintext tag.
        if framed.len() < 1 + crypto::NONCE_LEN + crypto::TAG_LEN {
            return Err(CryptoError::Truncated(framed.len()));
        }
        let version = framed[0];
        if version != crypto::ENVELOPE_VERSION {
            return Err(CryptoError::UnknownVersion(version));
        }
        let mut nonce = [0u8; crypto::NONCE_LEN];
        nonce.copy_from_slice(&framed[1..1 + crypto::NONCE_LEN]);
        Ok(Self {
            version,
            nonce,
            ciphertext: framed[1 + crypto::NONCE_LEN..].to_vec(),
        })
    }
}

pub struct Envelope {
    cipher: Aes256Gcm,
}

impl Envelope {
    /// Builds the envelope, lazily generating and persisting the KDF salt
    /// (and the device fallback secret when no operator secret is
    /// configured). Both survive restarts through the key-value backend.
    pub fn initialize(kv: &dyn KeyValueBackend, config: &Config) -> Result<Self, StoreError> {
        let secret = match &config.master_secret {
            Some(secret) => secret.clone(),
            None => load_or_create(kv, store::FALLBACK_SECRET_KEY, crypto::FALLBACK_SECRET_LEN)?,
        };
        let salt_b64 = load_or_create(kv, store::SALT_KEY, crypto::SALT_LEN)?;
        let salt = BASE64.decode(&salt_b64).map_err(CryptoError::Encoding)?;

        let mut key = [0u8; crypto::KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(secret.as_bytes(), &salt, config.kdf_iterations, &mut key);

        let cipher = Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::Cipher)?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<EncryptedPayload, CryptoError> {
        let mut nonce = [0u8; crypto::NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::Cipher)?;

        Ok(EncryptedPayload {
            version: crypto::ENVELOPE_VERSION,
            nonce,
            ciphertext,
        })
    }

    pub fn decrypt(&self, payload: &EncryptedPayload) -> Result<Vec<u8>, CryptoError> {
        if payload.version != crypto::ENVELOPE_VERSION {
            return Err(CryptoError::UnknownVersion(payload.version));
        }
        self.cipher
            .decrypt(Nonce::from_slice(&payload.nonce), payload.ciphertext.as_slice())
            .map_err(|_| CryptoError::AuthenticationFailed)
    }

    /// Encrypts and frames in one step.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, CryptoError> {
        Ok(self.encrypt(plaintext)?.encode())
    }

    /// Unframes and decrypts in one step.
    pub fn open(&self, encoded: &str) -> Result<Vec<u8>, CryptoError> {
        self.decrypt(&EncryptedPayload::decode(encoded)?)
    }
}

fn load_or_create(
    kv: &dyn KeyValueBackend,
    key: &str,
    len: usize,
) -> Result<String, StoreError> {
    if let Some(existing) = kv.get(key)? {
        return Ok(existing);
    }
    let mut bytes = vec![0u8; len];
    rand::rng().fill_bytes(&mut bytes);
    let encoded = BASE64.encode(&bytes);
    kv.set(key, &encoded)?;
    Ok(encoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::MemoryKv;

    fn test_config() -> Config {
        Config {
            kdf_iterations: 1_000,
            ..Config::default()
        }
    }

    fn envelope(kv: &MemoryKv) -> Envelope {
        Envelope::initialize(kv, &test_config()).unwrap()
    }

    #[test]
    fn round_trip() {
        let kv = MemoryKv::default();
        let env = envelope(&kv);
        let sealed = env.seal(b"tenant-context").unwrap();
        assert_eq!(env.open(&sealed).unwrap(), b"tenant-context");
    }

    #[test]
    fn fresh_nonce_per_call() {
        let kv = MemoryKv::default();
        let env = envelope(&kv);
        let a = env.encrypt(b"same plaintext").unwrap();
        let b = env.encrypt(b"same plaintext").unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn salt_and_fallback_secret_survive_restart() {
        let kv = MemoryKv::default();
        let sealed = envelope(&kv).seal(b"persisted").unwrap();
        // A second initialization against the same backend must derive the
        // same key.
        let reopened = envelope(&kv);
        assert_eq!(reopened.open(&sealed).unwrap(), b"persisted");
    }

    #[test]
    fn wrong_secret_fails_closed() {
        let kv = MemoryKv::default();
        let sealed = envelope(&kv).seal(b"secret data").unwrap();

        let other = Envelope::initialize(
            &kv,
            &Config {
                master_secret: Some("different-operator-secret".to_string()),
                kdf_iterations: 1_000,
                ..Config::default()
            },
        )
        .unwrap();
        assert!(matches!(
            other.open(&sealed),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_closed() {
        let kv = MemoryKv::default();
        let env = envelope(&kv);
        let mut payload = env.encrypt(b"integrity matters").unwrap();
        payload.ciphertext[0] ^= 0x01;
        assert!(matches!(
            env.decrypt(&payload),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn tampered_nonce_fails_closed() {
        let kv = MemoryKv::default();
        let env = envelope(&kv);
        let mut payload = env.encrypt(b"integrity matters").unwrap();
        payload.nonce[3] ^= 0xff;
        assert!(matches!(
            env.decrypt(&payload),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn unknown_version_rejected() {
        let kv = MemoryKv::default();
        let env = envelope(&kv);
        let mut payload = env.encrypt(b"v2?").unwrap();
        payload.version = 9;
        assert!(matches!(
            env.decrypt(&payload),
            Err(CryptoError::UnknownVersion(9))
        ));

        let mut framed = BASE64.decode(env.seal(b"v2?").unwrap()).unwrap();
        framed[0] = 9;
        assert!(matches!(
            EncryptedPayload::decode(&BASE64.encode(framed)),
            Err(CryptoError::UnknownVersion(9))
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let encoded = BASE64.encode([crypto::ENVELOPE_VERSION, 1, 2, 3]);
        assert!(matches!(
            EncryptedPayload::decode(&encoded),
            Err(CryptoError::Truncated(4))
        ));
    }

    #[test]
    fn garbage_encoding_rejected() {
        assert!(matches!(
            EncryptedPayload::decode("not base64 !!!"),
            Err(CryptoError::Encoding(_))
        ));
    }
}
