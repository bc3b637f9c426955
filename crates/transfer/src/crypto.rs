use std::sync::{Arc, RwLock};

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD};

use crate::{KEY_LEN, NONCE_LEN, TransferError};

/// AES-256 session key delivered by the hub, once per connection.
///
/// There is no ambient global: whoever needs to encrypt must be handed a
/// key (or a [`KeySlot`]) explicitly.
#[derive(Clone)]
pub struct SessionKey([u8; KEY_LEN]);

impl SessionKey {
    /// Imports raw key material. Fails unless exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransferError> {
        let arr: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| TransferError::InvalidKey(format!("expected {KEY_LEN} bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }

    /// Imports a key from the hub's base64 `SetEncryptionKey` payload.
    pub fn from_base64(encoded: &str) -> Result<Self, TransferError> {
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| TransferError::InvalidKey(format!("bad base64: {e}")))?;
        Self::from_bytes(&bytes)
    }
}

impl std::fmt::Debug for SessionKey {
    // Never print key material.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// Shared per-connection slot holding the current session key.
///
/// The connection layer installs a key when the hub pushes one and clears
/// it on disconnect. Readers see `None` as a hard precondition failure
/// rather than blocking.
#[derive(Clone, Default)]
pub struct KeySlot {
    inner: Arc<RwLock<Option<SessionKey>>>,
}

impl KeySlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs (or replaces) the session key.
    pub fn install(&self, key: SessionKey) {
        *self.inner.write().unwrap() = Some(key);
    }

    /// Invalidates the key. Called on disconnect.
    pub fn clear(&self) {
        *self.inner.write().unwrap() = None;
    }

    /// Returns a clone of the current key, if installed.
    pub fn get(&self) -> Option<SessionKey> {
        self.inner.read().unwrap().clone()
    }

    pub fn is_installed(&self) -> bool {
        self.inner.read().unwrap().is_some()
    }
}

/// Self-contained ciphertext for one chunk: `nonce || ciphertext+tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedChunk(Vec<u8>);

impl EncryptedChunk {
    /// Wraps wire bytes. Fails if too short to contain a nonce and a tag.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, TransferError> {
        if bytes.len() < NONCE_LEN + 16 {
            return Err(TransferError::Decryption(format!(
                "ciphertext too short: {} bytes",
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Nonce prefix.
    pub fn nonce(&self) -> &[u8] {
        &self.0[..NONCE_LEN]
    }

    /// Ciphertext plus authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.0[NONCE_LEN..]
    }

    /// Transport encoding for JSON framing.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

/// Encrypts one chunk under `key` with a fresh random nonce.
///
/// The nonce is always drawn internally; callers cannot supply one, so
/// nonce reuse under a given key cannot be produced from this API.
pub fn encrypt_chunk(plaintext: &[u8], key: &SessionKey) -> Result<EncryptedChunk, TransferError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| TransferError::Encryption(e.to_string()))?;
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| TransferError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(EncryptedChunk(out))
}

/// Decrypts a chunk produced by [`encrypt_chunk`]. Fails on a wrong key or
/// tampered ciphertext.
pub fn decrypt_chunk(chunk: &EncryptedChunk, key: &SessionKey) -> Result<Vec<u8>, TransferError> {
    let cipher = Aes256Gcm::new_from_slice(&key.0)
        .map_err(|e| TransferError::Decryption(e.to_string()))?;
    let nonce = Nonce::from_slice(chunk.nonce());
    cipher
        .decrypt(nonce, chunk.ciphertext())
        .map_err(|e| TransferError::Decryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_key() -> SessionKey {
        SessionKey::from_bytes(&[7u8; 32]).unwrap()
    }

    #[test]
    fn key_import_rejects_wrong_length() {
        assert!(matches!(
            SessionKey::from_bytes(&[0u8; 16]),
            Err(TransferError::InvalidKey(_))
        ));
    }

    #[test]
    fn key_import_from_base64() {
        let encoded = STANDARD.encode([42u8; 32]);
        assert!(SessionKey::from_base64(&encoded).is_ok());
        assert!(matches!(
            SessionKey::from_base64("not-base64!!"),
            Err(TransferError::InvalidKey(_))
        ));
    }

    #[test]
    fn key_debug_does_not_leak() {
        let key = test_key();
        assert_eq!(format!("{key:?}"), "SessionKey(..)");
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = b"chunk 0 of app.bundle";
        let encrypted = encrypt_chunk(plaintext, &key).unwrap();
        assert_ne!(encrypted.ciphertext(), plaintext.as_slice());
        let decrypted = decrypt_chunk(&encrypted, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn nonces_are_never_reused() {
        let key = test_key();
        let mut seen = HashSet::new();
        for _ in 0..256 {
            let encrypted = encrypt_chunk(b"same plaintext", &key).unwrap();
            assert!(
                seen.insert(encrypted.nonce().to_vec()),
                "nonce repeated under the same key"
            );
        }
    }

    #[test]
    fn wrong_key_fails_auth() {
        let encrypted = encrypt_chunk(b"secret", &test_key()).unwrap();
        let other = SessionKey::from_bytes(&[8u8; 32]).unwrap();
        assert!(matches!(
            decrypt_chunk(&encrypted, &other),
            Err(TransferError::Decryption(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_auth() {
        let key = test_key();
        let encrypted = encrypt_chunk(b"secret", &key).unwrap();
        let mut bytes = encrypted.into_bytes();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = EncryptedChunk::from_bytes(bytes).unwrap();
        assert!(matches!(
            decrypt_chunk(&tampered, &key),
            Err(TransferError::Decryption(_))
        ));
    }

    #[test]
    fn encrypted_chunk_layout() {
        let encrypted = encrypt_chunk(b"xyz", &test_key()).unwrap();
        assert_eq!(encrypted.nonce().len(), NONCE_LEN);
        // ciphertext + 16-byte tag
        assert_eq!(encrypted.ciphertext().len(), 3 + 16);
        assert_eq!(
            encrypted.as_bytes().len(),
            encrypted.nonce().len() + encrypted.ciphertext().len()
        );
    }

    #[test]
    fn from_bytes_rejects_truncated() {
        assert!(EncryptedChunk::from_bytes(vec![0u8; NONCE_LEN]).is_err());
    }

    #[test]
    fn key_slot_lifecycle() {
        let slot = KeySlot::new();
        assert!(!slot.is_installed());
        assert!(slot.get().is_none());

        slot.install(test_key());
        assert!(slot.is_installed());
        assert!(slot.get().is_some());

        slot.clear();
        assert!(!slot.is_installed());
    }

    #[test]
    fn key_slot_is_shared_between_clones() {
        let slot = KeySlot::new();
        let other = slot.clone();
        slot.install(test_key());
        assert!(other.is_installed());
        other.clear();
        assert!(!slot.is_installed());
    }
}
