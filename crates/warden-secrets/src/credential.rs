//! AES-256-GCM sealed credential.

use std::fmt;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::{CredentialSource, SecretsError, SecretsResult};

/// Nonce size for AES-256-GCM (96 bits)
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits)
const KEY_SIZE: usize = 32;

/// An in-memory secret sealed under its own random AES-256 key.
///
/// The plaintext never lives in the struct; it is decrypted on every
/// [`bytes`](Self::bytes) call and handed back in a [`Zeroizing`] buffer.
/// Callers must treat that buffer as transient and never log it.
#[derive(Clone)]
pub struct Credential {
    ciphertext: Vec<u8>,
    nonce: [u8; NONCE_SIZE],
    key: [u8; KEY_SIZE],
}

impl Credential {
    /// Seal `plaintext` under a freshly generated key and nonce.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::CredentialMissing`] if `plaintext` is empty.
    pub fn new(plaintext: &[u8]) -> SecretsResult<Self> {
        if plaintext.is_empty() {
            return Err(SecretsError::CredentialMissing);
        }

        let mut key = [0u8; KEY_SIZE];
        let mut nonce = [0u8; NONCE_SIZE];
        let mut rng = rand::thread_rng();
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut nonce);

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| SecretsError::encryption(format!("Failed to create cipher: {e}")))?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| SecretsError::encryption(format!("Encryption failed: {e}")))?;

        Ok(Self {
            ciphertext,
            nonce,
            key,
        })
    }

    /// Resolve a credential descriptor and seal the resulting value.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::CredentialMissing`] when the source resolves to
    /// nothing, or [`SecretsError::Io`] when a credential file cannot be read.
    pub fn load(source: &CredentialSource) -> SecretsResult<Self> {
        let plaintext = source.fetch()?;
        Self::new(&plaintext)
    }

    /// Decrypt and return the raw secret.
    pub fn bytes(&self) -> SecretsResult<Zeroizing<Vec<u8>>> {
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|e| SecretsError::decryption(format!("Failed to create cipher: {e}")))?;

        cipher
            .decrypt(Nonce::from_slice(&self.nonce), self.ciphertext.as_ref())
            .map(Zeroizing::new)
            .map_err(|e| SecretsError::decryption(format!("Decryption failed: {e}")))
    }
}

impl Drop for Credential {
    fn drop(&mut self) {
        self.key.zeroize();
        self.nonce.zeroize();
        self.ciphertext.zeroize();
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("value", &"[REDACTED]")
            .finish()
    }
}
