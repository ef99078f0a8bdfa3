//! Credential vault for warden.
//!
//! Key material (HMAC secrets, PEM private and public keys) is loaded from a
//! literal value, an environment variable or a file, and kept in memory sealed
//! under AES-256-GCM with a per-credential random key. Plaintext is only
//! materialized for the duration of a [`Credential::bytes`] call.
//!
//! ## Example
//!
//! ```ignore
//! use warden_secrets::{Credential, CredentialSource};
//!
//! let source = CredentialSource::Env("JWT_SIGNING_KEY".to_string());
//! let credential = Credential::load(&source)?;
//!
//! let secret = credential.bytes()?;
//! ```

mod credential;
mod source;

pub use credential::Credential;
pub use source::CredentialSource;

/// Result type for vault operations.
pub type SecretsResult<T> = Result<T, SecretsError>;

/// Vault errors
#[derive(Debug, thiserror::Error)]
pub enum SecretsError {
    #[error("Credential is missing or empty")]
    CredentialMissing,

    #[error("IO error reading credential file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),
}

impl SecretsError {
    pub fn encryption(msg: impl Into<String>) -> Self {
        Self::Encryption(msg.into())
    }

    pub fn decryption(msg: impl Into<String>) -> Self {
        Self::Decryption(msg.into())
    }
}
