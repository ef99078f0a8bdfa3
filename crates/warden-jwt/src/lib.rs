//! JWT authentication core for warden.
//!
//! Issues, verifies, rotates and revokes signed JSON Web Tokens:
//!
//! - [`JwtConfig`] - algorithm, key references and policy; validated once
//! - [`JwtProvider`] - the issue/parse/refresh/revoke facade
//! - [`revocation`] - the pluggable revocation store and its policy layer
//! - [`keys`] - PEM key decoding and key pair generation
//!
//! Supported algorithms are HS256/384/512, RS256/384/512, ES256/384/512 and
//! EdDSA (Ed25519). Every token is verified under the configured algorithm
//! only; unsigned tokens are never accepted.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::Map;
//! use warden_jwt::{JwtConfig, JwtProvider, RevocationManager};
//!
//! # async fn example() -> warden_jwt::JwtResult<()> {
//! let config = JwtConfig::with_signing_key(b"a-long-random-secret")?;
//! let provider = JwtProvider::with_revocation(config, RevocationManager::default())?;
//!
//! let token = provider.generate("user-42", Map::new()).await?;
//! let claims = provider.parse(&token).await?;
//! assert_eq!(claims.sub, "user-42");
//!
//! let rotated = provider.refresh(&token).await?;
//! provider.revoke(&rotated).await?;
//! # Ok(())
//! # }
//! ```

pub mod algorithm;
pub mod claims;
pub mod config;
pub mod error;
pub mod jwks;
mod jws;
pub mod keys;
pub mod provider;
pub mod revocation;
pub mod roles;

pub use algorithm::{EcCurve, SigningAlgorithm};
pub use claims::Claims;
pub use config::JwtConfig;
pub use error::{ErrorCategory, JwtError, JwtResult};
pub use jwks::{Jwk, Jwks};
pub use keys::KeyMaterial;
pub use provider::{JwtProvider, generate_token_id};
pub use revocation::{
    MemoryRevocationBackend, RevocationBackend, RevocationConfig, RevocationManager,
    RevokedToken, TokenMetadata,
};
pub use roles::{TokenParser, TokenRefresher, TokenRevoker, TokenSigner};
pub use warden_secrets::{Credential, CredentialSource};
