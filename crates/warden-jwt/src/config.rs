//! JWT provider configuration.
//!
//! [`JwtConfig`] is the deserializable description of a provider. Calling
//! [`JwtConfig::validate`] resolves every credential through the vault,
//! decodes keys for the configured algorithm and caches the result; the
//! provider only ever works with a validated config.

use std::sync::Arc;

use serde::Deserialize;
use time::Duration;
use tracing::debug;
use warden_secrets::{Credential, CredentialSource, SecretsError};

use crate::algorithm::SigningAlgorithm;
use crate::error::{JwtError, JwtResult};
use crate::keys::{self, KeyMaterial, PemKeyPair};

/// Upper bound on accepted token length and the default `max_token_size`.
pub const MAX_TOKEN_LENGTH: usize = 8192;

/// Tokens shorter than this are rejected before parsing.
pub const MIN_TOKEN_LENGTH: usize = 20;

/// Configuration of a [`JwtProvider`](crate::JwtProvider).
///
/// Field names follow the camelCase JSON form:
///
/// ```json
/// {
///   "signingAlgorithm": "ES256",
///   "privateKey": { "file": "/etc/warden/es256.pem" },
///   "expirationSeconds": 3600,
///   "issuer": "auth.example.com",
///   "audience": "api",
///   "keyID": "2025-01"
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JwtConfig {
    /// One of HS256/384/512, RS256/384/512, ES256/384/512 or EdDSA.
    pub signing_algorithm: String,

    /// Shared secret for HMAC algorithms.
    pub signing_key: Option<CredentialSource>,

    /// PEM private key for asymmetric algorithms.
    pub private_key: Option<CredentialSource>,

    /// PEM public key. Required for RSA; derived for ECDSA and EdDSA when absent.
    pub public_key: Option<CredentialSource>,

    /// Token lifetime in seconds.
    pub expiration_seconds: i64,

    pub issuer: String,

    pub audience: String,

    /// Written as the `kid` header when non-empty.
    #[serde(rename = "keyID")]
    pub key_id: String,

    /// Reject parsed tokens whose `iss` differs from `issuer`.
    pub require_issuer: bool,

    /// Reject parsed tokens whose `aud` does not contain `audience`.
    pub require_audience: bool,

    /// Record issued tokens per subject in the revocation backend.
    pub track_user_tokens: bool,

    /// Cap on active tokens per subject; 0 means unlimited.
    pub max_user_sessions: u32,

    /// Largest accepted token in bytes; 0 selects [`MAX_TOKEN_LENGTH`].
    pub max_token_size: i64,

    #[serde(skip)]
    preset_signing_key: Option<Credential>,

    #[serde(skip)]
    preset_key_pair: Option<PresetKeyPair>,

    #[serde(skip)]
    resolved: Option<ResolvedKeys>,
}

/// Generated PEM keys, sealed until validation decodes them.
#[derive(Debug, Clone)]
struct PresetKeyPair {
    private_pem: Credential,
    public_pem: Credential,
}

/// Everything `validate` derives from the raw fields.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedKeys {
    pub(crate) algorithm: SigningAlgorithm,
    pub(crate) expiration: Duration,
    pub(crate) keys: Arc<KeyMaterial>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            signing_algorithm: SigningAlgorithm::HS256.as_str().to_string(),
            signing_key: None,
            private_key: None,
            public_key: None,
            expiration_seconds: 24 * 60 * 60,
            issuer: "blueprint".to_string(),
            audience: "api".to_string(),
            key_id: "default".to_string(),
            require_issuer: true,
            require_audience: true,
            track_user_tokens: false,
            max_user_sessions: 0,
            max_token_size: MAX_TOKEN_LENGTH as i64,
            preset_signing_key: None,
            preset_key_pair: None,
            resolved: None,
        }
    }
}

impl JwtConfig {
    /// Default configuration with an in-memory HMAC secret.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::SigningKeyRequired`] if `key` is empty.
    pub fn with_signing_key(key: &[u8]) -> JwtResult<Self> {
        let credential = Credential::new(key).map_err(|e| missing_as(e, JwtError::SigningKeyRequired))?;
        Ok(Self {
            preset_signing_key: Some(credential),
            ..Self::default()
        })
    }

    /// Default configuration signing with a freshly generated RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::InvalidAlgorithm`] unless `algorithm` is RS256,
    /// RS384 or RS512, and [`JwtError::KeyGeneration`] if `bits` is too small.
    pub fn generate_rsa(algorithm: SigningAlgorithm, bits: usize) -> JwtResult<Self> {
        if !algorithm.is_rsa() {
            return Err(JwtError::invalid_algorithm(algorithm.as_str()));
        }
        Self::with_key_pair(algorithm, keys::generate_rsa_key_pair(bits)?)
    }

    /// Default configuration signing with a fresh key on the curve of `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::InvalidAlgorithm`] unless `algorithm` is ES256,
    /// ES384 or ES512.
    pub fn generate_ecdsa(algorithm: SigningAlgorithm) -> JwtResult<Self> {
        let Some(curve) = algorithm.curve() else {
            return Err(JwtError::invalid_algorithm(algorithm.as_str()));
        };
        Self::with_key_pair(algorithm, keys::generate_ecdsa_key_pair(curve)?)
    }

    /// Default configuration signing with a freshly generated Ed25519 key.
    pub fn generate_ed25519() -> JwtResult<Self> {
        Self::with_key_pair(SigningAlgorithm::EdDSA, keys::generate_ed25519_key_pair()?)
    }

    fn with_key_pair(algorithm: SigningAlgorithm, pair: PemKeyPair) -> JwtResult<Self> {
        let preset = PresetKeyPair {
            private_pem: Credential::new(pair.private_pem.as_bytes())?,
            public_pem: Credential::new(pair.public_pem.as_bytes())?,
        };
        Ok(Self {
            signing_algorithm: algorithm.as_str().to_string(),
            preset_key_pair: Some(preset),
            ..Self::default()
        })
    }

    /// Resolves credentials and checks the configuration.
    ///
    /// Validation runs once; later calls return immediately. A failed
    /// validation leaves the config unvalidated.
    ///
    /// # Errors
    ///
    /// Checks run in this order, and the first failure is returned:
    /// 1. the algorithm name ([`JwtError::InvalidAlgorithm`])
    /// 2. key presence, type and decoding
    /// 3. `max_token_size` ([`JwtError::InvalidMaxTokenSize`])
    /// 4. `expiration_seconds` ([`JwtError::InvalidDuration`])
    pub fn validate(&mut self) -> JwtResult<()> {
        self.resolve().map(drop)
    }

    /// Validates if needed and returns the cached resolution.
    pub(crate) fn resolve(&mut self) -> JwtResult<ResolvedKeys> {
        if let Some(resolved) = &self.resolved {
            return Ok(resolved.clone());
        }

        let algorithm: SigningAlgorithm = self.signing_algorithm.parse()?;
        let keys = self.resolve_keys(algorithm)?;

        if self.max_token_size < 0
            || (1..MIN_TOKEN_LENGTH as i64).contains(&self.max_token_size)
        {
            return Err(JwtError::InvalidMaxTokenSize);
        }
        if self.expiration_seconds <= 0 {
            return Err(JwtError::InvalidDuration);
        }

        if self.max_token_size == 0 {
            self.max_token_size = MAX_TOKEN_LENGTH as i64;
        }

        debug!(
            algorithm = %algorithm,
            key_family = keys.family(),
            "JWT configuration validated"
        );

        let resolved = ResolvedKeys {
            algorithm,
            expiration: Duration::seconds(self.expiration_seconds),
            keys: Arc::new(keys),
        };
        self.resolved = Some(resolved.clone());
        Ok(resolved)
    }

    #[must_use]
    pub fn is_validated(&self) -> bool {
        self.resolved.is_some()
    }

    /// The parsed algorithm, once validated.
    #[must_use]
    pub fn algorithm(&self) -> Option<SigningAlgorithm> {
        self.resolved.as_ref().map(|r| r.algorithm)
    }

    /// The token lifetime, once validated.
    #[must_use]
    pub fn expiration(&self) -> Option<Duration> {
        self.resolved.as_ref().map(|r| r.expiration)
    }

    /// Effective size limit in bytes.
    #[must_use]
    pub fn token_size_limit(&self) -> usize {
        match usize::try_from(self.max_token_size) {
            Ok(0) | Err(_) => MAX_TOKEN_LENGTH,
            Ok(size) => size,
        }
    }

    #[cfg(test)]
    fn resolved(&self) -> Option<&ResolvedKeys> {
        self.resolved.as_ref()
    }

    fn resolve_keys(&self, algorithm: SigningAlgorithm) -> JwtResult<KeyMaterial> {
        let has_secret = self.signing_key.is_some() || self.preset_signing_key.is_some();

        if algorithm.is_hmac() {
            if self.private_key.is_some()
                || self.public_key.is_some()
                || self.preset_key_pair.is_some()
            {
                return Err(JwtError::invalid_key_type(format!(
                    "{algorithm} uses a shared secret, not a key pair"
                )));
            }
            let secret = match (&self.preset_signing_key, &self.signing_key) {
                (Some(credential), _) => credential.clone(),
                (None, Some(source)) => load(source, JwtError::SigningKeyRequired)?,
                (None, None) => return Err(JwtError::SigningKeyRequired),
            };
            return Ok(KeyMaterial::Hmac { secret });
        }

        if has_secret {
            return Err(JwtError::invalid_key_type(format!(
                "{algorithm} requires a key pair, not a shared secret"
            )));
        }
        let (private_pem, public_pem) = match (&self.preset_key_pair, &self.private_key) {
            (Some(pair), _) => (pair.private_pem.bytes()?, Some(pair.public_pem.bytes()?)),
            (None, Some(private_source)) => {
                if algorithm.is_rsa() && self.public_key.is_none() {
                    return Err(JwtError::PublicKeyRequired);
                }
                let private_pem = load(private_source, JwtError::PrivateKeyRequired)?.bytes()?;
                let public_pem = match &self.public_key {
                    Some(source) => Some(load(source, JwtError::PublicKeyRequired)?.bytes()?),
                    None => None,
                };
                (private_pem, public_pem)
            }
            (None, None) => return Err(JwtError::PrivateKeyRequired),
        };

        if algorithm.is_rsa() {
            let private_der = keys::decode_private_rsa(&private_pem)?;
            let public_der = match &public_pem {
                Some(pem) => keys::decode_public_rsa(pem)?,
                None => return Err(JwtError::PublicKeyRequired),
            };
            return Ok(KeyMaterial::Rsa {
                private_key: Credential::new(&private_der)?,
                public_key: Credential::new(&public_der)?,
            });
        }

        if let Some(expected) = algorithm.curve() {
            let (curve, private_der) = keys::decode_private_ecdsa(&private_pem)?;
            if curve != expected {
                return Err(JwtError::curve_mismatch(algorithm.as_str(), curve.name()));
            }
            let public_der = match &public_pem {
                Some(pem) => {
                    let (public_curve, der) = keys::decode_public_ecdsa(pem)?;
                    if public_curve != expected {
                        return Err(JwtError::curve_mismatch(
                            algorithm.as_str(),
                            public_curve.name(),
                        ));
                    }
                    der
                }
                None => keys::derive_public_ecdsa(curve, &private_der)?,
            };
            return Ok(KeyMaterial::Ecdsa {
                curve,
                private_key: Credential::new(&private_der)?,
                public_key: Credential::new(&public_der)?,
            });
        }

        let private_raw = keys::decode_private_eddsa(&private_pem)?;
        let public_raw = match &public_pem {
            Some(pem) => keys::decode_public_eddsa(pem)?,
            None => keys::derive_public_eddsa(&private_raw)?,
        };
        Ok(KeyMaterial::EdDsa {
            private_key: Credential::new(&private_raw)?,
            public_key: Credential::new(&public_raw)?,
        })
    }
}

/// Loads a credential, reporting an empty or absent value as `missing`.
fn load(source: &CredentialSource, missing: JwtError) -> JwtResult<Credential> {
    Credential::load(source).map_err(|e| missing_as(e, missing))
}

fn missing_as(error: SecretsError, missing: JwtError) -> JwtError {
    match error {
        SecretsError::CredentialMissing => missing,
        other => other.into(),
    }
}
