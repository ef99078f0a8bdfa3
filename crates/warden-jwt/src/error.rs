//! JWT error types.
//!
//! Every failure the provider can report is a distinct [`JwtError`] variant so
//! that callers (typically HTTP middleware) can decide between issuing a fresh
//! anonymous session and rejecting the request.

use std::fmt;

use warden_secrets::SecretsError;

/// Result type for JWT operations.
pub type JwtResult<T> = Result<T, JwtError>;

/// Errors that can occur while configuring, issuing, parsing or revoking tokens.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    // Configuration
    /// The configured signing algorithm is not supported.
    #[error("JWT signing algorithm is invalid: {algorithm}")]
    InvalidAlgorithm {
        /// The rejected algorithm name.
        algorithm: String,
    },

    /// An HMAC algorithm was configured without a shared secret.
    #[error("Signing key is required")]
    SigningKeyRequired,

    /// An asymmetric algorithm was configured without a private key.
    #[error("Private key is required")]
    PrivateKeyRequired,

    /// An asymmetric algorithm was configured without a public key.
    #[error("Public key is required")]
    PublicKeyRequired,

    /// The private key could not be decoded.
    #[error("Invalid private key format: {message}")]
    InvalidPrivateKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// The public key could not be decoded.
    #[error("Invalid public key format: {message}")]
    InvalidPublicKey {
        /// Description of why the key is invalid.
        message: String,
    },

    /// The supplied key material does not fit the configured algorithm.
    #[error("Invalid key type: {message}")]
    InvalidKeyType {
        /// Description of the mismatch.
        message: String,
    },

    /// `expiration_seconds` is not positive.
    #[error("Invalid expirationSeconds value")]
    InvalidDuration,

    /// `max_token_size` is negative or below the minimum token length.
    #[error("Invalid maxTokenSize")]
    InvalidMaxTokenSize,

    /// The ECDSA curve of a key does not match the algorithm.
    #[error("Algorithm {algorithm} cannot be used with curve {curve}")]
    AlgorithmCurveMismatch {
        /// The configured algorithm.
        algorithm: String,
        /// The curve of the supplied key.
        curve: String,
    },

    /// Generating a key pair failed or was refused.
    #[error("Key generation error: {message}")]
    KeyGeneration {
        /// Description of the key generation error.
        message: String,
    },

    /// Loading or decrypting a credential failed.
    #[error(transparent)]
    Credential(#[from] SecretsError),

    // Issuance
    /// Custom data uses a reserved claim name.
    #[error("Cannot use reserved claim: {claim}")]
    ReservedClaim {
        /// The offending key.
        claim: String,
    },

    /// The subject already holds the maximum number of sessions.
    #[error("Maximum concurrent sessions exceeded")]
    MaxSessionsExceeded,

    /// The signing layer failed.
    #[error("Failed to sign token: {message}")]
    Signing {
        /// Description of the signing error.
        message: String,
    },

    // Parsing
    /// The token is malformed, has a bad signature, uses the wrong algorithm
    /// or is not yet valid.
    #[error("Invalid token: {reason}")]
    InvalidToken {
        /// Description of why the token was rejected.
        reason: String,
    },

    /// The token has expired.
    #[error("Token has expired")]
    TokenExpired,

    /// The token exceeds the configured size limit.
    #[error("Token too large: {size} bytes exceeds limit of {max}")]
    TokenTooLarge {
        /// Size of the rejected token in bytes.
        size: usize,
        /// Configured limit.
        max: usize,
    },

    /// Verification did not finish within the parse deadline.
    #[error("Token parsing timeout")]
    ParsingTimeout,

    /// Issuer validation failed.
    #[error("Issuer validation failed")]
    MissingIssuer,

    /// Audience validation failed.
    #[error("Audience validation failed")]
    MissingAudience,

    // Revocation
    /// An empty token or user id was supplied.
    #[error("Invalid token ID")]
    InvalidTokenId,

    /// The token is already revoked.
    #[error("Token is already revoked")]
    AlreadyRevoked,

    /// The operation needs a revocation manager and none is attached.
    #[error("Revocation manager not available")]
    NoRevocationManager,

    /// The revocation backend failed.
    #[error("Token revocation failed: {message}")]
    RevocationFailed {
        /// Description of the backend error.
        message: String,
    },

    // JWKS
    /// Shared-secret keys cannot be published.
    #[error("JWKS is not supported for HMAC algorithms")]
    JwksNotSupported,

    /// A key set failed to parse or lacks required key fields.
    #[error("Invalid JWKS: {message}")]
    InvalidJwks {
        /// Description of the problem.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `InvalidAlgorithm` error.
    #[must_use]
    pub fn invalid_algorithm(algorithm: impl Into<String>) -> Self {
        Self::InvalidAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Creates a new `InvalidPrivateKey` error.
    #[must_use]
    pub fn invalid_private_key(message: impl Into<String>) -> Self {
        Self::InvalidPrivateKey {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidPublicKey` error.
    #[must_use]
    pub fn invalid_public_key(message: impl Into<String>) -> Self {
        Self::InvalidPublicKey {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKeyType` error.
    #[must_use]
    pub fn invalid_key_type(message: impl Into<String>) -> Self {
        Self::InvalidKeyType {
            message: message.into(),
        }
    }

    /// Creates a new `AlgorithmCurveMismatch` error.
    #[must_use]
    pub fn curve_mismatch(algorithm: impl Into<String>, curve: impl Into<String>) -> Self {
        Self::AlgorithmCurveMismatch {
            algorithm: algorithm.into(),
            curve: curve.into(),
        }
    }

    /// Creates a new `KeyGeneration` error.
    #[must_use]
    pub fn key_generation(message: impl Into<String>) -> Self {
        Self::KeyGeneration {
            message: message.into(),
        }
    }

    /// Creates a new `ReservedClaim` error.
    #[must_use]
    pub fn reserved_claim(claim: impl Into<String>) -> Self {
        Self::ReservedClaim {
            claim: claim.into(),
        }
    }

    /// Creates a new `Signing` error.
    #[must_use]
    pub fn signing(message: impl Into<String>) -> Self {
        Self::Signing {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidToken` error.
    #[must_use]
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            reason: reason.into(),
        }
    }

    /// Creates a new `RevocationFailed` error.
    #[must_use]
    pub fn revocation_failed(message: impl Into<String>) -> Self {
        Self::RevocationFailed {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidJwks` error.
    #[must_use]
    pub fn invalid_jwks(message: impl Into<String>) -> Self {
        Self::InvalidJwks {
            message: message.into(),
        }
    }

    /// Returns `true` if this error comes from config validation.
    #[must_use]
    pub fn is_configuration_error(&self) -> bool {
        self.category() == ErrorCategory::Configuration
    }

    /// Returns `true` if the presented token was rejected.
    #[must_use]
    pub fn is_token_error(&self) -> bool {
        self.category() == ErrorCategory::Token
    }

    /// Returns `true` if this is a revocation policy error.
    #[must_use]
    pub fn is_revocation_error(&self) -> bool {
        self.category() == ErrorCategory::Revocation
    }

    /// Returns the category of this error for logging.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAlgorithm { .. }
            | Self::SigningKeyRequired
            | Self::PrivateKeyRequired
            | Self::PublicKeyRequired
            | Self::InvalidPrivateKey { .. }
            | Self::InvalidPublicKey { .. }
            | Self::InvalidKeyType { .. }
            | Self::InvalidDuration
            | Self::InvalidMaxTokenSize
            | Self::AlgorithmCurveMismatch { .. }
            | Self::KeyGeneration { .. }
            | Self::JwksNotSupported
            | Self::InvalidJwks { .. } => ErrorCategory::Configuration,
            Self::ReservedClaim { .. } | Self::MaxSessionsExceeded | Self::Signing { .. } => {
                ErrorCategory::Issuance
            }
            Self::InvalidToken { .. }
            | Self::TokenExpired
            | Self::TokenTooLarge { .. }
            | Self::ParsingTimeout
            | Self::MissingIssuer
            | Self::MissingAudience => ErrorCategory::Token,
            Self::InvalidTokenId | Self::AlreadyRevoked | Self::NoRevocationManager => {
                ErrorCategory::Revocation
            }
            Self::RevocationFailed { .. } | Self::Credential(_) => ErrorCategory::Infrastructure,
        }
    }
}

/// Categories of JWT errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid provider configuration or key material.
    Configuration,
    /// Token issuance was refused.
    Issuance,
    /// A presented token was rejected.
    Token,
    /// Revocation policy errors.
    Revocation,
    /// Vault or backend failures.
    Infrastructure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Issuance => write!(f, "issuance"),
            Self::Token => write!(f, "token"),
            Self::Revocation => write!(f, "revocation"),
            Self::Infrastructure => write!(f, "infrastructure"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = JwtError::reserved_claim("iss");
        assert_eq!(err.to_string(), "Cannot use reserved claim: iss");

        let err = JwtError::TokenTooLarge { size: 128, max: 64 };
        assert_eq!(err.to_string(), "Token too large: 128 bytes exceeds limit of 64");

        let err = JwtError::curve_mismatch("ES256", "P-384");
        assert_eq!(err.to_string(), "Algorithm ES256 cannot be used with curve P-384");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            JwtError::SigningKeyRequired.category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            JwtError::MaxSessionsExceeded.category(),
            ErrorCategory::Issuance
        );
        assert_eq!(JwtError::TokenExpired.category(), ErrorCategory::Token);
        assert_eq!(
            JwtError::AlreadyRevoked.category(),
            ErrorCategory::Revocation
        );
        assert_eq!(
            JwtError::Credential(SecretsError::CredentialMissing).category(),
            ErrorCategory::Infrastructure
        );
    }

    #[test]
    fn test_error_predicates() {
        assert!(JwtError::InvalidDuration.is_configuration_error());
        assert!(!JwtError::InvalidDuration.is_token_error());

        assert!(JwtError::invalid_token("bad signature").is_token_error());
        assert!(JwtError::MissingAudience.is_token_error());

        assert!(JwtError::NoRevocationManager.is_revocation_error());
        assert!(!JwtError::revocation_failed("io").is_revocation_error());
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Token.to_string(), "token");
        assert_eq!(ErrorCategory::Infrastructure.to_string(), "infrastructure");
    }
}
