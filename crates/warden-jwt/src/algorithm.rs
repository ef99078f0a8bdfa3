//! Signing algorithms and elliptic curves.

use std::fmt;
use std::str::FromStr;

use jsonwebtoken::Algorithm;

use crate::error::JwtError;

/// Supported JWS signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
    /// RSASSA-PKCS1-v1_5 with SHA-256.
    RS256,
    /// RSASSA-PKCS1-v1_5 with SHA-384.
    RS384,
    /// RSASSA-PKCS1-v1_5 with SHA-512.
    RS512,
    /// ECDSA with P-256 and SHA-256.
    ES256,
    /// ECDSA with P-384 and SHA-384.
    ES384,
    /// ECDSA with P-521 and SHA-512.
    ES512,
    /// Ed25519.
    EdDSA,
}

impl SigningAlgorithm {
    /// All supported algorithms.
    pub const ALL: [SigningAlgorithm; 10] = [
        Self::HS256,
        Self::HS384,
        Self::HS512,
        Self::RS256,
        Self::RS384,
        Self::RS512,
        Self::ES256,
        Self::ES384,
        Self::ES512,
        Self::EdDSA,
    ];

    /// Converts to the `jsonwebtoken` Algorithm type.
    ///
    /// Returns `None` for ES512, which `jsonwebtoken` does not implement and
    /// is signed through a dedicated P-521 path.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Option<Algorithm> {
        match self {
            Self::HS256 => Some(Algorithm::HS256),
            Self::HS384 => Some(Algorithm::HS384),
            Self::HS512 => Some(Algorithm::HS512),
            Self::RS256 => Some(Algorithm::RS256),
            Self::RS384 => Some(Algorithm::RS384),
            Self::RS512 => Some(Algorithm::RS512),
            Self::ES256 => Some(Algorithm::ES256),
            Self::ES384 => Some(Algorithm::ES384),
            Self::ES512 => None,
            Self::EdDSA => Some(Algorithm::EdDSA),
        }
    }

    /// Returns the algorithm name as used in JWK/JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::RS512 => "RS512",
            Self::ES256 => "ES256",
            Self::ES384 => "ES384",
            Self::ES512 => "ES512",
            Self::EdDSA => "EdDSA",
        }
    }

    /// Returns `true` if this is a shared-secret algorithm.
    #[must_use]
    pub fn is_hmac(&self) -> bool {
        matches!(self, Self::HS256 | Self::HS384 | Self::HS512)
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384 | Self::RS512)
    }

    /// Returns `true` if this is an ECDSA-based algorithm.
    #[must_use]
    pub fn is_ecdsa(&self) -> bool {
        matches!(self, Self::ES256 | Self::ES384 | Self::ES512)
    }

    /// Returns `true` if this is EdDSA.
    #[must_use]
    pub fn is_eddsa(&self) -> bool {
        matches!(self, Self::EdDSA)
    }

    /// The curve an ECDSA algorithm is bound to.
    #[must_use]
    pub fn curve(&self) -> Option<EcCurve> {
        match self {
            Self::ES256 => Some(EcCurve::P256),
            Self::ES384 => Some(EcCurve::P384),
            Self::ES512 => Some(EcCurve::P521),
            _ => None,
        }
    }
}

impl FromStr for SigningAlgorithm {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|alg| alg.as_str() == s)
            .ok_or_else(|| JwtError::invalid_algorithm(s))
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// NIST curves accepted for ECDSA keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EcCurve {
    P256,
    P384,
    P521,
}

impl EcCurve {
    /// JWK curve name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::P256 => "P-256",
            Self::P384 => "P-384",
            Self::P521 => "P-521",
        }
    }

    /// The ECDSA algorithm that signs with this curve.
    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        match self {
            Self::P256 => SigningAlgorithm::ES256,
            Self::P384 => SigningAlgorithm::ES384,
            Self::P521 => SigningAlgorithm::ES512,
        }
    }
}

impl FromStr for EcCurve {
    type Err = JwtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "P-256" | "P256" => Ok(Self::P256),
            "P-384" | "P384" => Ok(Self::P384),
            "P-521" | "P521" => Ok(Self::P521),
            _ => Err(JwtError::invalid_key_type(format!("unsupported curve {s}"))),
        }
    }
}

impl fmt::Display for EcCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_all_algorithms() {
        for alg in SigningAlgorithm::ALL {
            let parsed: SigningAlgorithm = alg.as_str().parse().unwrap();
            assert_eq!(parsed, alg);
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!(matches!(
            "hs256".parse::<SigningAlgorithm>(),
            Err(JwtError::InvalidAlgorithm { .. })
        ));
        assert!("none".parse::<SigningAlgorithm>().is_err());
        assert!("".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn test_signing_algorithm_properties() {
        assert!(SigningAlgorithm::HS384.is_hmac());
        assert!(SigningAlgorithm::RS512.is_rsa());
        assert!(SigningAlgorithm::ES512.is_ecdsa());
        assert!(SigningAlgorithm::EdDSA.is_eddsa());
        assert!(!SigningAlgorithm::EdDSA.is_ecdsa());

        assert_eq!(SigningAlgorithm::ES256.curve(), Some(EcCurve::P256));
        assert_eq!(SigningAlgorithm::ES512.curve(), Some(EcCurve::P521));
        assert_eq!(SigningAlgorithm::RS256.curve(), None);

        assert_eq!(SigningAlgorithm::ES512.to_jwt_algorithm(), None);
        assert_eq!(
            SigningAlgorithm::EdDSA.to_jwt_algorithm(),
            Some(Algorithm::EdDSA)
        );
    }

    #[test]
    fn test_curves() {
        assert_eq!("p-384".parse::<EcCurve>().unwrap(), EcCurve::P384);
        assert_eq!("P521".parse::<EcCurve>().unwrap(), EcCurve::P521);
        assert!("secp256k1".parse::<EcCurve>().is_err());

        for curve in [EcCurve::P256, EcCurve::P384, EcCurve::P521] {
            assert_eq!(curve.algorithm().curve(), Some(curve));
        }
        assert_eq!(EcCurve::P256.to_string(), "P-256");
    }
}
