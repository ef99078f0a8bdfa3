//! Key codec.
//!
//! Decodes PEM-wrapped PKCS#8 private keys and PKIX (SPKI) public keys for the
//! asymmetric algorithm families and normalizes them to the byte forms kept in
//! the credential vault:
//!
//! | Family  | Private                    | Public               |
//! |---------|----------------------------|----------------------|
//! | RSA     | PKCS#8 DER                 | SPKI DER             |
//! | ECDSA   | PKCS#8 DER                 | SPKI DER             |
//! | Ed25519 | 64 raw bytes (seed ‖ pub)  | 32 raw bytes         |
//!
//! Bad PEM or DER yields `InvalidPrivateKey` / `InvalidPublicKey`; a well-formed
//! key of the wrong family yields `InvalidKeyType`.
//!
//! The generation helpers at the bottom are used by the CLI and tests; they
//! refuse RSA moduli shorter than [`MIN_RSA_BITS`].

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use elliptic_curve::sec1::ToEncodedPoint;
use pkcs8::der::{Document, SecretDocument};
use pkcs8::spki::SubjectPublicKeyInfoRef;
use pkcs8::{
    DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding,
    ObjectIdentifier, PrivateKeyInfo,
};
use rand::rngs::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use warden_secrets::Credential;
use zeroize::Zeroizing;

use crate::algorithm::EcCurve;
use crate::error::{JwtError, JwtResult};

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP256R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");
const ED25519: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";
const PUBLIC_KEY_LABEL: &str = "PUBLIC KEY";

/// Length of a raw Ed25519 private key (32-byte seed followed by the public key).
pub const ED25519_PRIVATE_KEY_LENGTH: usize = 64;

/// Smallest RSA modulus accepted by [`generate_rsa_key_pair`].
pub const MIN_RSA_BITS: usize = 2048;

// ============================================================================
// Key Material
// ============================================================================

/// Resolved key material, tagged by algorithm family.
///
/// Every field is sealed in the vault; plaintext is only produced per
/// operation.
#[derive(Debug, Clone)]
pub enum KeyMaterial {
    /// Shared secret for HS256/HS384/HS512.
    Hmac { secret: Credential },
    /// PKCS#8 DER private key and SPKI DER public key.
    Rsa {
        private_key: Credential,
        public_key: Credential,
    },
    /// PKCS#8 DER private key and SPKI DER public key on `curve`.
    Ecdsa {
        curve: EcCurve,
        private_key: Credential,
        public_key: Credential,
    },
    /// Raw 64-byte private key and raw 32-byte public key.
    EdDsa {
        private_key: Credential,
        public_key: Credential,
    },
}

impl KeyMaterial {
    /// Short family name used in log fields.
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            Self::Hmac { .. } => "hmac",
            Self::Rsa { .. } => "rsa",
            Self::Ecdsa { .. } => "ecdsa",
            Self::EdDsa { .. } => "eddsa",
        }
    }

    /// Extract the public components used for verification and JWKS export.
    ///
    /// Returns `None` for HMAC, which has no public half.
    pub(crate) fn public_components(&self) -> JwtResult<Option<PublicComponents>> {
        match self {
            Self::Hmac { .. } => Ok(None),
            Self::Rsa { public_key, .. } => {
                let der = public_key.bytes()?;
                let key = RsaPublicKey::from_public_key_der(&der)
                    .map_err(|e| JwtError::invalid_public_key(e.to_string()))?;
                Ok(Some(PublicComponents::Rsa {
                    n: key.n().to_bytes_be(),
                    e: key.e().to_bytes_be(),
                }))
            }
            Self::Ecdsa {
                curve, public_key, ..
            } => {
                let der = public_key.bytes()?;
                let (x, y) = ec_coordinates(*curve, &der)?;
                Ok(Some(PublicComponents::Ec {
                    curve: *curve,
                    x,
                    y,
                }))
            }
            Self::EdDsa { public_key, .. } => Ok(Some(PublicComponents::Ed {
                x: public_key.bytes()?.to_vec(),
            })),
        }
    }
}

/// Public key parameters in the form JWK and `jsonwebtoken` consume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PublicComponents {
    Rsa { n: Vec<u8>, e: Vec<u8> },
    Ec { curve: EcCurve, x: Vec<u8>, y: Vec<u8> },
    Ed { x: Vec<u8> },
}

impl PublicComponents {
    pub(crate) fn b64(bytes: &[u8]) -> String {
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

// ============================================================================
// PEM framing
// ============================================================================

fn private_key_info(data: &[u8]) -> JwtResult<SecretDocument> {
    let pem = std::str::from_utf8(data)
        .map_err(|_| JwtError::invalid_private_key("PEM data is not valid UTF-8"))?;
    let (label, document) =
        SecretDocument::from_pem(pem).map_err(|e| JwtError::invalid_private_key(e.to_string()))?;
    if label != PRIVATE_KEY_LABEL {
        return Err(JwtError::invalid_private_key(format!(
            "expected a PKCS#8 \"{PRIVATE_KEY_LABEL}\" block, found \"{label}\""
        )));
    }
    Ok(document)
}

fn public_key_info(data: &[u8]) -> JwtResult<Document> {
    let pem = std::str::from_utf8(data)
        .map_err(|_| JwtError::invalid_public_key("PEM data is not valid UTF-8"))?;
    let (label, document) =
        Document::from_pem(pem).map_err(|e| JwtError::invalid_public_key(e.to_string()))?;
    if label != PUBLIC_KEY_LABEL {
        return Err(JwtError::invalid_public_key(format!(
            "expected a PKIX \"{PUBLIC_KEY_LABEL}\" block, found \"{label}\""
        )));
    }
    Ok(document)
}

fn private_algorithm(der: &[u8]) -> JwtResult<(ObjectIdentifier, Option<ObjectIdentifier>)> {
    let info =
        PrivateKeyInfo::try_from(der).map_err(|e| JwtError::invalid_private_key(e.to_string()))?;
    Ok((info.algorithm.oid, info.algorithm.parameters_oid().ok()))
}

fn public_algorithm(der: &[u8]) -> JwtResult<(ObjectIdentifier, Option<ObjectIdentifier>)> {
    let info = SubjectPublicKeyInfoRef::try_from(der)
        .map_err(|e| JwtError::invalid_public_key(e.to_string()))?;
    Ok((info.algorithm.oid, info.algorithm.parameters_oid().ok()))
}

fn curve_from_oid(oid: Option<ObjectIdentifier>) -> JwtResult<EcCurve> {
    let oid = oid.ok_or_else(|| JwtError::invalid_key_type("ECDSA key without named curve"))?;
    if oid == SECP256R1 {
        Ok(EcCurve::P256)
    } else if oid == SECP384R1 {
        Ok(EcCurve::P384)
    } else if oid == SECP521R1 {
        Ok(EcCurve::P521)
    } else {
        Err(JwtError::invalid_key_type(format!(
            "unsupported ECDSA curve {oid}"
        )))
    }
}

// ============================================================================
// RSA
// ============================================================================

/// Decode a PEM PKCS#8 RSA private key to PKCS#8 DER.
pub fn decode_private_rsa(data: &[u8]) -> JwtResult<Zeroizing<Vec<u8>>> {
    let document = private_key_info(data)?;
    let (oid, _) = private_algorithm(document.as_bytes())?;
    if oid != RSA_ENCRYPTION {
        return Err(JwtError::invalid_key_type("private key is not an RSA key"));
    }

    RsaPrivateKey::from_pkcs8_der(document.as_bytes())
        .map_err(|e| JwtError::invalid_private_key(e.to_string()))?;
    Ok(Zeroizing::new(document.as_bytes().to_vec()))
}

/// Decode a PEM PKIX RSA public key to SPKI DER.
pub fn decode_public_rsa(data: &[u8]) -> JwtResult<Vec<u8>> {
    let document = public_key_info(data)?;
    let (oid, _) = public_algorithm(document.as_bytes())?;
    if oid != RSA_ENCRYPTION {
        return Err(JwtError::invalid_key_type("public key is not an RSA key"));
    }

    RsaPublicKey::from_public_key_der(document.as_bytes())
        .map_err(|e| JwtError::invalid_public_key(e.to_string()))?;
    Ok(document.as_bytes().to_vec())
}

// ============================================================================
// ECDSA
// ============================================================================

/// Decode a PEM PKCS#8 ECDSA private key to PKCS#8 DER, returning its curve.
pub fn decode_private_ecdsa(data: &[u8]) -> JwtResult<(EcCurve, Zeroizing<Vec<u8>>)> {
    let document = private_key_info(data)?;
    let der = document.as_bytes();
    let (oid, params) = private_algorithm(der)?;
    if oid != EC_PUBLIC_KEY {
        return Err(JwtError::invalid_key_type("private key is not an ECDSA key"));
    }
    let curve = curve_from_oid(params)?;

    let parsed = match curve {
        EcCurve::P256 => p256::SecretKey::from_pkcs8_der(der).map(drop),
        EcCurve::P384 => p384::SecretKey::from_pkcs8_der(der).map(drop),
        EcCurve::P521 => p521::SecretKey::from_pkcs8_der(der).map(drop),
    };
    parsed.map_err(|e| JwtError::invalid_private_key(e.to_string()))?;

    Ok((curve, Zeroizing::new(der.to_vec())))
}

/// Decode a PEM PKIX ECDSA public key to SPKI DER, returning its curve.
pub fn decode_public_ecdsa(data: &[u8]) -> JwtResult<(EcCurve, Vec<u8>)> {
    let document = public_key_info(data)?;
    let der = document.as_bytes();
    let (oid, params) = public_algorithm(der)?;
    if oid != EC_PUBLIC_KEY {
        return Err(JwtError::invalid_key_type("public key is not an ECDSA key"));
    }
    let curve = curve_from_oid(params)?;

    ec_coordinates(curve, der)?;
    Ok((curve, der.to_vec()))
}

/// Derive the SPKI DER public key of a PKCS#8 DER ECDSA private key.
pub fn derive_public_ecdsa(curve: EcCurve, private_der: &[u8]) -> JwtResult<Vec<u8>> {
    let document = match curve {
        EcCurve::P256 => p256::SecretKey::from_pkcs8_der(private_der)
            .map_err(|e| JwtError::invalid_private_key(e.to_string()))?
            .public_key()
            .to_public_key_der(),
        EcCurve::P384 => p384::SecretKey::from_pkcs8_der(private_der)
            .map_err(|e| JwtError::invalid_private_key(e.to_string()))?
            .public_key()
            .to_public_key_der(),
        EcCurve::P521 => p521::SecretKey::from_pkcs8_der(private_der)
            .map_err(|e| JwtError::invalid_private_key(e.to_string()))?
            .public_key()
            .to_public_key_der(),
    };
    document
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|e| JwtError::invalid_public_key(e.to_string()))
}

/// Uncompressed affine coordinates of an SPKI DER public key.
fn ec_coordinates(curve: EcCurve, spki_der: &[u8]) -> JwtResult<(Vec<u8>, Vec<u8>)> {
    let point = match curve {
        EcCurve::P256 => p256::PublicKey::from_public_key_der(spki_der)
            .map(|key| key.to_encoded_point(false).as_bytes().to_vec()),
        EcCurve::P384 => p384::PublicKey::from_public_key_der(spki_der)
            .map(|key| key.to_encoded_point(false).as_bytes().to_vec()),
        EcCurve::P521 => p521::PublicKey::from_public_key_der(spki_der)
            .map(|key| key.to_encoded_point(false).as_bytes().to_vec()),
    }
    .map_err(|e| JwtError::invalid_public_key(e.to_string()))?;

    // 0x04 || X || Y
    let coordinate_len = (point.len() - 1) / 2;
    let (x, y) = point[1..].split_at(coordinate_len);
    Ok((x.to_vec(), y.to_vec()))
}

// ============================================================================
// Ed25519
// ============================================================================

/// Decode an Ed25519 private key to its 64-byte raw form.
///
/// Accepts either PEM PKCS#8 or the raw 64-byte key itself.
pub fn decode_private_eddsa(data: &[u8]) -> JwtResult<Zeroizing<Vec<u8>>> {
    if data.len() == ED25519_PRIVATE_KEY_LENGTH && !data.starts_with(b"-----") {
        let mut raw = Zeroizing::new([0u8; ED25519_PRIVATE_KEY_LENGTH]);
        raw.copy_from_slice(data);
        let key = ed25519_dalek::SigningKey::from_keypair_bytes(&raw)
            .map_err(|e| JwtError::invalid_private_key(e.to_string()))?;
        return Ok(Zeroizing::new(key.to_keypair_bytes().to_vec()));
    }

    let document = private_key_info(data)?;
    let (oid, _) = private_algorithm(document.as_bytes())?;
    if oid != ED25519 {
        return Err(JwtError::invalid_key_type("private key is not an Ed25519 key"));
    }

    let key = ed25519_dalek::SigningKey::from_pkcs8_der(document.as_bytes())
        .map_err(|e| JwtError::invalid_private_key(e.to_string()))?;
    Ok(Zeroizing::new(key.to_keypair_bytes().to_vec()))
}

/// Decode a PEM PKIX Ed25519 public key to its 32 raw bytes.
pub fn decode_public_eddsa(data: &[u8]) -> JwtResult<Vec<u8>> {
    let document = public_key_info(data)?;
    let (oid, _) = public_algorithm(document.as_bytes())?;
    if oid != ED25519 {
        return Err(JwtError::invalid_key_type("public key is not an Ed25519 key"));
    }

    let key = ed25519_dalek::VerifyingKey::from_public_key_der(document.as_bytes())
        .map_err(|e| JwtError::invalid_public_key(e.to_string()))?;
    Ok(key.to_bytes().to_vec())
}

/// The public half of a raw 64-byte Ed25519 private key.
pub fn derive_public_eddsa(private_key: &[u8]) -> JwtResult<Vec<u8>> {
    if private_key.len() != ED25519_PRIVATE_KEY_LENGTH {
        return Err(JwtError::invalid_private_key(format!(
            "Ed25519 private key must be {ED25519_PRIVATE_KEY_LENGTH} bytes"
        )));
    }
    Ok(private_key[32..].to_vec())
}

// ============================================================================
// Key Generation
// ============================================================================

/// A freshly generated key pair in PEM form.
pub struct PemKeyPair {
    /// PKCS#8 `PRIVATE KEY` block.
    pub private_pem: Zeroizing<String>,
    /// PKIX `PUBLIC KEY` block.
    pub public_pem: String,
}

/// Generates an RSA key pair with a modulus of `bits` bits.
///
/// # Errors
/// Returns an error if `bits` is below [`MIN_RSA_BITS`] or generation fails.
pub fn generate_rsa_key_pair(bits: usize) -> JwtResult<PemKeyPair> {
    if bits < MIN_RSA_BITS {
        return Err(JwtError::key_generation(format!(
            "RSA keys must be at least {MIN_RSA_BITS} bits, got {bits}"
        )));
    }

    let private_key = RsaPrivateKey::new(&mut OsRng, bits)
        .map_err(|e| JwtError::key_generation(e.to_string()))?;
    let private_pem = private_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| JwtError::key_generation(e.to_string()))?;
    let public_pem = private_key
        .to_public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| JwtError::key_generation(e.to_string()))?;

    Ok(PemKeyPair {
        private_pem,
        public_pem,
    })
}

/// Generates an ECDSA key pair on `curve`.
///
/// # Errors
/// Returns an error if PEM encoding fails.
pub fn generate_ecdsa_key_pair(curve: EcCurve) -> JwtResult<PemKeyPair> {
    let (private_pem, public_pem) = match curve {
        EcCurve::P256 => {
            let secret = p256::SecretKey::random(&mut OsRng);
            (
                secret.to_pkcs8_pem(LineEnding::LF),
                secret.public_key().to_public_key_pem(LineEnding::LF),
            )
        }
        EcCurve::P384 => {
            let secret = p384::SecretKey::random(&mut OsRng);
            (
                secret.to_pkcs8_pem(LineEnding::LF),
                secret.public_key().to_public_key_pem(LineEnding::LF),
            )
        }
        EcCurve::P521 => {
            let secret = p521::SecretKey::random(&mut OsRng);
            (
                secret.to_pkcs8_pem(LineEnding::LF),
                secret.public_key().to_public_key_pem(LineEnding::LF),
            )
        }
    };

    Ok(PemKeyPair {
        private_pem: private_pem.map_err(|e| JwtError::key_generation(e.to_string()))?,
        public_pem: public_pem.map_err(|e| JwtError::key_generation(e.to_string()))?,
    })
}

/// Generates an Ed25519 key pair.
///
/// # Errors
/// Returns an error if PEM encoding fails.
pub fn generate_ed25519_key_pair() -> JwtResult<PemKeyPair> {
    let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| JwtError::key_generation(e.to_string()))?;
    let public_pem = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| JwtError::key_generation(e.to_string()))?;

    Ok(PemKeyPair {
        private_pem,
        public_pem,
    })
}
