//! JWS compact serialization.
//!
//! Signing and verification for every supported algorithm. Keys are pulled
//! out of the vault per call and never cached. Everything except ES512 goes
//! through `jsonwebtoken`; ES512 is implemented on top of `p521` because
//! `jsonwebtoken` has no P-521 support.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use pkcs8::{DecodePrivateKey, EncodePrivateKey, LineEnding};
use rsa::RsaPrivateKey;

use crate::algorithm::SigningAlgorithm;
use crate::claims::Claims;
use crate::error::{JwtError, JwtResult};
use crate::keys::{ED25519_PRIVATE_KEY_LENGTH, KeyMaterial, PublicComponents};

/// Sign `claims` with `keys` under `algorithm`, adding `kid` when non-empty.
pub(crate) fn sign(
    algorithm: SigningAlgorithm,
    key_id: &str,
    keys: &KeyMaterial,
    claims: &Claims,
) -> JwtResult<String> {
    let Some(alg) = algorithm.to_jwt_algorithm() else {
        return es512::sign(key_id, keys, claims);
    };

    let mut header = Header::new(alg);
    if !key_id.is_empty() {
        header.kid = Some(key_id.to_string());
    }

    let key = encoding_key(keys)?;
    encode(&header, claims, &key).map_err(|e| JwtError::signing(e.to_string()))
}

/// Verify `token` under the pinned `algorithm` and return its claims.
///
/// The header `alg` must equal `algorithm`; expired tokens yield
/// [`JwtError::TokenExpired`], every other failure [`JwtError::InvalidToken`].
pub(crate) fn verify(
    algorithm: SigningAlgorithm,
    keys: &KeyMaterial,
    token: &str,
) -> JwtResult<Claims> {
    let Some(alg) = algorithm.to_jwt_algorithm() else {
        return es512::verify(keys, token);
    };

    let header = decode_header(token).map_err(|e| JwtError::invalid_token(e.to_string()))?;
    if header.alg != alg {
        return Err(JwtError::invalid_token(format!(
            "unexpected signing method: {:?}",
            header.alg
        )));
    }

    let key = decoding_key(keys)?;
    let mut validation = Validation::new(alg);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.validate_aud = false; // audience checked by the provider
    validation.required_spec_claims.clear();

    decode::<Claims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::TokenExpired,
            _ => JwtError::invalid_token(err.to_string()),
        })
}

fn encoding_key(keys: &KeyMaterial) -> JwtResult<EncodingKey> {
    match keys {
        KeyMaterial::Hmac { secret } => Ok(EncodingKey::from_secret(&secret.bytes()?)),
        KeyMaterial::Rsa { private_key, .. } => {
            let der = private_key.bytes()?;
            let pem = RsaPrivateKey::from_pkcs8_der(&der)
                .and_then(|key| key.to_pkcs8_pem(LineEnding::LF))
                .map_err(|e| JwtError::signing(e.to_string()))?;
            EncodingKey::from_rsa_pem(pem.as_bytes()).map_err(|e| JwtError::signing(e.to_string()))
        }
        KeyMaterial::Ecdsa { private_key, .. } => Ok(EncodingKey::from_ec_der(&private_key.bytes()?)),
        KeyMaterial::EdDsa { private_key, .. } => {
            let raw = private_key.bytes()?;
            let raw: &[u8; ED25519_PRIVATE_KEY_LENGTH] = raw
                .as_slice()
                .try_into()
                .map_err(|_| JwtError::signing("Ed25519 private key has the wrong length"))?;
            let document = ed25519_dalek::SigningKey::from_keypair_bytes(raw)
                .map_err(|e| JwtError::signing(e.to_string()))?
                .to_pkcs8_der()
                .map_err(|e| JwtError::signing(e.to_string()))?;
            Ok(EncodingKey::from_ed_der(document.as_bytes()))
        }
    }
}

fn decoding_key(keys: &KeyMaterial) -> JwtResult<DecodingKey> {
    if let KeyMaterial::Hmac { secret } = keys {
        return Ok(DecodingKey::from_secret(&secret.bytes()?));
    }

    match keys.public_components()? {
        Some(PublicComponents::Rsa { n, e }) => Ok(DecodingKey::from_rsa_raw_components(&n, &e)),
        Some(PublicComponents::Ec { x, y, .. }) => DecodingKey::from_ec_components(
            &PublicComponents::b64(&x),
            &PublicComponents::b64(&y),
        )
        .map_err(|e| JwtError::invalid_public_key(e.to_string())),
        Some(PublicComponents::Ed { x }) => {
            DecodingKey::from_ed_components(&PublicComponents::b64(&x))
                .map_err(|e| JwtError::invalid_public_key(e.to_string()))
        }
        None => Err(JwtError::PublicKeyRequired),
    }
}

fn b64_decode(part: &str) -> JwtResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|e| JwtError::invalid_token(e.to_string()))
}

mod es512 {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    use elliptic_curve::sec1::ToEncodedPoint;
    use p521::ecdsa::signature::{Signer, Verifier};
    use p521::ecdsa::{Signature, SigningKey, VerifyingKey};
    use pkcs8::{DecodePrivateKey, DecodePublicKey};
    use serde::{Deserialize, Serialize};
    use time::OffsetDateTime;

    use super::b64_decode;
    use crate::claims::Claims;
    use crate::error::{JwtError, JwtResult};
    use crate::keys::KeyMaterial;

    const ALG: &str = "ES512";

    #[derive(Serialize, Deserialize)]
    struct Es512Header {
        alg: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        typ: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        kid: Option<String>,
    }

    pub(super) fn sign(key_id: &str, keys: &KeyMaterial, claims: &Claims) -> JwtResult<String> {
        let KeyMaterial::Ecdsa { private_key, .. } = keys else {
            return Err(JwtError::invalid_key_type("ES512 requires an ECDSA P-521 key"));
        };

        let header = Es512Header {
            alg: ALG.to_string(),
            typ: Some("JWT".to_string()),
            kid: (!key_id.is_empty()).then(|| key_id.to_string()),
        };
        let header = serde_json::to_vec(&header).map_err(|e| JwtError::signing(e.to_string()))?;
        let payload = serde_json::to_vec(claims).map_err(|e| JwtError::signing(e.to_string()))?;
        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header),
            URL_SAFE_NO_PAD.encode(payload)
        );

        let der = private_key.bytes()?;
        let secret =
            p521::SecretKey::from_pkcs8_der(&der).map_err(|e| JwtError::signing(e.to_string()))?;
        let signing_key =
            SigningKey::from_bytes(&secret.to_bytes()).map_err(|e| JwtError::signing(e.to_string()))?;
        let signature: Signature = signing_key.sign(signing_input.as_bytes());

        Ok(format!(
            "{signing_input}.{}",
            URL_SAFE_NO_PAD.encode(signature.to_bytes())
        ))
    }

    pub(super) fn verify(keys: &KeyMaterial, token: &str) -> JwtResult<Claims> {
        let KeyMaterial::Ecdsa { public_key, .. } = keys else {
            return Err(JwtError::invalid_key_type("ES512 requires an ECDSA P-521 key"));
        };

        let mut parts = token.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(JwtError::invalid_token("token must have three segments"));
        };

        let header: Es512Header = serde_json::from_slice(&b64_decode(header_b64)?)
            .map_err(|e| JwtError::invalid_token(e.to_string()))?;
        if header.alg != ALG {
            return Err(JwtError::invalid_token(format!(
                "unexpected signing method: {}",
                header.alg
            )));
        }

        let der = public_key.bytes()?;
        let public = p521::PublicKey::from_public_key_der(&der)
            .map_err(|e| JwtError::invalid_public_key(e.to_string()))?;
        let verifying_key = VerifyingKey::from_encoded_point(&public.to_encoded_point(false))
            .map_err(|e| JwtError::invalid_public_key(e.to_string()))?;

        let signature = Signature::from_slice(&b64_decode(signature_b64)?)
            .map_err(|e| JwtError::invalid_token(e.to_string()))?;
        let signing_input = &token[..header_b64.len() + 1 + payload_b64.len()];
        verifying_key
            .verify(signing_input.as_bytes(), &signature)
            .map_err(|_| JwtError::invalid_token("InvalidSignature"))?;

        let claims: Claims = serde_json::from_slice(&b64_decode(payload_b64)?)
            .map_err(|e| JwtError::invalid_token(e.to_string()))?;

        let now = OffsetDateTime::now_utc().unix_timestamp();
        if claims.exp.is_some_and(|exp| exp < now) {
            return Err(JwtError::TokenExpired);
        }
        if claims.nbf.is_some_and(|nbf| nbf > now) {
            return Err(JwtError::invalid_token("ImmatureSignature"));
        }
        Ok(claims)
    }
}
