//! JSON Web Key Set export.

use serde::{Deserialize, Serialize};

use crate::algorithm::SigningAlgorithm;
use crate::error::{JwtError, JwtResult};
use crate::keys::{KeyMaterial, PublicComponents};

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Creates a new empty JWKS.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a key to the set.
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }

    /// Parses a key set from JSON and validates it.
    ///
    /// # Errors
    /// Returns [`JwtError::InvalidJwks`] if the JSON is malformed or the set
    /// fails [`validate`](Self::validate).
    pub fn from_json(data: &[u8]) -> JwtResult<Self> {
        let jwks: Self = serde_json::from_slice(data)
            .map_err(|e| JwtError::invalid_jwks(format!("failed to parse JWKS JSON: {e}")))?;
        jwks.validate()?;
        Ok(jwks)
    }

    /// Pretty-printed JSON form of the set.
    ///
    /// # Errors
    /// Returns [`JwtError::InvalidJwks`] if serialization fails.
    pub fn to_json(&self) -> JwtResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| JwtError::invalid_jwks(e.to_string()))
    }

    /// Checks that the set is non-empty and every key is well formed.
    ///
    /// # Errors
    /// Returns [`JwtError::InvalidJwks`] naming the first offending key.
    pub fn validate(&self) -> JwtResult<()> {
        if self.keys.is_empty() {
            return Err(JwtError::invalid_jwks("JWKS must contain at least one key"));
        }
        for (index, key) in self.keys.iter().enumerate() {
            key.validate().map_err(|e| match e {
                JwtError::InvalidJwks { message } => {
                    JwtError::invalid_jwks(format!("key at index {index}: {message}"))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

/// JSON Web Key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type ("RSA", "EC" or "OKP").
    pub kty: String,

    /// Key ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,

    /// Key use ("sig" for signing).
    #[serde(rename = "use", default)]
    pub use_: String,

    /// Algorithm.
    #[serde(default)]
    pub alg: String,

    // RSA-specific fields
    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // EC and OKP fields
    /// Curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// x coordinate, or the Ed25519 public key (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

impl Jwk {
    /// Build the verification JWK for `keys`.
    ///
    /// # Errors
    /// Returns [`JwtError::JwksNotSupported`] for HMAC keys.
    pub fn from_key_material(
        algorithm: SigningAlgorithm,
        key_id: &str,
        keys: &KeyMaterial,
    ) -> JwtResult<Self> {
        let components = keys
            .public_components()?
            .ok_or(JwtError::JwksNotSupported)?;

        let mut jwk = Jwk {
            kty: String::new(),
            kid: (!key_id.is_empty()).then(|| key_id.to_string()),
            use_: "sig".to_string(),
            alg: algorithm.as_str().to_string(),
            n: None,
            e: None,
            crv: None,
            x: None,
            y: None,
        };

        match components {
            PublicComponents::Rsa { n, e } => {
                jwk.kty = "RSA".to_string();
                jwk.n = Some(PublicComponents::b64(&n));
                jwk.e = Some(PublicComponents::b64(&e));
            }
            PublicComponents::Ec { curve, x, y } => {
                jwk.kty = "EC".to_string();
                jwk.crv = Some(curve.name().to_string());
                jwk.x = Some(PublicComponents::b64(&x));
                jwk.y = Some(PublicComponents::b64(&y));
            }
            PublicComponents::Ed { x } => {
                jwk.kty = "OKP".to_string();
                jwk.crv = Some("Ed25519".to_string());
                jwk.x = Some(PublicComponents::b64(&x));
            }
        }

        Ok(jwk)
    }

    /// Checks that the fields required by `kty` are present.
    ///
    /// RSA keys need `n` and `e`, EC keys need `crv`, `x` and `y`, and OKP
    /// keys need `crv` and `x`. Other key types are rejected.
    ///
    /// # Errors
    /// Returns [`JwtError::InvalidJwks`] describing the missing field.
    pub fn validate(&self) -> JwtResult<()> {
        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.is_empty());

        match self.kty.as_str() {
            "" => Err(JwtError::invalid_jwks("JWK must have a key type")),
            "RSA" if !(present(&self.n) && present(&self.e)) => Err(JwtError::invalid_jwks(
                "RSA JWK must have modulus and exponent",
            )),
            "EC" if !(present(&self.crv) && present(&self.x) && present(&self.y)) => Err(
                JwtError::invalid_jwks("EC JWK must have curve, x and y coordinates"),
            ),
            "OKP" if !(present(&self.crv) && present(&self.x)) => Err(JwtError::invalid_jwks(
                "OKP JWK must have curve and key value",
            )),
            "RSA" | "EC" | "OKP" => Ok(()),
            other => Err(JwtError::invalid_jwks(format!("unsupported key type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use warden_secrets::Credential;

    use super::*;
    use crate::algorithm::EcCurve;
    use crate::keys::{
        decode_private_ecdsa, decode_private_eddsa, decode_public_ecdsa, decode_public_rsa,
        derive_public_eddsa, generate_ecdsa_key_pair, generate_ed25519_key_pair,
        generate_rsa_key_pair,
    };

    fn credential(bytes: &[u8]) -> Credential {
        Credential::new(bytes).unwrap()
    }

    #[test]
    fn test_jwks_generation_rsa() {
        let pair = generate_rsa_key_pair(2048).unwrap();
        let public = decode_public_rsa(pair.public_pem.as_bytes()).unwrap();
        let keys = KeyMaterial::Rsa {
            private_key: credential(b"unused"),
            public_key: credential(&public),
        };

        let jwk = Jwk::from_key_material(SigningAlgorithm::RS256, "rsa-1", &keys).unwrap();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid.as_deref(), Some("rsa-1"));
        assert_eq!(jwk.use_, "sig");
        assert_eq!(jwk.alg, "RS256");
        assert!(jwk.n.as_deref().is_some_and(|n| !n.is_empty()));
        assert_eq!(jwk.e.as_deref(), Some("AQAB"));
        assert!(jwk.crv.is_none());

        let json = serde_json::to_string(&jwk).unwrap();
        assert!(json.contains("\"use\":\"sig\""));
    }

    #[test]
    fn test_jwks_generation_ec() {
        for curve in [EcCurve::P256, EcCurve::P384, EcCurve::P521] {
            let pair = generate_ecdsa_key_pair(curve).unwrap();
            let (_, private) = decode_private_ecdsa(pair.private_pem.as_bytes()).unwrap();
            let (_, public) = decode_public_ecdsa(pair.public_pem.as_bytes()).unwrap();
            let keys = KeyMaterial::Ecdsa {
                curve,
                private_key: credential(&private),
                public_key: credential(&public),
            };

            let jwk = Jwk::from_key_material(curve.algorithm(), "", &keys).unwrap();
            assert_eq!(jwk.kty, "EC");
            assert_eq!(jwk.kid, None);
            assert_eq!(jwk.crv.as_deref(), Some(curve.name()));
            assert!(jwk.x.is_some());
            assert!(jwk.y.is_some());
            assert!(jwk.n.is_none());
        }
    }

    #[test]
    fn test_jwks_generation_eddsa() {
        let pair = generate_ed25519_key_pair().unwrap();
        let raw = decode_private_eddsa(pair.private_pem.as_bytes()).unwrap();
        let keys = KeyMaterial::EdDsa {
            private_key: credential(&raw),
            public_key: credential(&derive_public_eddsa(&raw).unwrap()),
        };

        let jwk = Jwk::from_key_material(SigningAlgorithm::EdDSA, "ed", &keys).unwrap();
        assert_eq!(jwk.kty, "OKP");
        assert_eq!(jwk.crv.as_deref(), Some("Ed25519"));
        // 32 bytes base64url without padding
        assert_eq!(jwk.x.as_deref().map(str::len), Some(43));
        assert!(jwk.y.is_none());
    }

    #[test]
    fn test_jwks_hmac_not_supported() {
        let keys = KeyMaterial::Hmac {
            secret: credential(b"secret"),
        };
        let result = Jwk::from_key_material(SigningAlgorithm::HS256, "default", &keys);
        assert!(matches!(result, Err(JwtError::JwksNotSupported)));
    }

    fn okp_key() -> Jwk {
        Jwk {
            kty: "OKP".to_string(),
            kid: Some("ed".to_string()),
            use_: "sig".to_string(),
            alg: "EdDSA".to_string(),
            n: None,
            e: None,
            crv: Some("Ed25519".to_string()),
            x: Some("11qYAYKxCrfVS_7TyWQHOg7hcvPapiMlrwIaaPcHURo".to_string()),
            y: None,
        }
    }

    #[test]
    fn test_jwk_validation() {
        assert!(okp_key().validate().is_ok());

        let mut key = okp_key();
        key.x = Some(String::new());
        assert!(matches!(key.validate(), Err(JwtError::InvalidJwks { .. })));

        let mut key = okp_key();
        key.kty = "EC".to_string();
        let err = key.validate().unwrap_err();
        assert!(err.to_string().contains("EC JWK must have curve, x and y"));

        let mut key = okp_key();
        key.kty = "RSA".to_string();
        key.n = Some("modulus".to_string());
        assert!(key.validate().is_err());
        key.e = Some("AQAB".to_string());
        assert!(key.validate().is_ok());

        let mut key = okp_key();
        key.kty = "oct".to_string();
        let err = key.validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid JWKS: unsupported key type: oct");

        key.kty = String::new();
        assert!(key.validate().is_err());
    }

    #[test]
    fn test_jwks_validation() {
        let err = Jwks::new().validate().unwrap_err();
        assert!(err.to_string().contains("at least one key"));

        let mut jwks = Jwks::new();
        jwks.add_key(okp_key());
        let mut broken = okp_key();
        broken.crv = None;
        jwks.add_key(broken);

        let err = jwks.validate().unwrap_err();
        assert!(err.to_string().contains("key at index 1"));
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_jwks_json() {
        let pair = generate_ecdsa_key_pair(EcCurve::P256).unwrap();
        let (_, private) = decode_private_ecdsa(pair.private_pem.as_bytes()).unwrap();
        let (_, public) = decode_public_ecdsa(pair.public_pem.as_bytes()).unwrap();
        let keys = KeyMaterial::Ecdsa {
            curve: EcCurve::P256,
            private_key: credential(&private),
            public_key: credential(&public),
        };

        let mut jwks = Jwks::new();
        jwks.add_key(Jwk::from_key_material(SigningAlgorithm::ES256, "ec-1", &keys).unwrap());
        jwks.add_key(okp_key());

        let json = jwks.to_json().unwrap();
        assert!(json.contains("\n  \"keys\": ["));
        assert_eq!(Jwks::from_json(json.as_bytes()).unwrap(), jwks);

        assert!(matches!(
            Jwks::from_json(b"{\"keys\": []}"),
            Err(JwtError::InvalidJwks { .. })
        ));
        let minimal = br#"{"keys":[{"kty":"RSA","n":"sXch","e":"AQAB"}]}"#;
        let parsed = Jwks::from_json(minimal).unwrap();
        assert_eq!(parsed.keys[0].use_, "");
        assert_eq!(parsed.keys[0].kid, None);

        let err = Jwks::from_json(b"not json").unwrap_err();
        assert!(err.to_string().contains("failed to parse JWKS JSON"));
    }

    #[test]
    fn test_jwks_set() {
        let mut jwks = Jwks::new();
        assert!(jwks.keys.is_empty());

        jwks.add_key(Jwk {
            kty: "OKP".to_string(),
            kid: None,
            use_: "sig".to_string(),
            alg: "EdDSA".to_string(),
            n: None,
            e: None,
            crv: Some("Ed25519".to_string()),
            x: Some("abc".to_string()),
            y: None,
        });

        let json = serde_json::to_value(&jwks).unwrap();
        assert_eq!(json["keys"][0]["crv"], "Ed25519");
        assert!(json["keys"][0].get("kid").is_none());
    }
}
