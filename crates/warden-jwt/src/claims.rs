//! Token claims.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

/// Claim names custom data may not use.
///
/// Besides the registered claims this includes `typ` and `alg` so data can
/// never shadow header fields. Matching is case-insensitive.
pub const RESERVED_CLAIMS: [&str; 9] = ["iss", "sub", "aud", "exp", "nbf", "iat", "jti", "typ", "alg"];

/// Data key holding the nanosecond timestamp of the last rotation.
pub const ROTATED_AT_KEY: &str = "_rotated_at";

/// Data key holding the number of rotations a token has been through.
pub const ROTATION_COUNT_KEY: &str = "_rotation_count";

/// Returns `true` if `key` collides with a reserved claim name.
#[must_use]
pub fn is_reserved_claim(key: &str) -> bool {
    RESERVED_CLAIMS
        .iter()
        .any(|claim| claim.eq_ignore_ascii_case(key))
}

/// Registered claims plus an opaque data map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iss: String,

    /// Subject.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,

    /// Audience. Accepts a single string or a list when decoding.
    #[serde(
        default,
        deserialize_with = "deserialize_audience",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub aud: Vec<String>,

    /// Expiration time (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Not before (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Issued at (Unix timestamp).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// JWT ID, the revocation key.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jti: String,

    /// Caller supplied data.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl Claims {
    /// Expiration as a timestamp, if present and representable.
    #[must_use]
    pub fn expires_at(&self) -> Option<OffsetDateTime> {
        self.exp
            .and_then(|exp| OffsetDateTime::from_unix_timestamp(exp).ok())
    }

    /// Issue time as a timestamp, if present and representable.
    #[must_use]
    pub fn issued_at(&self) -> Option<OffsetDateTime> {
        self.iat
            .and_then(|iat| OffsetDateTime::from_unix_timestamp(iat).ok())
    }

    /// Returns `true` if `audience` is one of the token's audiences.
    #[must_use]
    pub fn has_audience(&self, audience: &str) -> bool {
        self.aud.iter().any(|aud| aud == audience)
    }

    /// Number of rotations recorded in `data`.
    ///
    /// Integer and floating point values are both accepted since JSON
    /// decoders may widen either way; anything else counts as zero.
    #[must_use]
    pub fn rotation_count(&self) -> u64 {
        match self.data.get(ROTATION_COUNT_KEY) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
                .unwrap_or(0),
            _ => 0,
        }
    }
}

fn deserialize_audience<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(aud)) => vec![aud],
        Some(OneOrMany::Many(aud)) => aud,
        None => Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_reserved_claims() {
        for claim in RESERVED_CLAIMS {
            assert!(is_reserved_claim(claim));
        }
        assert!(is_reserved_claim("ISS"));
        assert!(is_reserved_claim("Alg"));
        assert!(!is_reserved_claim("user_id"));
        assert!(!is_reserved_claim("issuer"));
        assert!(!is_reserved_claim(ROTATION_COUNT_KEY));
    }

    #[test]
    fn test_claims_serialization() {
        let mut claims = Claims {
            iss: "blueprint".to_string(),
            sub: "session-123".to_string(),
            aud: vec!["api".to_string()],
            exp: Some(1_700_000_060),
            nbf: Some(1_700_000_000),
            iat: Some(1_700_000_000),
            jti: "abc".to_string(),
            data: Map::new(),
        };
        claims
            .data
            .insert("user_id".to_string(), json!("test-user"));

        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["aud"], json!(["api"]));
        assert_eq!(json["data"]["user_id"], json!("test-user"));

        let decoded: Claims = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn test_empty_fields_are_omitted() {
        let json = serde_json::to_string(&Claims::default()).unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn test_audience_accepts_string() {
        let claims: Claims = serde_json::from_value(json!({"aud": "api"})).unwrap();
        assert_eq!(claims.aud, vec!["api".to_string()]);
        assert!(claims.has_audience("api"));

        let claims: Claims = serde_json::from_value(json!({"aud": null})).unwrap();
        assert!(claims.aud.is_empty());
    }

    #[test]
    fn test_rotation_count() {
        let mut claims = Claims::default();
        assert_eq!(claims.rotation_count(), 0);

        claims.data.insert(ROTATION_COUNT_KEY.to_string(), json!(3));
        assert_eq!(claims.rotation_count(), 3);

        claims.data.insert(ROTATION_COUNT_KEY.to_string(), json!(4.0));
        assert_eq!(claims.rotation_count(), 4);

        claims.data.insert(ROTATION_COUNT_KEY.to_string(), json!("5"));
        assert_eq!(claims.rotation_count(), 0);
    }

    #[test]
    fn test_timestamps() {
        let claims = Claims {
            exp: Some(1_700_000_060),
            iat: Some(1_700_000_000),
            ..Default::default()
        };
        assert_eq!(
            claims.expires_at().map(OffsetDateTime::unix_timestamp),
            Some(1_700_000_060)
        );
        assert_eq!(
            claims.issued_at().map(OffsetDateTime::unix_timestamp),
            Some(1_700_000_000)
        );
        assert_eq!(Claims::default().expires_at(), None);
    }
}
