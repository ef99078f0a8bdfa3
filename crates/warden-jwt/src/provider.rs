//! The JWT provider.
//!
//! [`JwtProvider`] issues, verifies, rotates and revokes tokens for one
//! validated [`JwtConfig`]. Revocation, session tracking and rotation need a
//! [`RevocationManager`]; without one the provider still signs and verifies.

use std::time::Duration as StdDuration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use serde_json::{Map, Value};
use time::{Duration, OffsetDateTime};
use tokio::task;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::algorithm::SigningAlgorithm;
use crate::claims::{Claims, ROTATED_AT_KEY, ROTATION_COUNT_KEY, is_reserved_claim};
use crate::config::{JwtConfig, MIN_TOKEN_LENGTH, ResolvedKeys};
use crate::error::{JwtError, JwtResult};
use crate::jwks::{Jwk, Jwks};
use crate::jws;
use crate::revocation::RevocationManager;

/// Default deadline for signature verification in [`JwtProvider::parse`].
pub const PARSE_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// Revocation lifetime for tokens that carry no `exp`.
const MISSING_EXPIRY_FALLBACK: Duration = Duration::days(365);

/// Random bytes in a JWT ID.
const TOKEN_ID_BYTES: usize = 32;

/// Returns a fresh JWT ID: 32 bytes from the OS RNG, base64url without padding.
#[must_use]
pub fn generate_token_id() -> String {
    let mut bytes = [0u8; TOKEN_ID_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues and verifies signed tokens.
///
/// Cheap to clone; clones share key material and the revocation manager.
#[derive(Debug, Clone)]
pub struct JwtProvider {
    config: JwtConfig,
    resolved: ResolvedKeys,
    revocation: Option<RevocationManager>,
    parse_timeout: StdDuration,
}

impl JwtProvider {
    /// Creates a provider without revocation support.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found by [`JwtConfig::validate`].
    pub fn new(config: JwtConfig) -> JwtResult<Self> {
        Self::build(config, None)
    }

    /// Creates a provider that checks and records revocations in `manager`.
    ///
    /// # Errors
    ///
    /// Returns the first configuration error found by [`JwtConfig::validate`].
    pub fn with_revocation(config: JwtConfig, manager: RevocationManager) -> JwtResult<Self> {
        Self::build(config, Some(manager))
    }

    fn build(mut config: JwtConfig, revocation: Option<RevocationManager>) -> JwtResult<Self> {
        let resolved = config.resolve()?;

        if config.track_user_tokens && revocation.is_none() {
            warn!("User token tracking is enabled but no revocation manager is attached");
        }

        info!(
            algorithm = %resolved.algorithm,
            issuer = %config.issuer,
            revocation = revocation.is_some(),
            "JWT provider initialized"
        );

        Ok(Self {
            config,
            resolved,
            revocation,
            parse_timeout: PARSE_TIMEOUT,
        })
    }

    /// The validated configuration.
    pub fn config(&self) -> &JwtConfig {
        &self.config
    }

    /// The signing algorithm of the validated configuration.
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.resolved.algorithm
    }

    /// The attached revocation manager, if any.
    pub fn revocation_manager(&self) -> Option<&RevocationManager> {
        self.revocation.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn set_parse_timeout(&mut self, deadline: StdDuration) {
        self.parse_timeout = deadline;
    }

    fn require_manager(&self) -> JwtResult<&RevocationManager> {
        self.revocation.as_ref().ok_or(JwtError::NoRevocationManager)
    }

    fn tracking_manager(&self) -> Option<&RevocationManager> {
        self.revocation
            .as_ref()
            .filter(|_| self.config.track_user_tokens)
    }

    // ========================================================================
    // Issuance
    // ========================================================================

    /// Issues a token for `subject` carrying `data`.
    ///
    /// # Errors
    ///
    /// - [`JwtError::MaxSessionsExceeded`] if the subject is at its session cap
    /// - [`JwtError::ReservedClaim`] if `data` uses a registered claim name
    /// - signing and tracking failures
    pub async fn generate(&self, subject: &str, data: Map<String, Value>) -> JwtResult<String> {
        let tracking = self.tracking_manager();

        if let Some(manager) = tracking
            && self.config.max_user_sessions > 0
        {
            let active = manager.get_user_tokens(subject).await?.len();
            if active >= self.config.max_user_sessions as usize {
                warn!(
                    subject,
                    active,
                    max = self.config.max_user_sessions,
                    "Session limit reached"
                );
                return Err(JwtError::MaxSessionsExceeded);
            }
        }

        if let Some(key) = data.keys().find(|key| is_reserved_claim(key)) {
            return Err(JwtError::reserved_claim(key.as_str()));
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = now + self.resolved.expiration;
        let claims = Claims {
            iss: self.config.issuer.clone(),
            sub: subject.to_string(),
            aud: vec![self.config.audience.clone()],
            exp: Some(expires_at.unix_timestamp()),
            nbf: Some(now.unix_timestamp()),
            iat: Some(now.unix_timestamp()),
            jti: generate_token_id(),
            data,
        };

        let token = jws::sign(
            self.resolved.algorithm,
            &self.config.key_id,
            &self.resolved.keys,
            &claims,
        )?;

        if let Some(manager) = tracking {
            manager
                .track_user_token(subject, &claims.jti, expires_at)
                .await?;
        }

        debug!(jti = %claims.jti, subject, "Token issued");
        Ok(token)
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Verifies `token` and returns its claims.
    ///
    /// Size limits are checked before any decoding, and verification runs on
    /// the blocking pool under a deadline, [`PARSE_TIMEOUT`] by default.
    ///
    /// # Errors
    ///
    /// - [`JwtError::InvalidToken`] for short, malformed or badly signed tokens,
    ///   a header `alg` other than the configured one, or a future `nbf`
    /// - [`JwtError::TokenTooLarge`] above the configured size limit
    /// - [`JwtError::TokenExpired`] past `exp`
    /// - [`JwtError::ParsingTimeout`] when verification misses the deadline
    /// - [`JwtError::AlreadyRevoked`] for revoked tokens
    /// - [`JwtError::MissingIssuer`] / [`JwtError::MissingAudience`] when the
    ///   corresponding check is required
    pub async fn parse(&self, token: &str) -> JwtResult<Claims> {
        let limit = self.config.token_size_limit();
        if token.len() < MIN_TOKEN_LENGTH {
            return Err(JwtError::invalid_token("token is too short"));
        }
        if token.len() > limit {
            return Err(JwtError::TokenTooLarge {
                size: token.len(),
                max: limit,
            });
        }

        let algorithm = self.resolved.algorithm;
        let keys = self.resolved.keys.clone();
        let owned = token.to_string();
        let verification = task::spawn_blocking(move || jws::verify(algorithm, &keys, &owned));

        let claims = match timeout(self.parse_timeout, verification).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => return Err(JwtError::invalid_token(format!("verification task failed: {e}"))),
            Err(_) => {
                warn!(timeout = ?self.parse_timeout, "Token verification timed out");
                return Err(JwtError::ParsingTimeout);
            }
        };

        if let Some(manager) = &self.revocation
            && manager.is_revoked(&claims.jti).await?
        {
            debug!(jti = %claims.jti, "Rejected revoked token");
            return Err(JwtError::AlreadyRevoked);
        }

        if self.config.require_issuer
            && (claims.iss.is_empty() || claims.iss != self.config.issuer)
        {
            return Err(JwtError::MissingIssuer);
        }
        if self.config.require_audience && !claims.has_audience(&self.config.audience) {
            return Err(JwtError::MissingAudience);
        }

        Ok(claims)
    }

    // ========================================================================
    // Rotation
    // ========================================================================

    /// Exchanges `token` for a successor and revokes it.
    ///
    /// The successor keeps the subject and data, gets fresh timing and a new
    /// JWT ID, and records `_rotated_at` (Unix nanoseconds) and an incremented
    /// `_rotation_count` in its data.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::NoRevocationManager`] without a manager, and any
    /// error from [`parse`](Self::parse), revocation or
    /// [`generate`](Self::generate).
    pub async fn refresh(&self, token: &str) -> JwtResult<String> {
        let manager = self.require_manager()?;
        let claims = self.parse(token).await?;

        let now = OffsetDateTime::now_utc();
        let rotation_count = claims.rotation_count() + 1;
        let rotated_at = i64::try_from(now.unix_timestamp_nanos()).unwrap_or(i64::MAX);

        let expires_at = claims
            .expires_at()
            .unwrap_or(now + MISSING_EXPIRY_FALLBACK);
        manager.revoke(&claims.jti, expires_at).await?;

        let mut data = claims.data;
        data.insert(ROTATED_AT_KEY.to_string(), Value::from(rotated_at));
        data.insert(ROTATION_COUNT_KEY.to_string(), Value::from(rotation_count));

        debug!(jti = %claims.jti, rotation_count, "Rotating token");
        self.generate(&claims.sub, data).await
    }

    // ========================================================================
    // Revocation
    // ========================================================================

    /// Verifies `token` and revokes it until its expiry.
    ///
    /// Tokens without `exp` stay revoked for a year.
    ///
    /// # Errors
    ///
    /// - [`JwtError::NoRevocationManager`] without a manager
    /// - any error from [`parse`](Self::parse), including
    ///   [`JwtError::AlreadyRevoked`]
    /// - [`JwtError::InvalidTokenId`] if the token has no `jti`
    pub async fn revoke(&self, token: &str) -> JwtResult<()> {
        let manager = self.require_manager()?;
        let claims = self.parse(token).await?;

        if claims.jti.is_empty() {
            return Err(JwtError::InvalidTokenId);
        }

        let expires_at = claims
            .expires_at()
            .unwrap_or_else(|| OffsetDateTime::now_utc() + MISSING_EXPIRY_FALLBACK);
        manager.revoke(&claims.jti, expires_at).await?;

        info!(jti = %claims.jti, subject = %claims.sub, "Token revoked");
        Ok(())
    }

    /// Revokes a token by its JWT ID.
    pub async fn revoke_by_id(&self, jti: &str, expires_at: OffsetDateTime) -> JwtResult<()> {
        self.require_manager()?.revoke(jti, expires_at).await
    }

    /// Returns `false` when no manager is attached.
    pub async fn is_revoked(&self, jti: &str) -> JwtResult<bool> {
        match &self.revocation {
            Some(manager) => manager.is_revoked(jti).await,
            None => Ok(false),
        }
    }

    /// Active (tracked, unrevoked, unexpired) token ids of `user_id`.
    pub async fn get_active_user_tokens(&self, user_id: &str) -> JwtResult<Vec<String>> {
        self.require_manager()?.get_user_tokens(user_id).await
    }

    /// Revokes every token issued to `user_id` so far.
    pub async fn revoke_all_user_tokens(&self, user_id: &str) -> JwtResult<usize> {
        self.require_manager()?
            .revoke_all_user_tokens(user_id, OffsetDateTime::now_utc())
            .await
    }

    /// Number of active tokens for `user_id`; 0 when no manager is attached.
    pub async fn get_user_session_count(&self, user_id: &str) -> JwtResult<usize> {
        match &self.revocation {
            Some(manager) => Ok(manager.get_user_tokens(user_id).await?.len()),
            None => Ok(0),
        }
    }

    // ========================================================================
    // Key publication
    // ========================================================================

    /// JWK Set with the verification key.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::JwksNotSupported`] for HMAC algorithms.
    pub fn jwks(&self) -> JwtResult<Jwks> {
        let key = Jwk::from_key_material(
            self.resolved.algorithm,
            &self.config.key_id,
            &self.resolved.keys,
        )?;
        let mut jwks = Jwks::new();
        jwks.add_key(key);
        Ok(jwks)
    }
}
