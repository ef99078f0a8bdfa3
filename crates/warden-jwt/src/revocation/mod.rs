//! Token revocation.
//!
//! Revoked tokens are tracked by JTI until the token would have expired on its
//! own. Storage sits behind the [`RevocationBackend`] trait; the provider only
//! ever talks to it through a [`RevocationManager`], which adds policy on top
//! (non-empty ids, no double revocation).
//!
//! # Implementations
//!
//! - [`MemoryRevocationBackend`] - in-process maps with a periodic pruner
//!
//! Persistent backends implement the same trait.

mod manager;
mod memory;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::JwtResult;

pub use manager::RevocationManager;
pub use memory::{DEFAULT_CLEANUP_INTERVAL, MemoryRevocationBackend};

/// Storage for revoked token ids and per-user token tracking.
///
/// Implementations must be safe to share across tasks. `revoke` overwrites an
/// existing entry, so two concurrent revocations of the same id both succeed.
#[async_trait]
pub trait RevocationBackend: Send + Sync {
    /// Marks `jti` as revoked until `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, jti: &str, expires_at: OffsetDateTime) -> JwtResult<()> {
        self.revoke_with_reason(jti, expires_at, None, None).await
    }

    /// Marks `jti` as revoked and records why and by whom.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_with_reason(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
        reason: Option<String>,
        revoked_by: Option<String>,
    ) -> JwtResult<()>;

    /// Returns `true` if `jti` has a revocation entry that has not expired.
    async fn is_revoked(&self, jti: &str) -> JwtResult<bool>;

    /// Associates `jti` with `user_id` for session counting and bulk revocation.
    async fn track_user_token(
        &self,
        user_id: &str,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> JwtResult<()>;

    /// Tracked token ids for `user_id` that are neither revoked nor expired.
    async fn get_user_tokens(&self, user_id: &str) -> JwtResult<Vec<String>>;

    /// Revokes every tracked token of `user_id` issued before `issued_before`.
    ///
    /// Returns the number of tokens revoked.
    async fn revoke_all_user_tokens(
        &self,
        user_id: &str,
        issued_before: OffsetDateTime,
    ) -> JwtResult<usize>;

    /// Snapshot of all revocation entries that have not expired.
    async fn get_revoked_tokens(&self) -> JwtResult<Vec<RevokedToken>>;

    /// Removes expired entries, returning how many revocations were dropped.
    async fn cleanup_expired(&self) -> JwtResult<u64>;

    /// Stops background work and releases all state. Idempotent.
    async fn close(&self) -> JwtResult<()>;
}

/// A revocation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokedToken {
    /// JWT ID of the revoked token.
    pub token_id: String,

    /// Owner of the token, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    /// When the revocation was recorded.
    #[serde(with = "time::serde::rfc3339")]
    pub revoked_at: OffsetDateTime,

    /// When the token would have expired; the entry is dropped after this.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Free-form reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Who requested the revocation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_by: Option<String>,
}

impl RevokedToken {
    /// Returns `true` if this entry no longer needs to be kept at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        now > self.expires_at
    }
}

/// Issuance metadata kept for tracked tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenMetadata {
    /// JWT ID.
    pub token_id: String,

    /// Subject the token was issued to.
    pub user_id: String,

    /// When tracking started, which is the issue time.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// Token expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

/// Settings for [`MemoryRevocationBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RevocationConfig {
    /// How often expired entries are pruned.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}
