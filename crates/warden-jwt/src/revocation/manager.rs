use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, warn};

use super::{MemoryRevocationBackend, RevocationBackend, RevokedToken};
use crate::error::{JwtError, JwtResult};

/// Policy layer over a [`RevocationBackend`].
///
/// Rejects empty token ids and refuses to revoke a token twice; everything
/// else is delegated. Cloning shares the backend.
#[derive(Clone)]
pub struct RevocationManager {
    backend: Arc<dyn RevocationBackend>,
}

impl RevocationManager {
    /// Wraps `backend`.
    pub fn new(backend: Arc<dyn RevocationBackend>) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &Arc<dyn RevocationBackend> {
        &self.backend
    }

    /// Revokes `jti` until `expires_at`.
    ///
    /// # Errors
    ///
    /// - [`JwtError::InvalidTokenId`] if `jti` is empty
    /// - [`JwtError::AlreadyRevoked`] if `jti` already has a live revocation
    pub async fn revoke(&self, jti: &str, expires_at: OffsetDateTime) -> JwtResult<()> {
        self.revoke_with_reason(jti, expires_at, None, None).await
    }

    /// Like [`revoke`](Self::revoke), recording a reason and the requester.
    pub async fn revoke_with_reason(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
        reason: Option<String>,
        revoked_by: Option<String>,
    ) -> JwtResult<()> {
        if jti.is_empty() {
            return Err(JwtError::InvalidTokenId);
        }
        if self.backend.is_revoked(jti).await? {
            warn!(jti, "Token is already revoked");
            return Err(JwtError::AlreadyRevoked);
        }

        self.backend
            .revoke_with_reason(jti, expires_at, reason, revoked_by)
            .await
    }

    /// Returns `false` for the empty id without consulting the backend.
    pub async fn is_revoked(&self, jti: &str) -> JwtResult<bool> {
        if jti.is_empty() {
            return Ok(false);
        }
        self.backend.is_revoked(jti).await
    }

    /// Associates `jti` with `user_id` until `expires_at`.
    pub async fn track_user_token(
        &self,
        user_id: &str,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> JwtResult<()> {
        self.backend.track_user_token(user_id, jti, expires_at).await
    }

    /// Live tracked token ids of `user_id`.
    pub async fn get_user_tokens(&self, user_id: &str) -> JwtResult<Vec<String>> {
        self.backend.get_user_tokens(user_id).await
    }

    /// Revokes every tracked token of `user_id` issued before `issued_before`.
    ///
    /// # Errors
    ///
    /// Returns [`JwtError::InvalidTokenId`] if `user_id` is empty.
    pub async fn revoke_all_user_tokens(
        &self,
        user_id: &str,
        issued_before: OffsetDateTime,
    ) -> JwtResult<usize> {
        if user_id.is_empty() {
            return Err(JwtError::InvalidTokenId);
        }
        let revoked = self
            .backend
            .revoke_all_user_tokens(user_id, issued_before)
            .await?;
        debug!(user_id, revoked, "Bulk revocation finished");
        Ok(revoked)
    }

    /// Snapshot of revocations that have not expired.
    pub async fn get_revoked_tokens(&self) -> JwtResult<Vec<RevokedToken>> {
        self.backend.get_revoked_tokens().await
    }

    /// Drops expired entries, returning how many revocations went away.
    pub async fn cleanup_expired(&self) -> JwtResult<u64> {
        self.backend.cleanup_expired().await
    }

    /// Shuts the backend down.
    pub async fn close(&self) -> JwtResult<()> {
        self.backend.close().await
    }
}

impl Default for RevocationManager {
    /// A manager over a fresh [`MemoryRevocationBackend`].
    fn default() -> Self {
        Self::new(Arc::new(MemoryRevocationBackend::new()))
    }
}

impl std::fmt::Debug for RevocationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use time::Duration;

    use super::*;

    /// Records calls; storage is a plain list of revoked ids.
    #[derive(Default)]
    struct RecordingBackend {
        revoked: Mutex<Vec<String>>,
        lookups: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RevocationBackend for RecordingBackend {
        async fn revoke_with_reason(
            &self,
            jti: &str,
            _expires_at: OffsetDateTime,
            _reason: Option<String>,
            _revoked_by: Option<String>,
        ) -> JwtResult<()> {
            if self.fail {
                return Err(JwtError::revocation_failed("store unavailable"));
            }
            self.revoked.lock().unwrap().push(jti.to_string());
            Ok(())
        }

        async fn is_revoked(&self, jti: &str) -> JwtResult<bool> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok(self.revoked.lock().unwrap().iter().any(|id| id == jti))
        }

        async fn track_user_token(&self, _: &str, _: &str, _: OffsetDateTime) -> JwtResult<()> {
            Ok(())
        }

        async fn get_user_tokens(&self, _: &str) -> JwtResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn revoke_all_user_tokens(&self, _: &str, _: OffsetDateTime) -> JwtResult<usize> {
            Ok(3)
        }

        async fn get_revoked_tokens(&self) -> JwtResult<Vec<RevokedToken>> {
            Ok(Vec::new())
        }

        async fn cleanup_expired(&self) -> JwtResult<u64> {
            Ok(0)
        }

        async fn close(&self) -> JwtResult<()> {
            Ok(())
        }
    }

    fn expiry() -> OffsetDateTime {
        OffsetDateTime::now_utc() + Duration::hours(1)
    }

    #[tokio::test]
    async fn test_revoke_rejects_empty_id() {
        let manager = RevocationManager::new(Arc::new(RecordingBackend::default()));
        let err = manager.revoke("", expiry()).await.unwrap_err();
        assert!(matches!(err, JwtError::InvalidTokenId));
    }

    #[tokio::test]
    async fn test_revoke_twice_is_rejected() {
        let manager = RevocationManager::default();
        manager.revoke("jti-1", expiry()).await.unwrap();

        let err = manager.revoke("jti-1", expiry()).await.unwrap_err();
        assert!(matches!(err, JwtError::AlreadyRevoked));
        assert!(manager.is_revoked("jti-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_empty_id_is_never_revoked() {
        let backend = Arc::new(RecordingBackend::default());
        let manager = RevocationManager::new(backend.clone());

        assert!(!manager.is_revoked("").await.unwrap());
        assert_eq!(backend.lookups.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_backend_errors_propagate() {
        let backend = RecordingBackend {
            fail: true,
            ..Default::default()
        };
        let manager = RevocationManager::new(Arc::new(backend));

        let err = manager.revoke("jti-1", expiry()).await.unwrap_err();
        assert!(matches!(err, JwtError::RevocationFailed { .. }));
    }

    #[tokio::test]
    async fn test_revoke_all_user_tokens() {
        let manager = RevocationManager::new(Arc::new(RecordingBackend::default()));

        let err = manager
            .revoke_all_user_tokens("", OffsetDateTime::now_utc())
            .await
            .unwrap_err();
        assert!(matches!(err, JwtError::InvalidTokenId));

        let revoked = manager
            .revoke_all_user_tokens("user", OffsetDateTime::now_utc())
            .await
            .unwrap();
        assert_eq!(revoked, 3);
    }

    #[tokio::test]
    async fn test_clones_share_backend() {
        let manager = RevocationManager::default();
        let other = manager.clone();

        manager
            .revoke_with_reason("jti-1", expiry(), Some("logout".into()), None)
            .await
            .unwrap();
        assert!(other.is_revoked("jti-1").await.unwrap());
        assert_eq!(other.get_revoked_tokens().await.unwrap().len(), 1);

        other.close().await.unwrap();
    }
}
