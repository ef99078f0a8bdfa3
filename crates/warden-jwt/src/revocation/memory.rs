//! In-memory revocation backend.
//!
//! All state lives in three maps behind a single reader-writer lock:
//! revoked entries by JTI, tracked token ids per user (insertion ordered,
//! no duplicates) and issuance metadata by JTI. A background task sweeps
//! expired entries every [`DEFAULT_CLEANUP_INTERVAL`] unless configured
//! otherwise.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::sync::{RwLock, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, warn};

use super::{RevocationBackend, RevocationConfig, RevokedToken, TokenMetadata};
use crate::error::JwtResult;

/// Default period of the background pruner.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Expiry used when bulk-revoking a token whose metadata is unknown.
const FALLBACK_TTL: time::Duration = time::Duration::days(365);

#[derive(Debug, Default)]
struct BackendState {
    revoked: HashMap<String, RevokedToken>,
    user_tokens: HashMap<String, Vec<String>>,
    token_metadata: HashMap<String, TokenMetadata>,
}

impl BackendState {
    /// Removes expired revocations and metadata, returning how many
    /// revocations were dropped.
    fn sweep(&mut self, now: OffsetDateTime) -> u64 {
        let mut detached: Vec<(String, String)> = Vec::new();

        let before = self.revoked.len();
        self.revoked.retain(|jti, token| {
            let keep = !token.is_expired_at(now);
            if !keep && let Some(user_id) = &token.user_id {
                detached.push((user_id.clone(), jti.clone()));
            }
            keep
        });
        let removed = (before - self.revoked.len()) as u64;

        self.token_metadata.retain(|jti, meta| {
            let keep = now <= meta.expires_at;
            if !keep {
                detached.push((meta.user_id.clone(), jti.clone()));
            }
            keep
        });

        for (user_id, jti) in detached {
            if let Some(ids) = self.user_tokens.get_mut(&user_id) {
                ids.retain(|id| *id != jti);
            }
        }
        self.user_tokens.retain(|_, ids| !ids.is_empty());

        removed
    }

    fn is_live_revocation(&self, jti: &str, now: OffsetDateTime) -> bool {
        self.revoked
            .get(jti)
            .is_some_and(|token| !token.is_expired_at(now))
    }
}

struct Pruner {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Revocation backend keeping everything in process memory.
///
/// State is lost on restart. Construct inside a Tokio runtime to get the
/// background pruner; outside of one the backend still works but only
/// prunes on [`cleanup_expired`](RevocationBackend::cleanup_expired) and
/// lazily on lookup.
pub struct MemoryRevocationBackend {
    state: Arc<RwLock<BackendState>>,
    pruner: Mutex<Option<Pruner>>,
}

impl MemoryRevocationBackend {
    /// Creates a backend pruning every [`DEFAULT_CLEANUP_INTERVAL`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_cleanup_interval(DEFAULT_CLEANUP_INTERVAL)
    }

    /// Creates a backend from a [`RevocationConfig`].
    #[must_use]
    pub fn from_config(config: &RevocationConfig) -> Self {
        Self::with_cleanup_interval(config.cleanup_interval)
    }

    /// Creates a backend pruning every `period`.
    #[must_use]
    pub fn with_cleanup_interval(period: Duration) -> Self {
        let state = Arc::new(RwLock::new(BackendState::default()));
        let pruner = match Handle::try_current() {
            Ok(runtime) => Some(spawn_pruner(&runtime, Arc::clone(&state), period)),
            Err(_) => {
                warn!("No Tokio runtime available, revocation pruner not started");
                None
            }
        };

        Self {
            state,
            pruner: Mutex::new(pruner),
        }
    }

    /// Returns `true` while the background pruner is running.
    #[must_use]
    pub fn is_pruning(&self) -> bool {
        self.pruner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|pruner| !pruner.handle.is_finished())
    }
}

impl Default for MemoryRevocationBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn spawn_pruner(runtime: &Handle, state: Arc<RwLock<BackendState>>, period: Duration) -> Pruner {
    let period = period.max(Duration::from_millis(1));
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

    let handle = runtime.spawn(async move {
        info!(
            cleanup_interval_secs = period.as_secs(),
            "Revocation pruner started"
        );

        let mut ticker = interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = state.write().await.sweep(OffsetDateTime::now_utc());
                    if removed > 0 {
                        debug!(removed, "Pruned expired revocations");
                    }
                }
                changed = shutdown_rx.changed() => {
                    // a dropped sender means the backend is gone
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Revocation pruner stopped");
    });

    Pruner {
        shutdown: shutdown_tx,
        handle,
    }
}

#[async_trait]
impl RevocationBackend for MemoryRevocationBackend {
    async fn revoke_with_reason(
        &self,
        jti: &str,
        expires_at: OffsetDateTime,
        reason: Option<String>,
        revoked_by: Option<String>,
    ) -> JwtResult<()> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let user_id = state
            .token_metadata
            .get(jti)
            .map(|meta| meta.user_id.clone());
        let expires_at = match state.revoked.get(jti) {
            Some(existing) => existing.expires_at.max(expires_at),
            None => expires_at,
        };

        state.revoked.insert(
            jti.to_string(),
            RevokedToken {
                token_id: jti.to_string(),
                user_id,
                revoked_at: now,
                expires_at,
                reason,
                revoked_by,
            },
        );

        debug!(jti, "Token revoked");
        Ok(())
    }

    async fn is_revoked(&self, jti: &str) -> JwtResult<bool> {
        let now = OffsetDateTime::now_utc();

        // Same lookup and comparison whether the id is present, expired or absent.
        let (present, live) = {
            let state = self.state.read().await;
            let entry = state.revoked.get(jti);
            let expires_at = entry.map_or(OffsetDateTime::UNIX_EPOCH, |token| token.expires_at);
            (entry.is_some(), now <= expires_at)
        };
        let revoked = present & live;

        if present & !live
            && let Ok(mut state) = self.state.try_write()
            && state
                .revoked
                .get(jti)
                .is_some_and(|token| token.is_expired_at(now))
        {
            state.revoked.remove(jti);
        }

        Ok(revoked)
    }

    async fn track_user_token(
        &self,
        user_id: &str,
        jti: &str,
        expires_at: OffsetDateTime,
    ) -> JwtResult<()> {
        if user_id.is_empty() || jti.is_empty() {
            return Ok(());
        }

        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let ids = state.user_tokens.entry(user_id.to_string()).or_default();
        if !ids.iter().any(|id| id == jti) {
            ids.push(jti.to_string());
        }
        state.token_metadata.insert(
            jti.to_string(),
            TokenMetadata {
                token_id: jti.to_string(),
                user_id: user_id.to_string(),
                issued_at: OffsetDateTime::now_utc(),
                expires_at,
            },
        );

        Ok(())
    }

    async fn get_user_tokens(&self, user_id: &str) -> JwtResult<Vec<String>> {
        let now = OffsetDateTime::now_utc();
        let state = self.state.read().await;

        let Some(ids) = state.user_tokens.get(user_id) else {
            return Ok(Vec::new());
        };

        Ok(ids
            .iter()
            .filter(|id| {
                let expired = state
                    .token_metadata
                    .get(id.as_str())
                    .is_some_and(|meta| now > meta.expires_at);
                !expired && !state.is_live_revocation(id, now)
            })
            .cloned()
            .collect())
    }

    async fn revoke_all_user_tokens(
        &self,
        user_id: &str,
        issued_before: OffsetDateTime,
    ) -> JwtResult<usize> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.state.write().await;
        let state = &mut *guard;

        let Some(ids) = state.user_tokens.get(user_id) else {
            return Ok(0);
        };

        let mut revoked = 0;
        for jti in ids {
            let (issued_at, expires_at) = match state.token_metadata.get(jti) {
                Some(meta) => (Some(meta.issued_at), meta.expires_at),
                None => (None, now + FALLBACK_TTL),
            };
            if issued_at.is_some_and(|issued_at| issued_at >= issued_before) {
                continue;
            }
            if state
                .revoked
                .get(jti)
                .is_some_and(|token| !token.is_expired_at(now))
            {
                continue;
            }

            state.revoked.insert(
                jti.clone(),
                RevokedToken {
                    token_id: jti.clone(),
                    user_id: Some(user_id.to_string()),
                    revoked_at: now,
                    expires_at,
                    reason: None,
                    revoked_by: None,
                },
            );
            revoked += 1;
        }

        info!(user_id, revoked, "Revoked user tokens");
        Ok(revoked)
    }

    async fn get_revoked_tokens(&self) -> JwtResult<Vec<RevokedToken>> {
        let now = OffsetDateTime::now_utc();
        let state = self.state.read().await;

        let mut tokens: Vec<RevokedToken> = state
            .revoked
            .values()
            .filter(|token| !token.is_expired_at(now))
            .cloned()
            .collect();
        tokens.sort_by(|a, b| a.revoked_at.cmp(&b.revoked_at));
        Ok(tokens)
    }

    async fn cleanup_expired(&self) -> JwtResult<u64> {
        let removed = self.state.write().await.sweep(OffsetDateTime::now_utc());
        debug!(removed, "Revocation cleanup finished");
        Ok(removed)
    }

    async fn close(&self) -> JwtResult<()> {
        let pruner = self
            .pruner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(pruner) = pruner {
            let _ = pruner.shutdown.send(true);
            if let Err(e) = pruner.handle.await {
                error!(error = %e, "Revocation pruner task failed");
            }
        }

        *self.state.write().await = BackendState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use time::Duration as TimeDuration;

    use super::*;

    fn in_one_hour() -> OffsetDateTime {
        OffsetDateTime::now_utc() + TimeDuration::hours(1)
    }

    fn an_hour_ago() -> OffsetDateTime {
        OffsetDateTime::now_utc() - TimeDuration::hours(1)
    }

    #[tokio::test]
    async fn test_revoke_and_lookup() {
        let backend = MemoryRevocationBackend::new();

        assert!(!backend.is_revoked("jti-1").await.unwrap());
        backend.revoke("jti-1", in_one_hour()).await.unwrap();
        assert!(backend.is_revoked("jti-1").await.unwrap());
        assert!(!backend.is_revoked("jti-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_revoke_keeps_later_expiry() {
        let backend = MemoryRevocationBackend::new();
        let later = in_one_hour() + TimeDuration::hours(1);

        backend.revoke("jti-1", later).await.unwrap();
        backend.revoke("jti-1", in_one_hour()).await.unwrap();

        let tokens = backend.get_revoked_tokens().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].expires_at, later);
    }

    #[tokio::test]
    async fn test_revoke_with_reason() {
        let backend = MemoryRevocationBackend::new();
        backend
            .revoke_with_reason(
                "jti-1",
                in_one_hour(),
                Some("compromised".to_string()),
                Some("admin".to_string()),
            )
            .await
            .unwrap();

        let tokens = backend.get_revoked_tokens().await.unwrap();
        assert_eq!(tokens[0].reason.as_deref(), Some("compromised"));
        assert_eq!(tokens[0].revoked_by.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_expired_revocation_is_absent_and_pruned() {
        let backend = MemoryRevocationBackend::new();
        backend.revoke("old", an_hour_ago()).await.unwrap();

        assert!(!backend.is_revoked("old").await.unwrap());
        assert!(backend.state.read().await.revoked.is_empty());
        assert!(backend.get_revoked_tokens().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_track_user_tokens() {
        let backend = MemoryRevocationBackend::new();

        backend.track_user_token("user", "a", in_one_hour()).await.unwrap();
        backend.track_user_token("user", "b", in_one_hour()).await.unwrap();
        backend.track_user_token("user", "a", in_one_hour()).await.unwrap();
        backend.track_user_token("", "c", in_one_hour()).await.unwrap();

        assert_eq!(backend.get_user_tokens("user").await.unwrap(), vec!["a", "b"]);
        assert!(backend.get_user_tokens("nobody").await.unwrap().is_empty());

        backend.revoke("a", in_one_hour()).await.unwrap();
        assert_eq!(backend.get_user_tokens("user").await.unwrap(), vec!["b"]);

        // revocation picks up the owner from tracking metadata
        let revoked = backend.get_revoked_tokens().await.unwrap();
        assert_eq!(revoked[0].user_id.as_deref(), Some("user"));
    }

    #[tokio::test]
    async fn test_expired_tracked_tokens_are_not_active() {
        let backend = MemoryRevocationBackend::new();
        backend.track_user_token("user", "stale", an_hour_ago()).await.unwrap();
        backend.track_user_token("user", "fresh", in_one_hour()).await.unwrap();

        assert_eq!(backend.get_user_tokens("user").await.unwrap(), vec!["fresh"]);
    }

    #[tokio::test]
    async fn test_revoke_all_user_tokens_respects_cutoff() {
        let backend = MemoryRevocationBackend::new();
        backend.track_user_token("user", "a", in_one_hour()).await.unwrap();
        backend.track_user_token("user", "b", in_one_hour()).await.unwrap();

        let cutoff = OffsetDateTime::now_utc();
        tokio::time::sleep(Duration::from_millis(5)).await;
        backend.track_user_token("user", "c", in_one_hour()).await.unwrap();

        let revoked = backend.revoke_all_user_tokens("user", cutoff).await.unwrap();
        assert_eq!(revoked, 2);
        assert!(backend.is_revoked("a").await.unwrap());
        assert!(backend.is_revoked("b").await.unwrap());
        assert!(!backend.is_revoked("c").await.unwrap());
        assert_eq!(backend.get_user_tokens("user").await.unwrap(), vec!["c"]);

        // revoked entries keep each token's own expiry
        let meta_expiry = backend.state.read().await.token_metadata["a"].expires_at;
        let tokens = backend.get_revoked_tokens().await.unwrap();
        let entry = tokens.iter().find(|t| t.token_id == "a").unwrap();
        assert_eq!(entry.expires_at, meta_expiry);
        assert_eq!(entry.user_id.as_deref(), Some("user"));

        assert_eq!(
            backend
                .revoke_all_user_tokens("unknown", OffsetDateTime::now_utc())
                .await
                .unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let backend = MemoryRevocationBackend::new();
        backend.track_user_token("user", "old", an_hour_ago()).await.unwrap();
        backend.track_user_token("solo", "gone", an_hour_ago()).await.unwrap();
        backend.track_user_token("user", "new", in_one_hour()).await.unwrap();
        backend.revoke("old", an_hour_ago()).await.unwrap();
        backend.revoke("new", in_one_hour()).await.unwrap();

        let removed = backend.cleanup_expired().await.unwrap();
        assert_eq!(removed, 1);

        let revoked = backend.get_revoked_tokens().await.unwrap();
        let now = OffsetDateTime::now_utc();
        assert!(revoked.iter().all(|t| t.expires_at >= now));
        assert_eq!(revoked.len(), 1);

        let state = backend.state.read().await;
        assert_eq!(state.user_tokens["user"], vec!["new".to_string()]);
        assert!(!state.user_tokens.contains_key("solo"));
        assert!(!state.token_metadata.contains_key("old"));
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let backend = MemoryRevocationBackend::new();
        assert!(backend.is_pruning());
        backend.track_user_token("user", "a", in_one_hour()).await.unwrap();
        backend.revoke("a", in_one_hour()).await.unwrap();

        backend.close().await.unwrap();
        assert!(!backend.is_pruning());
        assert!(!backend.is_revoked("a").await.unwrap());
        assert!(backend.get_user_tokens("user").await.unwrap().is_empty());

        backend.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_pruner_sweeps_periodically() {
        let backend = MemoryRevocationBackend::with_cleanup_interval(Duration::from_millis(20));
        backend.revoke("old", an_hour_ago()).await.unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(backend.state.read().await.revoked.is_empty());

        backend.close().await.unwrap();
    }

    #[test]
    fn test_without_runtime_has_no_pruner() {
        let backend = MemoryRevocationBackend::new();
        assert!(!backend.is_pruning());

        tokio_test::block_on(async {
            backend.revoke("jti", in_one_hour()).await.unwrap();
            assert!(backend.is_revoked("jti").await.unwrap());
            backend.close().await.unwrap();
        });
    }

    #[test]
    fn test_from_config() {
        let config = RevocationConfig {
            cleanup_interval: Duration::from_secs(5),
        };
        let backend = MemoryRevocationBackend::from_config(&config);
        assert!(!backend.is_pruning());
    }
}
