//! Narrow views of [`JwtProvider`] for code that needs only one capability.
//!
//! Middleware that authenticates requests can hold an
//! `Arc<dyn TokenParser>`, a login handler an `Arc<dyn TokenSigner>`, and so
//! on, which keeps test doubles small.

use async_trait::async_trait;
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::claims::Claims;
use crate::error::JwtResult;
use crate::provider::JwtProvider;

/// Verifies tokens.
#[async_trait]
pub trait TokenParser: Send + Sync {
    async fn parse(&self, token: &str) -> JwtResult<Claims>;
}

/// Issues tokens.
#[async_trait]
pub trait TokenSigner: Send + Sync {
    async fn generate(&self, subject: &str, data: Map<String, Value>) -> JwtResult<String>;
}

/// Rotates tokens.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, token: &str) -> JwtResult<String>;
}

/// Revokes tokens and answers revocation queries.
#[async_trait]
pub trait TokenRevoker: Send + Sync {
    async fn revoke(&self, token: &str) -> JwtResult<()>;

    async fn revoke_by_id(&self, jti: &str, expires_at: OffsetDateTime) -> JwtResult<()>;

    async fn is_revoked(&self, jti: &str) -> JwtResult<bool>;
}

#[async_trait]
impl TokenParser for JwtProvider {
    async fn parse(&self, token: &str) -> JwtResult<Claims> {
        JwtProvider::parse(self, token).await
    }
}

#[async_trait]
impl TokenSigner for JwtProvider {
    async fn generate(&self, subject: &str, data: Map<String, Value>) -> JwtResult<String> {
        JwtProvider::generate(self, subject, data).await
    }
}

#[async_trait]
impl TokenRefresher for JwtProvider {
    async fn refresh(&self, token: &str) -> JwtResult<String> {
        JwtProvider::refresh(self, token).await
    }
}

#[async_trait]
impl TokenRevoker for JwtProvider {
    async fn revoke(&self, token: &str) -> JwtResult<()> {
        JwtProvider::revoke(self, token).await
    }

    async fn revoke_by_id(&self, jti: &str, expires_at: OffsetDateTime) -> JwtResult<()> {
        JwtProvider::revoke_by_id(self, jti, expires_at).await
    }

    async fn is_revoked(&self, jti: &str) -> JwtResult<bool> {
        JwtProvider::is_revoked(self, jti).await
    }
}
