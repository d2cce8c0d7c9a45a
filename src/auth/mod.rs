//! Authentication engine boundary.
//!
//! The server core only depends on [`AuthEngine`]: resolve a session from
//! request headers into a normalized [`Identity`], and hand over a router for
//! the `/api/auth/*` sub-routes. The default implementation is the
//! Postgres-backed [`engine::SqlAuthEngine`]; tests substitute a mock.

pub mod engine;

use async_trait::async_trait;
use axum::{Router, http::HeaderMap};
use thiserror::Error;
use uuid::Uuid;

/// Normalized projection of an authenticated caller, attached to the request
/// context by the session middleware. Never stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}

/// Engine failures are opaque to the caller; storage errors arrive through
/// the `anyhow` conversion with their context chain intact.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth engine error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// The two operations this server needs from an authentication engine.
#[async_trait]
pub trait AuthEngine: Send + Sync {
    /// Resolve a session from request headers.
    ///
    /// `Ok(None)` means no usable session (missing cookie, unknown or expired
    /// token, or a session row whose user no longer exists); the middleware
    /// turns both `Ok(None)` and `Err(_)` into the same fixed 401.
    async fn resolve_session(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError>;

    /// Router serving the engine-owned auth sub-routes, nested at
    /// `/api/auth` by the caller. State travels inside the returned router.
    fn router(&self) -> Router;
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, anyhow};

    #[test]
    fn storage_failures_keep_their_context_chain() {
        let err: AuthError = anyhow!("connection refused")
            .context("failed to lookup session")
            .into();
        let AuthError::Internal(inner) = &err;
        assert_eq!(inner.to_string(), "failed to lookup session");
        assert!(err.to_string().contains("failed to lookup session"));
    }
}
