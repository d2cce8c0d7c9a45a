//! Postgres-backed authentication engine.
//!
//! State flows through [`EngineState`]: one pool, one config, one mailer,
//! one HTTP client for OAuth exchanges, and the session read cache. The
//! handlers are plain axum handlers that receive the state as an extension
//! on the engine's own router.

pub mod config;

mod cache;
mod handlers;
mod oauth;
mod storage;
mod types;
mod utils;

pub use config::{EngineConfig, OAuthCredentials};

use crate::{
    auth::{AuthEngine, AuthError, Identity},
    mail::Mailer,
};
use async_trait::async_trait;
use axum::{Router, http::HeaderMap};
use cache::SessionCache;
use chrono::Utc;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tracing::warn;

pub(crate) struct EngineState {
    pool: PgPool,
    config: EngineConfig,
    mailer: Arc<dyn Mailer>,
    cache: SessionCache,
    http: reqwest::Client,
    providers: Vec<oauth::Provider>,
}

impl EngineState {
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub(crate) fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub(crate) fn mailer(&self) -> &Arc<dyn Mailer> {
        &self.mailer
    }

    pub(crate) fn cache(&self) -> &SessionCache {
        &self.cache
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub(crate) fn provider(&self, name: &str) -> Option<&oauth::Provider> {
        self.providers
            .iter()
            .find(|provider| provider.name() == name)
    }

    /// Deliver an email off the request path. Delivery failures are logged;
    /// the endpoint response never waits on, or leaks, mailer state.
    pub(crate) fn send_mail(&self, email: crate::mail::Email) {
        let mailer = Arc::clone(&self.mailer);
        tokio::spawn(async move {
            let to = email.to.clone();
            if let Err(err) = mailer.send(email).await {
                warn!(to = %to, "Failed to deliver email: {err}");
            }
        });
    }

    async fn resolve_token_hash(&self, token_hash: &[u8]) -> Result<Option<Identity>, AuthError> {
        if let Some(identity) = self.cache.get(token_hash).await {
            return Ok(Some(identity));
        }

        let Some(record) = storage::lookup_session(&self.pool, token_hash).await? else {
            return Ok(None);
        };

        // Silent sliding refresh: at most once per refresh interval.
        let mut expires_at = record.expires_at;
        let refresh_due = Utc::now() - record.refreshed_at
            >= chrono::Duration::seconds(self.config.session_refresh_seconds());
        if refresh_due {
            expires_at =
                storage::refresh_session(&self.pool, token_hash, self.config.session_ttl_seconds())
                    .await?;
        }

        let identity = Identity {
            id: record.user_id,
            email: record.email,
            name: record.name,
        };
        self.cache
            .insert(token_hash.to_vec(), identity.clone(), expires_at)
            .await;

        Ok(Some(identity))
    }
}

/// The default engine: users, hashed session tokens, one-time tokens, and
/// one-time codes in Postgres.
pub struct SqlAuthEngine {
    inner: Arc<EngineState>,
}

impl SqlAuthEngine {
    #[must_use]
    pub fn new(pool: PgPool, config: EngineConfig, mailer: Arc<dyn Mailer>) -> Self {
        let cache = SessionCache::new(Duration::from_secs(config.session_cache_seconds()));
        let providers = config
            .oauth_providers()
            .iter()
            .filter_map(oauth::Provider::from_credentials)
            .collect();
        Self {
            inner: Arc::new(EngineState {
                pool,
                config,
                mailer,
                cache,
                http: reqwest::Client::new(),
                providers,
            }),
        }
    }
}

#[async_trait]
impl AuthEngine for SqlAuthEngine {
    async fn resolve_session(&self, headers: &HeaderMap) -> Result<Option<Identity>, AuthError> {
        let Some(token) = utils::extract_session_token(headers) else {
            return Ok(None);
        };
        // Only the hash is stored; never compare raw tokens against the database.
        let token_hash = utils::hash_token(&token);
        self.inner.resolve_token_hash(&token_hash).await
    }

    fn router(&self) -> Router {
        handlers::router(Arc::clone(&self.inner))
    }
}
