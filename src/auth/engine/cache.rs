//! In-process read cache for session resolution.
//!
//! Entries live for a short TTL to keep hot paths off the database, but a
//! cached entry is never served past the session row's absolute expiry, so
//! revocation-by-expiry is at most one cache window late and hard expiry is
//! exact.

use crate::auth::Identity;
use chrono::{DateTime, Utc};
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

struct CachedSession {
    identity: Identity,
    session_expires_at: DateTime<Utc>,
    cached_at: Instant,
}

pub(super) struct SessionCache {
    ttl: Duration,
    entries: RwLock<HashMap<Vec<u8>, CachedSession>>,
}

impl SessionCache {
    pub(super) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub(super) async fn get(&self, token_hash: &[u8]) -> Option<Identity> {
        let entries = self.entries.read().await;
        let entry = entries.get(token_hash)?;
        if entry.cached_at.elapsed() >= self.ttl {
            return None;
        }
        if Utc::now() >= entry.session_expires_at {
            return None;
        }
        Some(entry.identity.clone())
    }

    pub(super) async fn insert(
        &self,
        token_hash: Vec<u8>,
        identity: Identity,
        session_expires_at: DateTime<Utc>,
    ) {
        let mut entries = self.entries.write().await;
        // Drop stale entries while holding the write lock anyway.
        let ttl = self.ttl;
        entries.retain(|_, entry| entry.cached_at.elapsed() < ttl);
        entries.insert(
            token_hash,
            CachedSession {
                identity,
                session_expires_at,
                cached_at: Instant::now(),
            },
        );
    }

    pub(super) async fn invalidate(&self, token_hash: &[u8]) {
        self.entries.write().await.remove(token_hash);
    }

    /// Drop every cached entry for one user, e.g. after a password reset.
    pub(super) async fn invalidate_user(&self, user_id: uuid::Uuid) {
        self.entries
            .write()
            .await
            .retain(|_, entry| entry.identity.id != user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "a@example.com".to_string(),
            name: "A".to_string(),
        }
    }

    #[tokio::test]
    async fn hit_within_ttl() {
        let cache = SessionCache::new(Duration::from_secs(60));
        let identity = identity();
        cache
            .insert(
                vec![1],
                identity.clone(),
                Utc::now() + chrono::Duration::hours(1),
            )
            .await;
        assert_eq!(cache.get(&[1]).await, Some(identity));
    }

    #[tokio::test]
    async fn miss_after_ttl() {
        let cache = SessionCache::new(Duration::ZERO);
        cache
            .insert(vec![1], identity(), Utc::now() + chrono::Duration::hours(1))
            .await;
        assert_eq!(cache.get(&[1]).await, None);
    }

    #[tokio::test]
    async fn expired_session_is_never_served() {
        // Cache TTL still open, but the session row itself has expired.
        let cache = SessionCache::new(Duration::from_secs(60));
        cache
            .insert(
                vec![1],
                identity(),
                Utc::now() - chrono::Duration::seconds(1),
            )
            .await;
        assert_eq!(cache.get(&[1]).await, None);
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = SessionCache::new(Duration::from_secs(60));
        cache
            .insert(vec![1], identity(), Utc::now() + chrono::Duration::hours(1))
            .await;
        cache.invalidate(&[1]).await;
        assert_eq!(cache.get(&[1]).await, None);
    }

    #[tokio::test]
    async fn invalidate_user_removes_all_their_entries() {
        let cache = SessionCache::new(Duration::from_secs(60));
        let user = identity();
        let other = identity();
        let expiry = Utc::now() + chrono::Duration::hours(1);
        cache.insert(vec![1], user.clone(), expiry).await;
        cache.insert(vec![2], user.clone(), expiry).await;
        cache.insert(vec![3], other.clone(), expiry).await;

        cache.invalidate_user(user.id).await;
        assert_eq!(cache.get(&[1]).await, None);
        assert_eq!(cache.get(&[2]).await, None);
        assert_eq!(cache.get(&[3]).await, Some(other));
    }
}
