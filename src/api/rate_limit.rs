//! Admission-control rate limiting.
//!
//! A fixed window per source address: the first request in a window starts
//! the counter, requests beyond the ceiling are rejected with the rate-limit
//! envelope before any business logic runs. Stateless rejection, no queueing.

use crate::api::envelope::ApiError;
use axum::{
    extract::{ConnectInfo, Extension, Request},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};
use tracing::warn;

pub const RATE_LIMIT_MESSAGE: &str = "Too many requests, please try again later";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Limited,
}

pub trait RateLimiter: Send + Sync {
    fn check(&self, source: Option<&str>) -> RateLimitDecision;
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

impl RateLimiter for NoopRateLimiter {
    fn check(&self, _source: Option<&str>) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}

struct Window {
    started: Instant,
    count: u32,
}

/// Per-source fixed-window counter.
pub struct FixedWindowLimiter {
    window: Duration,
    max_requests: u32,
    windows: Mutex<HashMap<String, Window>>,
}

impl FixedWindowLimiter {
    #[must_use]
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            // Zero-width windows or ceilings would reject everything.
            window: window.max(Duration::from_millis(1)),
            max_requests: max_requests.max(1),
            windows: Mutex::new(HashMap::new()),
        }
    }
}

impl RateLimiter for FixedWindowLimiter {
    fn check(&self, source: Option<&str>) -> RateLimitDecision {
        // Requests without a resolvable source are admitted; the limiter is
        // an abuse ceiling, not an authentication gate.
        let Some(source) = source else {
            return RateLimitDecision::Allowed;
        };

        let Ok(mut windows) = self.windows.lock() else {
            return RateLimitDecision::Allowed;
        };

        // Expired windows are dropped on every check to bound the map.
        windows.retain(|_, window| window.started.elapsed() < self.window);

        let window = windows.entry(source.to_string()).or_insert(Window {
            started: Instant::now(),
            count: 0,
        });

        if window.count >= self.max_requests {
            return RateLimitDecision::Limited;
        }
        window.count += 1;
        RateLimitDecision::Allowed
    }
}

/// Extract a client address for rate limiting from common proxy headers,
/// falling back to the peer address.
fn client_source(headers: &HeaderMap, peer: Option<&SocketAddr>) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
    {
        let trimmed = first.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(real_ip) = headers.get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
    {
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    peer.map(|addr| addr.ip().to_string())
}

/// Middleware rejecting over-limit requests before they reach a handler.
pub async fn limit(
    Extension(limiter): Extension<Arc<dyn RateLimiter>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let source = client_source(request.headers(), peer.as_ref().map(|info| &info.0));

    if limiter.check(source.as_deref()) == RateLimitDecision::Limited {
        warn!(source = source.as_deref().unwrap_or("unknown"), "rate limit exceeded");
        return ApiError::too_many_requests(RATE_LIMIT_MESSAGE).into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_limiter_allows() {
        let limiter = NoopRateLimiter;
        assert_eq!(limiter.check(Some("1.2.3.4")), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(None), RateLimitDecision::Allowed);
    }

    #[test]
    fn ceiling_is_enforced_per_source() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 2);
        assert_eq!(limiter.check(Some("1.2.3.4")), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(Some("1.2.3.4")), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(Some("1.2.3.4")), RateLimitDecision::Limited);
        // A different source has its own window.
        assert_eq!(limiter.check(Some("5.6.7.8")), RateLimitDecision::Allowed);
    }

    #[test]
    fn window_expiry_resets_the_counter() {
        let limiter = FixedWindowLimiter::new(Duration::from_millis(10), 1);
        assert_eq!(limiter.check(Some("1.2.3.4")), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(Some("1.2.3.4")), RateLimitDecision::Limited);
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(limiter.check(Some("1.2.3.4")), RateLimitDecision::Allowed);
    }

    #[test]
    fn unresolvable_source_is_admitted() {
        let limiter = FixedWindowLimiter::new(Duration::from_secs(60), 1);
        assert_eq!(limiter.check(None), RateLimitDecision::Allowed);
        assert_eq!(limiter.check(None), RateLimitDecision::Allowed);
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "9.9.9.9, 10.0.0.1".parse().expect("header"));
        let peer: SocketAddr = "127.0.0.1:9000".parse().expect("addr");
        assert_eq!(
            client_source(&headers, Some(&peer)),
            Some("9.9.9.9".to_string())
        );
        assert_eq!(
            client_source(&HeaderMap::new(), Some(&peer)),
            Some("127.0.0.1".to_string())
        );
    }
}
