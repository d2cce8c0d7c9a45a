//! HTTP server core: router assembly, middleware stack, and lifecycle.
//!
//! The server core knows nothing about how authentication works; it talks to
//! the engine through the [`AuthEngine`](crate::auth::AuthEngine) trait and
//! nests the engine's routes under `/api/auth`.

use crate::{
    api::handlers::root,
    auth::AuthEngine,
    db::Database,
};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    body::Body,
    extract::MatchedPath,
    http::{
        HeaderName, HeaderValue, Method, Request,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use std::{
    future::IntoFuture,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::{net::TcpListener, signal, sync::watch};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::{SetRequestHeaderLayer, SetResponseHeaderLayer},
    trace::TraceLayer,
};
use tracing::{Span, info, info_span, warn};
use ulid::Ulid;

pub mod envelope;
pub(crate) mod handlers;
pub mod middleware;
mod openapi;
pub mod rate_limit;

pub use openapi::openapi;
pub use rate_limit::{FixedWindowLimiter, NoopRateLimiter, RateLimiter};

/// Once the shutdown signal lands, in-flight requests get this long to drain
/// before the process exits anyway.
const FORCED_SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Server options resolved by the CLI.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub environment: String,
    pub cors_origins: Vec<String>,
}

/// Shared request-time facts: process start time and deployment environment.
#[derive(Debug)]
pub struct ServerContext {
    started: Instant,
    environment: String,
}

impl ServerContext {
    #[must_use]
    pub fn new(environment: impl Into<String>) -> Self {
        Self {
            started: Instant::now(),
            environment: environment.into(),
        }
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    #[must_use]
    pub fn environment(&self) -> &str {
        &self.environment
    }

    #[must_use]
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Internal error responses carry the underlying error text outside
    /// production only.
    #[must_use]
    pub fn verbose_errors(&self) -> bool {
        !self.is_production()
    }
}

/// Assemble the full application router.
///
/// Exposed separately from [`serve`] so tests can drive the router with
/// `tower::ServiceExt::oneshot` instead of a live listener.
#[must_use]
pub fn build_router(
    config: &ServerConfig,
    db: Database,
    engine: Arc<dyn AuthEngine>,
    limiter: Arc<dyn RateLimiter>,
) -> Router {
    let context = Arc::new(ServerContext::new(config.environment.clone()));

    let (health, _doc) = openapi::health_router().split_for_parts();
    let (notes, _doc) = openapi::notes_router().split_for_parts();
    let notes = notes.route_layer(axum::middleware::from_fn(middleware::require_session));

    health
        .merge(notes)
        .route("/", get(root::root))
        .nest("/api/auth", engine.router())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors_layer(&config.cors_origins))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-content-type-options"),
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("x-frame-options"),
                    HeaderValue::from_static("DENY"),
                ))
                .layer(SetResponseHeaderLayer::if_not_present(
                    HeaderName::from_static("referrer-policy"),
                    HeaderValue::from_static("no-referrer"),
                ))
                .layer(Extension(limiter))
                .layer(Extension(engine))
                .layer(Extension(db))
                .layer(Extension(context))
                // Admission control covers every route; over-limit sources
                // are rejected before dispatch.
                .layer(axum::middleware::from_fn(rate_limit::limit)),
        )
}

/// Bind, serve, and drain on SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(
    config: ServerConfig,
    db: Database,
    engine: Arc<dyn AuthEngine>,
    limiter: Arc<dyn RateLimiter>,
) -> Result<()> {
    let port = config.port;
    let app = build_router(&config, db.clone(), engine, limiter);

    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, draining connections");
        let _ = shutdown_tx.send(());
    });

    let mut drain_rx = shutdown_rx.clone();
    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = drain_rx.changed().await;
    })
    .into_future();

    let mut force_rx = shutdown_rx;
    tokio::select! {
        result = server => {
            result.context("Server error")?;
            info!("Gracefully shutdown");
        }
        () = async {
            let _ = force_rx.changed().await;
            tokio::time::sleep(FORCED_SHUTDOWN_GRACE).await;
        } => {
            warn!(
                "Connections still open after {}s, exiting",
                FORCED_SHUTDOWN_GRACE.as_secs()
            );
        }
    }

    db.close().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!("Failed to install SIGTERM handler: {err}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ]);

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if parsed.is_empty() {
        // No configured origins: open CORS, but credentials stay off since
        // a wildcard origin with credentials is rejected by browsers.
        layer.allow_origin(AllowOrigin::any())
    } else {
        layer
            .allow_origin(AllowOrigin::list(parsed))
            .allow_credentials(true)
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_reports_environment() {
        let context = ServerContext::new("production");
        assert!(context.is_production());
        assert!(!context.verbose_errors());

        let context = ServerContext::new("development");
        assert!(!context.is_production());
        assert!(context.verbose_errors());
    }

    #[test]
    fn cors_layer_builds_for_empty_and_explicit_origins() {
        // Wildcard origin must not allow credentials; a list does.
        let _open = cors_layer(&[]);
        let _scoped = cors_layer(&["https://app.example.com".to_string()]);
    }

    #[test]
    fn invalid_origin_values_are_skipped() {
        let origins = vec!["https://ok.example.com".to_string(), "\u{7f}bad".to_string()];
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        assert_eq!(parsed.len(), 1);
    }
}
