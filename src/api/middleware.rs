//! Session middleware for protected routes.
//!
//! Resolves a session from the incoming headers through the [`AuthEngine`]
//! boundary and attaches the normalized [`Identity`] to the request
//! extensions. Every failure mode — missing cookie, unknown or expired
//! token, a session row whose user is gone, or a storage error during
//! resolution — is normalized to the same fixed-message 401 so internal
//! detail never leaks.

use crate::{
    api::envelope::ApiError,
    auth::{AuthEngine, Identity},
};
use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized: missing or invalid session";

/// Reject the request unless the engine resolves a session.
pub async fn require_session(
    Extension(engine): Extension<Arc<dyn AuthEngine>>,
    mut request: Request,
    next: Next,
) -> Response {
    match engine.resolve_session(request.headers()).await {
        Ok(Some(identity)) => {
            request.extensions_mut().insert::<Identity>(identity);
            next.run(request).await
        }
        Ok(None) => ApiError::unauthorized(UNAUTHORIZED_MESSAGE).into_response(),
        Err(err) => {
            // Resolution errors are a 401, never a 500: the caller learns
            // nothing about the failure beyond "not authenticated".
            error!("Session resolution failed: {err}");
            ApiError::unauthorized(UNAUTHORIZED_MESSAGE).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthError;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use axum::{Router, body::Body, http::{HeaderMap, Request as HttpRequest, StatusCode}, routing::get};
    use tower::ServiceExt;

    struct StaticEngine {
        identity: Option<Identity>,
        fail: bool,
    }

    #[async_trait]
    impl AuthEngine for StaticEngine {
        async fn resolve_session(
            &self,
            _headers: &HeaderMap,
        ) -> Result<Option<Identity>, AuthError> {
            if self.fail {
                return Err(AuthError::Internal(anyhow!("store down")));
            }
            Ok(self.identity.clone())
        }

        fn router(&self) -> Router {
            Router::new()
        }
    }

    fn app(engine: StaticEngine) -> Router {
        let engine: Arc<dyn AuthEngine> = Arc::new(engine);
        Router::new()
            .route(
                "/protected",
                get(|Extension(identity): Extension<Identity>| async move {
                    identity.email.clone()
                }),
            )
            .route_layer(axum::middleware::from_fn(require_session))
            .layer(Extension(engine))
    }

    fn identity() -> Identity {
        Identity {
            id: uuid::Uuid::new_v4(),
            email: "user@example.com".to_string(),
            name: "User".to_string(),
        }
    }

    #[tokio::test]
    async fn missing_session_is_401() {
        let app = app(StaticEngine {
            identity: None,
            fail: false,
        });
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn resolution_error_is_401_not_500() {
        let app = app(StaticEngine {
            identity: None,
            fail: true,
        });
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn valid_session_reaches_the_handler() {
        let app = app(StaticEngine {
            identity: Some(identity()),
            fail: false,
        });
        let response = app
            .oneshot(
                HttpRequest::builder()
                    .uri("/protected")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }
}
