//! Engine-owned auth endpoints, nested at `/api/auth` by the server core.

mod oauth;
mod otp;
mod password;
mod session;
mod signup;
mod verification;

use crate::auth::engine::{EngineState, storage, utils};
use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    http::HeaderValue,
    routing::{get, post},
};
use std::sync::Arc;
use uuid::Uuid;

/// Anti-enumeration reply for email-keyed endpoints. The response is the
/// same whether or not the account exists.
pub(super) const GENERIC_EMAIL_MESSAGE: &str =
    "If an account matches, an email has been sent";

pub(super) const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid email or password";

pub(super) fn router(state: Arc<EngineState>) -> Router {
    Router::new()
        .route("/sign-up", post(signup::sign_up))
        .route("/sign-in", post(session::sign_in))
        .route("/session", get(session::session))
        .route("/sign-out", post(session::sign_out))
        .route("/verify-email", post(verification::verify_email))
        .route(
            "/resend-verification",
            post(verification::resend_verification),
        )
        .route("/forgot-password", post(password::forgot_password))
        .route("/reset-password", post(password::reset_password))
        .route("/otp/send", post(otp::send))
        .route("/otp/verify", post(otp::verify))
        .route("/oauth/:provider", get(oauth::authorize))
        .route("/oauth/:provider/callback", get(oauth::callback))
        .layer(Extension(state))
}

/// Create a session row and return the cookie to set.
pub(super) async fn establish_session(state: &EngineState, user_id: Uuid) -> Result<HeaderValue> {
    let token = storage::insert_session(
        state.pool(),
        user_id,
        state.config().session_ttl_seconds(),
    )
    .await?;
    utils::session_cookie(state.config(), &token).context("failed to build session cookie")
}
