//! Sign-in, current session, and sign-out.

use crate::{
    api::{
        ServerContext,
        envelope::{ApiError, ApiSuccess},
        handlers::internal,
        middleware::UNAUTHORIZED_MESSAGE,
    },
    auth::engine::{
        EngineState, storage,
        types::{SignInRequest, UserResponse},
        utils,
    },
    mail::templates,
};
use axum::{
    Json,
    extract::Extension,
    http::{HeaderMap, header::SET_COOKIE},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::error;

use super::{INVALID_CREDENTIALS_MESSAGE, establish_session};

pub(super) async fn sign_in(
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
    payload: Option<Json<SignInRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::bad_request("Missing payload").into_response();
    };

    let email = utils::normalize_email(&request.email);
    let user = match storage::lookup_user_by_email(state.pool(), &email).await {
        Ok(user) => user,
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return internal(&context, &err).into_response();
        }
    };

    // One fixed message for unknown accounts, OAuth-only accounts, and wrong
    // passwords alike.
    let Some(user) = user else {
        return ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE).into_response();
    };
    let Some(password_hash) = user.password_hash.as_deref() else {
        return ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE).into_response();
    };
    if !utils::verify_password(&request.password, password_hash) {
        return ApiError::unauthorized(INVALID_CREDENTIALS_MESSAGE).into_response();
    }

    if !user.email_verified {
        return ApiError::forbidden("Email not verified").into_response();
    }

    if user.otp_enabled {
        // Password alone is not enough; finish via /otp/verify.
        let code = utils::generate_otp_code();
        let code_hash = utils::hash_keyed(state.config().secret(), &code);
        if let Err(err) = storage::replace_otp_code(
            state.pool(),
            user.id,
            &code_hash,
            state.config().otp_ttl_seconds(),
        )
        .await
        {
            error!("Failed to store one-time code: {err}");
            return internal(&context, &err).into_response();
        }
        state.send_mail(templates::one_time_code(&user.email, &code));
        return ApiSuccess::new("A sign-in code has been sent")
            .with_data(&json!({"otpRequired": true}))
            .into_response();
    }

    let cookie = match establish_session(&state, user.id).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to create session: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(SET_COOKIE, cookie);
    (
        headers,
        ApiSuccess::new("Signed in").with_data(&UserResponse::new(
            user.id,
            user.email,
            user.name,
            user.email_verified,
        )),
    )
        .into_response()
}

pub(super) async fn session(
    headers: HeaderMap,
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
) -> Response {
    let Some(token) = utils::extract_session_token(&headers) else {
        return ApiError::unauthorized(UNAUTHORIZED_MESSAGE).into_response();
    };
    let token_hash = utils::hash_token(&token);
    match state.resolve_token_hash(&token_hash).await {
        Ok(Some(identity)) => ApiSuccess::new("Session active")
            .with_data(&json!({
                "id": identity.id.to_string(),
                "email": identity.email,
                "name": identity.name,
            }))
            .into_response(),
        Ok(None) => ApiError::unauthorized(UNAUTHORIZED_MESSAGE).into_response(),
        Err(err) => {
            error!("Failed to resolve session: {err}");
            internal(&context, &err).into_response()
        }
    }
}

pub(super) async fn sign_out(headers: HeaderMap, state: Extension<Arc<EngineState>>) -> Response {
    if let Some(token) = utils::extract_session_token(&headers) {
        let token_hash = utils::hash_token(&token);
        if let Err(err) = storage::delete_session(state.pool(), &token_hash).await {
            error!("Failed to delete session: {err}");
        }
        state.cache().invalidate(&token_hash).await;
    }

    // Always clear the cookie, even if the session record was missing.
    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = utils::clear_session_cookie(state.config()) {
        response_headers.insert(SET_COOKIE, cookie);
    }
    (response_headers, ApiSuccess::new("Signed out")).into_response()
}
