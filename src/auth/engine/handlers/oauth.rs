//! OAuth authorization-code flow: outbound redirect and callback.

use crate::{
    api::{ServerContext, envelope::ApiError, handlers::internal},
    auth::engine::{EngineState, storage, utils},
};
use axum::{
    extract::{Extension, Path, Query},
    http::{
        HeaderMap, StatusCode,
        header::{LOCATION, SET_COOKIE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

#[derive(Debug, Deserialize)]
pub(super) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

pub(super) async fn authorize(
    Path(provider): Path<String>,
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
) -> Response {
    let Some(oauth_provider) = state.provider(&provider) else {
        return ApiError::not_found("Unknown OAuth provider").into_response();
    };

    // The state nonce round-trips via cookie and query to bind the callback
    // to this browser.
    let nonce = match utils::generate_token() {
        Ok(nonce) => nonce,
        Err(err) => {
            error!("Failed to generate oauth state: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let redirect_uri = callback_uri(state.config().base_url(), &provider);
    let location = match oauth_provider.authorize_redirect(&redirect_uri, &nonce) {
        Ok(location) => location,
        Err(err) => {
            error!("Failed to build authorize URL: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let mut headers = HeaderMap::new();
    match location.parse() {
        Ok(value) => headers.insert(LOCATION, value),
        Err(err) => {
            error!("Invalid authorize URL: {err}");
            return internal(&context, &err).into_response();
        }
    };
    if let Ok(cookie) = utils::oauth_state_cookie(state.config(), &nonce) {
        headers.insert(SET_COOKIE, cookie);
    }

    (StatusCode::FOUND, headers).into_response()
}

pub(super) async fn callback(
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    request_headers: HeaderMap,
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
) -> Response {
    let Some(oauth_provider) = state.provider(&provider) else {
        return ApiError::not_found("Unknown OAuth provider").into_response();
    };

    if let Some(err) = query.error {
        return ApiError::bad_request(format!("OAuth sign-in failed: {err}")).into_response();
    }
    let (Some(code), Some(callback_state)) = (query.code, query.state) else {
        return ApiError::bad_request("Missing OAuth callback parameters").into_response();
    };

    let cookie_state = utils::cookie_value(&request_headers, utils::OAUTH_STATE_COOKIE_NAME);
    if cookie_state.as_deref() != Some(callback_state.as_str()) {
        return ApiError::bad_request("OAuth state mismatch").into_response();
    }

    let redirect_uri = callback_uri(state.config().base_url(), &provider);
    let access_token = match oauth_provider
        .exchange_code(state.http(), &code, &redirect_uri)
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!("OAuth code exchange failed: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let profile = match oauth_provider
        .fetch_profile(state.http(), &access_token)
        .await
    {
        Ok(profile) => profile,
        Err(err) => {
            error!("OAuth profile fetch failed: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let email = utils::normalize_email(&profile.email);
    if !utils::valid_email(&email) {
        return ApiError::bad_request("OAuth provider returned an unusable email")
            .into_response();
    }

    // Provider attested the address, so the account lands verified and
    // keeps no local password.
    let user_id = match storage::upsert_oauth_user(state.pool(), &email, profile.name.trim()).await
    {
        Ok(user_id) => user_id,
        Err(err) => {
            error!("Failed to upsert oauth user: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let session_cookie = match super::establish_session(&state, user_id).await {
        Ok(cookie) => cookie,
        Err(err) => {
            error!("Failed to create session: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let mut headers = HeaderMap::new();
    match state.config().frontend_url().parse() {
        Ok(value) => headers.insert(LOCATION, value),
        Err(err) => {
            error!("Invalid frontend URL: {err}");
            return internal(&context, &err).into_response();
        }
    };
    headers.append(SET_COOKIE, session_cookie);
    if let Ok(cleared) = utils::clear_oauth_state_cookie(state.config()) {
        headers.append(SET_COOKIE, cleared);
    }

    (StatusCode::FOUND, headers).into_response()
}

fn callback_uri(base_url: &str, provider: &str) -> String {
    let base = base_url.trim_end_matches('/');
    format!("{base}/api/auth/oauth/{provider}/callback")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_uri_trims_trailing_slash() {
        assert_eq!(
            callback_uri("http://localhost:8080/", "google"),
            "http://localhost:8080/api/auth/oauth/google/callback"
        );
    }
}
