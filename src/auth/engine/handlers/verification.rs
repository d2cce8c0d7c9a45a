//! Email verification: consume link tokens and resend them.

use crate::{
    api::{
        ServerContext,
        envelope::{ApiError, ApiSuccess},
        handlers::internal,
    },
    auth::engine::{
        EngineState, storage,
        types::{EmailRequest, TokenRequest},
        utils,
    },
};
use axum::{
    Json,
    extract::Extension,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::error;

use super::GENERIC_EMAIL_MESSAGE;

pub(super) async fn verify_email(
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
    payload: Option<Json<TokenRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::bad_request("Missing payload").into_response();
    };

    let token_hash = utils::hash_keyed(state.config().secret(), request.token.trim());
    let consumed = storage::consume_one_time_token(
        state.pool(),
        storage::PURPOSE_VERIFY_EMAIL,
        &token_hash,
    )
    .await;

    match consumed {
        Ok(Some(user_id)) => {
            if let Err(err) = storage::mark_email_verified(state.pool(), user_id).await {
                error!("Failed to mark email verified: {err}");
                return internal(&context, &err).into_response();
            }
            ApiSuccess::new("Email verified").into_response()
        }
        Ok(None) => ApiError::bad_request("Invalid or expired token").into_response(),
        Err(err) => {
            error!("Failed to consume verification token: {err}");
            internal(&context, &err).into_response()
        }
    }
}

pub(super) async fn resend_verification(
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
    payload: Option<Json<EmailRequest>>,
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

    // Unknown, already-verified, and cooling-down accounts all get the same
    // reply; only the first case skips work.
    if let Some(user) = user
        && !user.email_verified
    {
        match storage::token_cooldown_active(
            state.pool(),
            user.id,
            storage::PURPOSE_VERIFY_EMAIL,
            state.config().resend_cooldown_seconds(),
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                if let Err(err) = super::signup::issue_verification(&state, user.id, &email).await {
                    error!("Failed to reissue verification token: {err}");
                }
            }
            Err(err) => {
                error!("Failed to check resend cooldown: {err}");
            }
        }
    }

    ApiSuccess::new(GENERIC_EMAIL_MESSAGE).into_response()
}
