//! Password reset: request a link, then redeem it.

use crate::{
    api::{
        ServerContext,
        envelope::{ApiError, ApiSuccess},
        handlers::internal,
    },
    auth::engine::{
        EngineState, storage,
        types::{EmailRequest, ResetPasswordRequest},
        utils,
    },
    mail::templates,
};
use axum::{
    Json,
    extract::Extension,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use super::GENERIC_EMAIL_MESSAGE;

pub(super) async fn forgot_password(
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

    if let Some(user) = user {
        match storage::token_cooldown_active(
            state.pool(),
            user.id,
            storage::PURPOSE_RESET_PASSWORD,
            state.config().resend_cooldown_seconds(),
        )
        .await
        {
            Ok(true) => {}
            Ok(false) => {
                if let Err(err) = issue_reset(&state, user.id, &email).await {
                    error!("Failed to issue reset token: {err}");
                }
            }
            Err(err) => {
                error!("Failed to check reset cooldown: {err}");
            }
        }
    }

    ApiSuccess::new(GENERIC_EMAIL_MESSAGE).into_response()
}

pub(super) async fn reset_password(
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
    payload: Option<Json<ResetPasswordRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::bad_request("Missing payload").into_response();
    };

    if let Err(violations) = state.config().validate_password(&request.password) {
        return ApiError::bad_request("Validation failed")
            .with_detail(json!({"password": violations}))
            .into_response();
    }

    let token_hash = utils::hash_keyed(state.config().secret(), request.token.trim());
    let consumed = storage::consume_one_time_token(
        state.pool(),
        storage::PURPOSE_RESET_PASSWORD,
        &token_hash,
    )
    .await;

    let user_id = match consumed {
        Ok(Some(user_id)) => user_id,
        Ok(None) => return ApiError::bad_request("Invalid or expired token").into_response(),
        Err(err) => {
            error!("Failed to consume reset token: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let password_hash = match utils::hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return internal(&context, &err).into_response();
        }
    };

    if let Err(err) = storage::update_password(state.pool(), user_id, &password_hash).await {
        error!("Failed to update password: {err}");
        return internal(&context, &err).into_response();
    }

    // A reset invalidates every existing session for the account.
    match storage::delete_sessions_for_user(state.pool(), user_id).await {
        Ok(revoked) => info!(user_id = %user_id, revoked, "password reset"),
        Err(err) => error!("Failed to revoke sessions after reset: {err}"),
    }
    state.cache().invalidate_user(user_id).await;

    ApiSuccess::new("Password updated").into_response()
}

async fn issue_reset(state: &EngineState, user_id: uuid::Uuid, email: &str) -> anyhow::Result<()> {
    let token = utils::generate_token()?;
    let token_hash = utils::hash_keyed(state.config().secret(), &token);
    storage::insert_one_time_token(
        state.pool(),
        user_id,
        storage::PURPOSE_RESET_PASSWORD,
        &token_hash,
        state.config().email_token_ttl_seconds(),
    )
    .await?;

    state.send_mail(templates::password_reset(
        email,
        state.config().frontend_url(),
        &token,
    ));
    Ok(())
}
