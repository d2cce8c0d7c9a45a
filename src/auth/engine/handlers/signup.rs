//! Account creation.

use crate::{
    api::{
        ServerContext,
        envelope::{ApiError, ApiSuccess},
        handlers::internal,
    },
    auth::engine::{
        EngineState,
        storage::{self, SignupOutcome},
        types::{SignUpRequest, UserResponse},
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
use tracing::error;
use uuid::Uuid;

pub(super) async fn sign_up(
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
    payload: Option<Json<SignUpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::bad_request("Missing payload").into_response();
    };

    let email = utils::normalize_email(&request.email);
    if !utils::valid_email(&email) {
        return ApiError::bad_request("Validation failed")
            .with_detail(json!({"email": "invalid format"}))
            .into_response();
    }
    if let Err(violations) = state.config().validate_password(&request.password) {
        return ApiError::bad_request("Validation failed")
            .with_detail(json!({"password": violations}))
            .into_response();
    }

    let password_hash = match utils::hash_password(&request.password) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let name = request.name.trim().to_string();
    let user_id = match storage::insert_user(state.pool(), &email, &name, &password_hash).await {
        Ok(SignupOutcome::Created(user_id)) => user_id,
        Ok(SignupOutcome::Conflict) => {
            return ApiError::conflict("An account with this email already exists")
                .into_response();
        }
        Err(err) => {
            error!("Failed to create user: {err}");
            return internal(&context, &err).into_response();
        }
    };

    if let Err(err) = issue_verification(&state, user_id, &email).await {
        // The account exists; verification can be re-requested later.
        error!("Failed to issue verification token: {err}");
    }

    ApiSuccess::created("Account created, verification email sent")
        .with_data(&UserResponse::new(user_id, email, name, false))
        .into_response()
}

pub(super) async fn issue_verification(
    state: &EngineState,
    user_id: Uuid,
    email: &str,
) -> anyhow::Result<()> {
    // Raw token goes into the email link; the database stores a keyed hash.
    let token = utils::generate_token()?;
    let token_hash = utils::hash_keyed(state.config().secret(), &token);
    storage::insert_one_time_token(
        state.pool(),
        user_id,
        storage::PURPOSE_VERIFY_EMAIL,
        &token_hash,
        state.config().email_token_ttl_seconds(),
    )
    .await?;

    state.send_mail(templates::verification(
        email,
        state.config().frontend_url(),
        &token,
    ));
    Ok(())
}
