//! One-time sign-in codes for accounts with two-factor enabled.

use crate::{
    api::{
        ServerContext,
        envelope::{ApiError, ApiSuccess},
        handlers::internal,
    },
    auth::engine::{
        EngineState, storage,
        types::{EmailRequest, OtpVerifyRequest, UserResponse},
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
use std::sync::Arc;
use tracing::error;

use super::establish_session;

const GENERIC_CODE_MESSAGE: &str = "If the account requires a code, one has been sent";

pub(super) async fn send(
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

    // Same reply whether the account exists, has two-factor off, or gets a
    // fresh code. Issuing replaces any outstanding code.
    if let Some(user) = user
        && user.otp_enabled
        && user.email_verified
    {
        let code = utils::generate_otp_code();
        let code_hash = utils::hash_keyed(state.config().secret(), &code);
        match storage::replace_otp_code(
            state.pool(),
            user.id,
            &code_hash,
            state.config().otp_ttl_seconds(),
        )
        .await
        {
            Ok(()) => state.send_mail(templates::one_time_code(&user.email, &code)),
            Err(err) => error!("Failed to store one-time code: {err}"),
        }
    }

    ApiSuccess::new(GENERIC_CODE_MESSAGE).into_response()
}

pub(super) async fn verify(
    state: Extension<Arc<EngineState>>,
    context: Extension<Arc<ServerContext>>,
    payload: Option<Json<OtpVerifyRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return ApiError::bad_request("Missing payload").into_response();
    };

    let email = utils::normalize_email(&request.email);
    let user = match storage::lookup_user_by_email(state.pool(), &email).await {
        Ok(Some(user)) => user,
        Ok(None) => return ApiError::unauthorized("Invalid or expired code").into_response(),
        Err(err) => {
            error!("Failed to lookup user: {err}");
            return internal(&context, &err).into_response();
        }
    };

    let code_hash = utils::hash_keyed(state.config().secret(), request.code.trim());
    let consumed = match storage::consume_otp_code(state.pool(), user.id, &code_hash).await {
        Ok(consumed) => consumed,
        Err(err) => {
            error!("Failed to consume one-time code: {err}");
            return internal(&context, &err).into_response();
        }
    };
    if !consumed {
        return ApiError::unauthorized("Invalid or expired code").into_response();
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
