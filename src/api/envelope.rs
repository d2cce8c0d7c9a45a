//! Uniform JSON response envelope.
//!
//! Every handler-owned endpoint terminates by emitting exactly one
//! [`ApiSuccess`] or [`ApiError`], which serialize to
//! `{success, message, statusCode, data?}`. The constructors are the only way
//! to build either variant, so `success == (statusCode < 400)` holds for
//! every response this crate produces.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;
use utoipa::ToSchema;

/// Wire shape shared by both envelope variants.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Envelope {
    pub success: bool,
    pub message: String,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Success envelope; status defaults to 200 OK.
#[derive(Debug, Clone)]
pub struct ApiSuccess {
    message: String,
    status: StatusCode,
    data: Option<Value>,
}

impl ApiSuccess {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::OK,
            data: None,
        }
    }

    #[must_use]
    pub fn created(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: StatusCode::CREATED,
            data: None,
        }
    }

    /// Attach a serializable payload. A payload that fails to serialize is
    /// logged and omitted rather than breaking the envelope contract.
    #[must_use]
    pub fn with_data<T: Serialize>(mut self, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => self.data = Some(value),
            Err(err) => error!("Failed to serialize envelope data: {err}"),
        }
        self
    }
}

impl IntoResponse for ApiSuccess {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            success: true,
            message: self.message,
            status_code: self.status.as_u16(),
            data: self.data,
        };
        (self.status, Json(envelope)).into_response()
    }
}

/// Error envelope; every constructor picks a status from the error taxonomy,
/// so callers cannot produce an error with a success status.
#[derive(Debug, Clone)]
pub struct ApiError {
    message: String,
    status: StatusCode,
    detail: Option<Value>,
}

impl ApiError {
    const INTERNAL_MESSAGE: &'static str = "Internal server error";

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::from_parts(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::from_parts(StatusCode::UNAUTHORIZED, message)
    }

    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::from_parts(StatusCode::FORBIDDEN, message)
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_parts(StatusCode::NOT_FOUND, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::from_parts(StatusCode::CONFLICT, message)
    }

    #[must_use]
    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::from_parts(StatusCode::TOO_MANY_REQUESTS, message)
    }

    #[must_use]
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::from_parts(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    /// Internal failure with a fixed message. `verbose_detail` carries the
    /// underlying error text in development and is `None` in production.
    #[must_use]
    pub fn internal(verbose_detail: Option<String>) -> Self {
        let mut response = Self::from_parts(StatusCode::INTERNAL_SERVER_ERROR, Self::INTERNAL_MESSAGE);
        response.detail = verbose_detail.map(Value::String);
        response
    }

    /// Attach structured detail, e.g. per-field validation errors.
    #[must_use]
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    fn from_parts(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status,
            detail: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let envelope = Envelope {
            success: false,
            message: self.message,
            status_code: self.status.as_u16(),
            data: self.detail,
        };
        (self.status, Json(envelope)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_flag_matches_status() {
        let success = ApiSuccess::new("ok");
        assert!(success.status.as_u16() < 400);

        let created = ApiSuccess::created("made");
        assert_eq!(created.status, StatusCode::CREATED);

        for error in [
            ApiError::bad_request("bad"),
            ApiError::unauthorized("no"),
            ApiError::forbidden("no"),
            ApiError::not_found("missing"),
            ApiError::conflict("dup"),
            ApiError::too_many_requests("slow down"),
            ApiError::service_unavailable("down"),
            ApiError::internal(None),
        ] {
            assert!(error.status.as_u16() >= 400);
        }
    }

    #[test]
    fn envelope_serializes_camel_case_status() {
        let envelope = Envelope {
            success: false,
            message: "nope".to_string(),
            status_code: 404,
            data: None,
        };
        let value = serde_json::to_value(&envelope).expect("serialize");
        assert_eq!(value["statusCode"], json!(404));
        assert_eq!(value["success"], json!(false));
        assert!(value.get("data").is_none());
    }

    #[test]
    fn with_data_attaches_payload() {
        let success = ApiSuccess::new("ok").with_data(&json!({"status": "alive"}));
        assert_eq!(success.data, Some(json!({"status": "alive"})));
    }

    #[test]
    fn internal_detail_only_when_verbose() {
        let quiet = ApiError::internal(None);
        assert!(quiet.detail.is_none());

        let verbose = ApiError::internal(Some("boom".to_string()));
        assert_eq!(verbose.detail, Some(Value::String("boom".to_string())));
    }

    #[test]
    fn responses_carry_the_envelope_status() {
        let response = ApiSuccess::new("ok").into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = ApiError::not_found("missing").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
