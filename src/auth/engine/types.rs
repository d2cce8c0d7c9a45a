//! Request and response bodies for the auth endpoints.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Shared shape for endpoints keyed by email only.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TokenRequest {
    pub token: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OtpVerifyRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub email_verified: bool,
}

impl UserResponse {
    pub(super) fn new(id: Uuid, email: String, name: String, email_verified: bool) -> Self {
        Self {
            id: id.to_string(),
            email,
            name,
            email_verified,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn user_response_serializes_camel_case() {
        let response = UserResponse::new(
            Uuid::nil(),
            "a@example.com".to_string(),
            "A".to_string(),
            true,
        );
        let value = serde_json::to_value(&response).expect("serialize");
        assert_eq!(value["emailVerified"], json!(true));
        assert_eq!(value["id"], json!(Uuid::nil().to_string()));
    }

    #[test]
    fn sign_up_request_defaults_name() {
        let request: SignUpRequest =
            serde_json::from_value(json!({"email": "a@example.com", "password": "longenough"}))
                .expect("deserialize");
        assert_eq!(request.name, "");
    }
}
