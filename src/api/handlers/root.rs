use crate::api::envelope::ApiSuccess;
use axum::response::IntoResponse;
use serde_json::json;

// axum handler for the service root
pub async fn root() -> impl IntoResponse {
    ApiSuccess::new("Portcullis API").with_data(&json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
