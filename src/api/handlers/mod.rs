//! Route handlers owned by the server core.
//!
//! Auth sub-routes live in the engine (`crate::auth::engine`); everything
//! here replies through the response envelope.

pub mod health;
pub mod notes;
pub mod root;

use crate::api::{ServerContext, envelope::ApiError};

/// Map an unexpected failure to the 500 envelope: verbose detail in
/// development, stripped in production.
pub(crate) fn internal(context: &ServerContext, err: &dyn std::fmt::Display) -> ApiError {
    ApiError::internal(context.verbose_errors().then(|| err.to_string()))
}
