//! Health probes.
//!
//! `/health` is the full report (active database ping), `/health/live`
//! answers "is the process alive" regardless of dependencies, and
//! `/health/ready` reads the connection manager's state synchronously.

use crate::{
    api::{
        ServerContext,
        envelope::{ApiError, ApiSuccess, Envelope},
    },
    db::{ConnectionState, Database},
};
use axum::{extract::Extension, response::{IntoResponse, Response}};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthReport {
    pub uptime_seconds: u64,
    pub timestamp: String,
    pub environment: String,
    pub database: String,
    pub commit: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Database is reachable", body = Envelope),
        (status = 503, description = "Database is unreachable", body = Envelope)
    ),
    tag = "health"
)]
// axum handler for the full health report
pub async fn health(
    db: Extension<Database>,
    context: Extension<Arc<ServerContext>>,
) -> Response {
    let connected = db.ping().await;

    let report = HealthReport {
        uptime_seconds: context.uptime().as_secs(),
        timestamp: Utc::now().to_rfc3339(),
        environment: context.environment().to_string(),
        database: db.state().probe_str().to_string(),
        commit: crate::GIT_COMMIT_HASH.to_string(),
    };

    if connected {
        ApiSuccess::new("Healthy").with_data(&report).into_response()
    } else {
        ApiError::service_unavailable("Unhealthy")
            .with_detail(json!(report))
            .into_response()
    }
}

#[utoipa::path(
    get,
    path = "/health/live",
    responses(
        (status = 200, description = "Process is alive", body = Envelope)
    ),
    tag = "health"
)]
pub async fn live() -> impl IntoResponse {
    // Liveness never consults dependencies.
    ApiSuccess::new("Alive").with_data(&json!({"status": "alive"}))
}

#[utoipa::path(
    get,
    path = "/health/ready",
    responses(
        (status = 200, description = "Ready to serve dependent traffic", body = Envelope),
        (status = 503, description = "Database not connected", body = Envelope)
    ),
    tag = "health"
)]
pub async fn ready(db: Extension<Database>) -> Response {
    let state = db.state();
    if state == ConnectionState::Connected {
        ApiSuccess::new("Ready")
            .with_data(&json!({"database": state.probe_str()}))
            .into_response()
    } else {
        ApiError::service_unavailable("Not ready")
            .with_detail(json!({
                "reason": format!("database is {}", state.probe_str()),
            }))
            .into_response()
    }
}
