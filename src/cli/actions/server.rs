use crate::{
    api::{self, rate_limit::FixedWindowLimiter},
    auth::engine::{EngineConfig, SqlAuthEngine},
    cli::commands::{auth, http, smtp},
    db::Database,
    mail::{LogMailer, Mailer, SmtpMailer},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub environment: String,
    pub dsn: String,
    pub http: http::Options,
    pub smtp: Option<smtp::Options>,
    pub auth: auth::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database connection or server startup fails.
pub async fn execute(args: Args) -> Result<()> {
    // One connection attempt; an unreachable store is fatal rather than
    // serving traffic in a degraded state.
    let db = Database::connect(&args.dsn)
        .await
        .context("Failed to connect to database")?;

    let mailer: Arc<dyn Mailer> = match &args.smtp {
        Some(options) => {
            Arc::new(SmtpMailer::new(options).context("Failed to build SMTP transport")?)
        }
        None => {
            warn!("No SMTP host configured; transactional email will be logged only");
            Arc::new(LogMailer)
        }
    };

    let config = EngineConfig::new(args.auth.base_url.clone(), args.auth.frontend_url.clone())
        .with_secret(args.auth.secret.clone())
        .with_session_ttl_seconds(args.auth.session_ttl_seconds)
        .with_session_refresh_seconds(args.auth.session_refresh_seconds)
        .with_session_cache_seconds(args.auth.session_cache_seconds)
        .with_email_token_ttl_seconds(args.auth.email_token_ttl_seconds)
        .with_resend_cooldown_seconds(args.auth.email_resend_cooldown_seconds)
        .with_otp_ttl_seconds(args.auth.otp_ttl_seconds)
        .with_oauth_providers(&args.auth.oauth);

    let engine = Arc::new(SqlAuthEngine::new(db.pool().clone(), config, mailer));

    let limiter = Arc::new(FixedWindowLimiter::new(
        Duration::from_millis(args.http.rate_limit_window_ms),
        args.http.rate_limit_max,
    ));

    info!(environment = %args.environment, "starting server");

    api::serve(
        api::ServerConfig {
            port: args.port,
            environment: args.environment,
            cors_origins: args.http.cors_origins,
        },
        db,
        engine,
        limiter,
    )
    .await
}
