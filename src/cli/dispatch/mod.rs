//! Command-line argument dispatch and server initialization.
//!
//! This module maps validated CLI arguments to the appropriate action, such
//! as starting the API server with its full configuration state.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{auth, http, smtp};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);
    let environment = matches
        .get_one::<String>("environment")
        .cloned()
        .unwrap_or_else(|| "development".to_string());
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let http_opts = http::Options::parse(matches)?;
    let smtp_opts = smtp::Options::parse(matches);
    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        environment,
        dsn,
        http: http_opts,
        smtp: smtp_opts,
        auth: auth_opts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_action_from_flags() -> Result<()> {
        temp_env::with_vars(
            [
                ("PORTCULLIS_DSN", None::<&str>),
                ("PORTCULLIS_AUTH_SECRET", None::<&str>),
                ("PORTCULLIS_SMTP_HOST", None::<&str>),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec![
                    "portcullis",
                    "--dsn",
                    "postgres://localhost:5432/portcullis",
                    "--auth-secret",
                    "0123456789abcdef0123456789abcdef",
                    "--environment",
                    "production",
                ]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 8080);
                assert_eq!(args.environment, "production");
                assert_eq!(args.dsn, "postgres://localhost:5432/portcullis");
                assert!(args.smtp.is_none());
                Ok(())
            },
        )
    }

    #[test]
    fn auth_secret_required() {
        temp_env::with_vars(
            [
                ("PORTCULLIS_AUTH_SECRET", None::<&str>),
                (
                    "PORTCULLIS_DSN",
                    Some("postgres://localhost:5432/portcullis"),
                ),
            ],
            || {
                let command = crate::cli::commands::new();
                let result = command.try_get_matches_from(vec!["portcullis"]);
                assert!(result.is_err());
            },
        );
    }
}
