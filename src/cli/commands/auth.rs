//! Authentication arguments: secret, URLs, session and token lifetimes, and
//! optional OAuth provider credentials.

use crate::auth::engine::OAuthCredentials;
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command, builder::ValueParser};
use secrecy::SecretString;

pub const ARG_AUTH_SECRET: &str = "auth-secret";
pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_FRONTEND_URL: &str = "frontend-url";

const MIN_SECRET_LENGTH: usize = 32;

/// Secrets shorter than 32 characters are rejected at parse time so the
/// process never binds a port with a weak signing secret.
#[must_use]
pub fn validator_auth_secret() -> ValueParser {
    ValueParser::from(
        move |secret: &str| -> std::result::Result<String, String> {
            if secret.len() < MIN_SECRET_LENGTH {
                return Err(format!(
                    "auth secret must be at least {MIN_SECRET_LENGTH} characters"
                ));
            }
            Ok(secret.to_string())
        },
    )
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_core_args(command);
    let command = with_session_args(command);
    with_oauth_args(command)
}

fn with_core_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_AUTH_SECRET)
                .long(ARG_AUTH_SECRET)
                .help("Secret used for auth token generation (min 32 chars)")
                .env("PORTCULLIS_AUTH_SECRET")
                .required(true)
                .value_parser(validator_auth_secret()),
        )
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL of this API (used for OAuth callbacks)")
                .env("PORTCULLIS_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long(ARG_FRONTEND_URL)
                .help("Frontend base URL used for email callback links")
                .env("PORTCULLIS_FRONTEND_URL")
                .default_value("http://localhost:3000"),
        )
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("session-ttl-seconds")
                .long("session-ttl-seconds")
                .help("Session cookie TTL in seconds")
                .env("PORTCULLIS_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-refresh-seconds")
                .long("session-refresh-seconds")
                .help("Interval after which a resolved session is silently extended")
                .env("PORTCULLIS_SESSION_REFRESH_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("session-cache-seconds")
                .long("session-cache-seconds")
                .help("TTL for the in-process session read cache")
                .env("PORTCULLIS_SESSION_CACHE_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("email-token-ttl-seconds")
                .long("email-token-ttl-seconds")
                .help("Email verification / password reset token TTL in seconds")
                .env("PORTCULLIS_EMAIL_TOKEN_TTL_SECONDS")
                .default_value("1800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("email-resend-cooldown-seconds")
                .long("email-resend-cooldown-seconds")
                .help("Cooldown before resending verification emails")
                .env("PORTCULLIS_EMAIL_RESEND_COOLDOWN_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new("otp-ttl-seconds")
                .long("otp-ttl-seconds")
                .help("One-time code TTL in seconds")
                .env("PORTCULLIS_OTP_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_oauth_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("oauth-google-client-id")
                .long("oauth-google-client-id")
                .help("Google OAuth client id")
                .env("PORTCULLIS_OAUTH_GOOGLE_CLIENT_ID"),
        )
        .arg(
            Arg::new("oauth-google-client-secret")
                .long("oauth-google-client-secret")
                .help("Google OAuth client secret")
                .env("PORTCULLIS_OAUTH_GOOGLE_CLIENT_SECRET"),
        )
        .arg(
            Arg::new("oauth-github-client-id")
                .long("oauth-github-client-id")
                .help("GitHub OAuth client id")
                .env("PORTCULLIS_OAUTH_GITHUB_CLIENT_ID"),
        )
        .arg(
            Arg::new("oauth-github-client-secret")
                .long("oauth-github-client-secret")
                .help("GitHub OAuth client secret")
                .env("PORTCULLIS_OAUTH_GITHUB_CLIENT_SECRET"),
        )
}

#[derive(Debug, Clone)]
pub struct Options {
    pub secret: SecretString,
    pub base_url: String,
    pub frontend_url: String,
    pub session_ttl_seconds: i64,
    pub session_refresh_seconds: i64,
    pub session_cache_seconds: u64,
    pub email_token_ttl_seconds: i64,
    pub email_resend_cooldown_seconds: i64,
    pub otp_ttl_seconds: i64,
    pub oauth: Vec<OAuthCredentials>,
}

impl Options {
    /// Extract auth options from parsed matches.
    ///
    /// # Errors
    /// Returns an error if a required argument is missing.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let secret = matches
            .get_one::<String>(ARG_AUTH_SECRET)
            .cloned()
            .context("missing required argument: --auth-secret")?;

        // Providers with partial credentials are skipped rather than rejected:
        // absence of OAuth config must not prevent email/password auth.
        let mut oauth = Vec::new();
        for provider in ["google", "github"] {
            let id = matches.get_one::<String>(&format!("oauth-{provider}-client-id"));
            let secret = matches.get_one::<String>(&format!("oauth-{provider}-client-secret"));
            if let (Some(id), Some(secret)) = (id, secret) {
                oauth.push(OAuthCredentials {
                    provider: provider.to_string(),
                    client_id: id.clone(),
                    client_secret: SecretString::from(secret.clone()),
                });
            }
        }

        Ok(Self {
            secret: SecretString::from(secret),
            base_url: matches
                .get_one::<String>(ARG_BASE_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:8080".to_string()),
            frontend_url: matches
                .get_one::<String>(ARG_FRONTEND_URL)
                .cloned()
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            session_ttl_seconds: matches
                .get_one::<i64>("session-ttl-seconds")
                .copied()
                .unwrap_or(604_800),
            session_refresh_seconds: matches
                .get_one::<i64>("session-refresh-seconds")
                .copied()
                .unwrap_or(86_400),
            session_cache_seconds: matches
                .get_one::<u64>("session-cache-seconds")
                .copied()
                .unwrap_or(300),
            email_token_ttl_seconds: matches
                .get_one::<i64>("email-token-ttl-seconds")
                .copied()
                .unwrap_or(1800),
            email_resend_cooldown_seconds: matches
                .get_one::<i64>("email-resend-cooldown-seconds")
                .copied()
                .unwrap_or(60),
            otp_ttl_seconds: matches
                .get_one::<i64>("otp-ttl-seconds")
                .copied()
                .unwrap_or(600),
            oauth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn matches_for(args: &[&str]) -> ArgMatches {
        let command = with_args(clap::Command::new("test"));
        command.get_matches_from([&["test"], args].concat())
    }

    #[test]
    fn short_secret_is_rejected() {
        let command = with_args(clap::Command::new("test"));
        let result = command.try_get_matches_from(vec!["test", "--auth-secret", "too-short"]);
        assert!(result.is_err());
    }

    #[test]
    fn partial_oauth_credentials_are_skipped() -> Result<()> {
        temp_env::with_vars(
            [
                ("PORTCULLIS_OAUTH_GOOGLE_CLIENT_ID", None::<&str>),
                ("PORTCULLIS_OAUTH_GOOGLE_CLIENT_SECRET", None::<&str>),
                ("PORTCULLIS_OAUTH_GITHUB_CLIENT_ID", None::<&str>),
                ("PORTCULLIS_OAUTH_GITHUB_CLIENT_SECRET", None::<&str>),
            ],
            || {
                let matches = matches_for(&[
                    "--auth-secret",
                    "0123456789abcdef0123456789abcdef",
                    "--oauth-google-client-id",
                    "google-id",
                ]);
                let options = Options::parse(&matches)?;
                assert!(options.oauth.is_empty());
                Ok(())
            },
        )
    }

    #[test]
    fn complete_oauth_credentials_are_registered() -> Result<()> {
        temp_env::with_vars(
            [
                ("PORTCULLIS_OAUTH_GITHUB_CLIENT_ID", None::<&str>),
                ("PORTCULLIS_OAUTH_GITHUB_CLIENT_SECRET", None::<&str>),
            ],
            || {
                let matches = matches_for(&[
                    "--auth-secret",
                    "0123456789abcdef0123456789abcdef",
                    "--oauth-google-client-id",
                    "google-id",
                    "--oauth-google-client-secret",
                    "google-secret",
                ]);
                let options = Options::parse(&matches)?;
                assert_eq!(options.oauth.len(), 1);
                assert_eq!(options.oauth[0].provider, "google");
                assert_eq!(options.oauth[0].client_id, "google-id");
                assert_eq!(options.oauth[0].client_secret.expose_secret(), "google-secret");
                Ok(())
            },
        )
    }

    #[test]
    fn lifetime_defaults() -> Result<()> {
        let matches = matches_for(&["--auth-secret", "0123456789abcdef0123456789abcdef"]);
        let options = Options::parse(&matches)?;
        assert_eq!(options.session_ttl_seconds, 604_800);
        assert_eq!(options.session_refresh_seconds, 86_400);
        assert_eq!(options.session_cache_seconds, 300);
        assert_eq!(options.otp_ttl_seconds, 600);
        Ok(())
    }
}
