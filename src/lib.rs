//! # Portcullis (Authentication Boilerplate API)
//!
//! `portcullis` is a boilerplate REST API server: email/password
//! authentication with email verification, password reset, email OTP
//! two-factor, and optional OAuth providers, behind standard HTTP hardening
//! middleware and a uniform JSON response envelope.
//!
//! ## Response envelope
//!
//! Every handler-owned endpoint replies with
//! `{success, message, statusCode, data?}` where `success` is always
//! `statusCode < 400`. Handlers never emit raw framework responses.
//!
//! ## Auth engine boundary
//!
//! The server core only depends on the [`auth::AuthEngine`] trait: resolve a
//! session from request headers, and serve the `/api/auth/*` sub-routes. The
//! default engine keeps users and hashed session/one-time tokens in Postgres;
//! tests swap in a mock.
//!
//! ## Sessions
//!
//! Session cookies carry a random token; the database stores only its
//! SHA-256 hash. Sessions live 7 days, are silently refreshed once a day,
//! and resolutions are served from a short-lived in-process cache that still
//! honors the row's absolute expiry.

pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod mail;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(GIT_COMMIT_HASH.len() >= 7);
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
