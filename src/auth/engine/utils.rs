//! Helpers for credential hashing, token handling, and cookies.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::SaltString,
};
use axum::http::{
    HeaderMap, HeaderValue,
    header::{AUTHORIZATION, COOKIE, InvalidHeaderValue},
};
use base64::Engine;
use rand::{Rng, RngCore, rngs::OsRng};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use super::config::EngineConfig;

pub(super) const SESSION_COOKIE_NAME: &str = "portcullis_session";
pub(super) const OAUTH_STATE_COOKIE_NAME: &str = "portcullis_oauth_state";

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

/// Create a random token for sessions, email links, and OAuth state.
/// The raw value only travels to the client; the database stores a hash.
pub(super) fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Six-digit one-time code, zero padded.
pub(super) fn generate_otp_code() -> String {
    let value: u32 = OsRng.gen_range(0..1_000_000);
    format!("{value:06}")
}

/// Hash a session token so raw values never touch the database.
/// The hash is used for lookups when the cookie is presented.
pub(super) fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Keyed hash for one-time tokens and codes. A leaked table dump alone is
/// not enough to forge a verification link.
pub(super) fn hash_keyed(secret: &SecretString, value: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(secret.expose_secret().as_bytes());
    hasher.update(value.as_bytes());
    hasher.finalize().to_vec()
}

pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| anyhow!("failed to hash password: {err}"))
}

pub(super) fn verify_password(password: &str, password_hash: &str) -> bool {
    PasswordHash::new(password_hash).is_ok_and(|parsed| {
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
}

/// Build a secure `HttpOnly` cookie for the session token.
pub(super) fn session_cookie(
    config: &EngineConfig,
    token: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let ttl_seconds = config.session_ttl_seconds();
    let secure = config.session_cookie_secure();
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_session_cookie(
    config: &EngineConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Short-lived cookie carrying the OAuth state nonce across the redirect.
pub(super) fn oauth_state_cookie(
    config: &EngineConfig,
    state: &str,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie =
        format!("{OAUTH_STATE_COOKIE_NAME}={state}; Path=/; HttpOnly; SameSite=Lax; Max-Age=600");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_oauth_state_cookie(
    config: &EngineConfig,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let secure = config.session_cookie_secure();
    let mut cookie =
        format!("{OAUTH_STATE_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Session token from `Authorization: Bearer` or the session cookie.
pub(super) fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    cookie_value(headers, SESSION_COOKIE_NAME)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub(super) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name && !val.is_empty() {
            return Some(val.to_string());
        }
    }
    None
}

pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn config() -> EngineConfig {
        EngineConfig::new(
            "http://localhost:8080".to_string(),
            "http://localhost:3000".to_string(),
        )
    }

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email(" Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_basic_format() {
        assert!(valid_email("a@example.com"));
        assert!(valid_email("name.surname@example.co"));
    }

    #[test]
    fn valid_email_rejects_missing_parts() {
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("missing-at.example.com"));
        assert!(!valid_email("missing-domain@"));
    }

    #[test]
    fn generate_token_round_trip() {
        let decoded_len = generate_token()
            .ok()
            .and_then(|token| URL_SAFE_NO_PAD.decode(token.as_bytes()).ok())
            .map(|bytes| bytes.len());
        assert_eq!(decoded_len, Some(32));
    }

    #[test]
    fn otp_code_is_six_digits() {
        for _ in 0..32 {
            let code = generate_otp_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn hash_token_stable() {
        let first = hash_token("token");
        let second = hash_token("token");
        let different = hash_token("other");
        assert_eq!(first, second);
        assert_ne!(first, different);
    }

    #[test]
    fn keyed_hash_depends_on_secret() {
        let a = SecretString::from("secret-a".to_string());
        let b = SecretString::from("secret-b".to_string());
        assert_eq!(hash_keyed(&a, "token"), hash_keyed(&a, "token"));
        assert_ne!(hash_keyed(&a, "token"), hash_keyed(&b, "token"));
        assert_ne!(hash_keyed(&a, "token"), hash_token("token"));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn verify_password_rejects_malformed_hash() {
        assert!(!verify_password("whatever", "not-a-phc-string"));
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie(&config(), "tok").expect("cookie");
        let value = cookie.to_str().expect("ascii");
        assert!(value.starts_with("portcullis_session=tok"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("SameSite=Lax"));
        assert!(!value.contains("Secure"));

        let https = EngineConfig::new(
            "https://api.example.com".to_string(),
            "https://example.com".to_string(),
        );
        let cookie = session_cookie(&https, "tok").expect("cookie");
        assert!(cookie.to_str().expect("ascii").contains("Secure"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie(&config()).expect("cookie");
        assert!(cookie.to_str().expect("ascii").contains("Max-Age=0"));
    }

    #[test]
    fn extract_session_token_prefers_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        headers.insert(
            COOKIE,
            HeaderValue::from_static("portcullis_session=cookie-token"),
        );
        assert_eq!(extract_session_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn extract_session_token_reads_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("other=1; portcullis_session=cookie-token"),
        );
        assert_eq!(
            extract_session_token(&headers),
            Some("cookie-token".to_string())
        );
    }

    #[test]
    fn extract_session_token_none_when_missing() {
        assert_eq!(extract_session_token(&HeaderMap::new()), None);
    }

    #[test]
    fn cookie_value_ignores_empty() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("portcullis_session="));
        assert_eq!(cookie_value(&headers, SESSION_COOKIE_NAME), None);
    }
}
