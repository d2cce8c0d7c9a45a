//! Engine configuration: URLs, lifetimes, password policy, and OAuth
//! provider credentials.

use secrecy::SecretString;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_SESSION_REFRESH_SECONDS: i64 = 24 * 60 * 60;
const DEFAULT_SESSION_CACHE_SECONDS: u64 = 5 * 60;
const DEFAULT_EMAIL_TOKEN_TTL_SECONDS: i64 = 30 * 60;
const DEFAULT_RESEND_COOLDOWN_SECONDS: i64 = 60;
const DEFAULT_OTP_TTL_SECONDS: i64 = 10 * 60;

const PASSWORD_MIN_CHARS: usize = 8;
const PASSWORD_MAX_CHARS: usize = 128;

/// OAuth client credentials for a single provider.
#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub provider: String,
    pub client_id: String,
    pub client_secret: SecretString,
}

#[derive(Clone, Debug)]
pub struct EngineConfig {
    base_url: String,
    frontend_url: String,
    secret: SecretString,
    session_ttl_seconds: i64,
    session_refresh_seconds: i64,
    session_cache_seconds: u64,
    email_token_ttl_seconds: i64,
    resend_cooldown_seconds: i64,
    otp_ttl_seconds: i64,
    oauth: Vec<OAuthCredentials>,
}

impl EngineConfig {
    #[must_use]
    pub fn new(base_url: String, frontend_url: String) -> Self {
        Self {
            base_url,
            frontend_url,
            secret: SecretString::from(String::new()),
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            session_refresh_seconds: DEFAULT_SESSION_REFRESH_SECONDS,
            session_cache_seconds: DEFAULT_SESSION_CACHE_SECONDS,
            email_token_ttl_seconds: DEFAULT_EMAIL_TOKEN_TTL_SECONDS,
            resend_cooldown_seconds: DEFAULT_RESEND_COOLDOWN_SECONDS,
            otp_ttl_seconds: DEFAULT_OTP_TTL_SECONDS,
            oauth: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_secret(mut self, secret: SecretString) -> Self {
        self.secret = secret;
        self
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_refresh_seconds(mut self, seconds: i64) -> Self {
        self.session_refresh_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_session_cache_seconds(mut self, seconds: u64) -> Self {
        self.session_cache_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_email_token_ttl_seconds(mut self, seconds: i64) -> Self {
        self.email_token_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_resend_cooldown_seconds(mut self, seconds: i64) -> Self {
        self.resend_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_otp_ttl_seconds(mut self, seconds: i64) -> Self {
        self.otp_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_oauth_providers(mut self, providers: &[OAuthCredentials]) -> Self {
        self.oauth = providers.to_vec();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }

    pub(super) fn secret(&self) -> &SecretString {
        &self.secret
    }

    pub(super) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(super) fn session_refresh_seconds(&self) -> i64 {
        self.session_refresh_seconds
    }

    pub(super) fn session_cache_seconds(&self) -> u64 {
        self.session_cache_seconds
    }

    pub(super) fn email_token_ttl_seconds(&self) -> i64 {
        self.email_token_ttl_seconds
    }

    pub(super) fn resend_cooldown_seconds(&self) -> i64 {
        self.resend_cooldown_seconds
    }

    pub(super) fn otp_ttl_seconds(&self) -> i64 {
        self.otp_ttl_seconds
    }

    pub(super) fn oauth_providers(&self) -> &[OAuthCredentials] {
        &self.oauth
    }

    /// Only mark cookies secure when the API is served over HTTPS.
    pub(super) fn session_cookie_secure(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    /// Validate a candidate password against the policy; returns the list of
    /// violated rules for the 400 response detail.
    pub(super) fn validate_password(&self, password: &str) -> Result<(), Vec<&'static str>> {
        let mut violations = Vec::new();
        let chars = password.chars().count();
        if chars < PASSWORD_MIN_CHARS {
            violations.push("must be at least 8 characters");
        }
        if chars > PASSWORD_MAX_CHARS {
            violations.push("must be at most 128 characters");
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::new(
            "http://localhost:8080".to_string(),
            "http://localhost:3000".to_string(),
        )
    }

    #[test]
    fn lifetime_defaults() {
        let config = config();
        assert_eq!(config.session_ttl_seconds(), 604_800);
        assert_eq!(config.session_refresh_seconds(), 86_400);
        assert_eq!(config.session_cache_seconds(), 300);
        assert_eq!(config.email_token_ttl_seconds(), 1800);
        assert_eq!(config.otp_ttl_seconds(), 600);
    }

    #[test]
    fn cookie_secure_follows_base_url_scheme() {
        assert!(!config().session_cookie_secure());
        let https = EngineConfig::new(
            "https://api.example.com".to_string(),
            "https://example.com".to_string(),
        );
        assert!(https.session_cookie_secure());
    }

    #[test]
    fn password_policy_bounds() {
        let config = config();
        assert!(config.validate_password("longenough").is_ok());
        assert!(config.validate_password("short").is_err());
        assert!(config.validate_password(&"a".repeat(129)).is_err());
        // Multibyte characters count as characters, not bytes.
        assert!(config.validate_password("pässwörd").is_ok());
    }
}
