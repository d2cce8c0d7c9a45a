//! OAuth provider registry and the provider-side HTTP calls.
//!
//! Supported providers are compiled in; credentials decide which are active.
//! Authorization-code flow only: redirect out with a state nonce, exchange
//! the code server side, then read the profile endpoint.

use anyhow::{Context, Result, anyhow};
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::config::OAuthCredentials;

pub(super) struct Provider {
    name: String,
    client_id: String,
    client_secret: SecretString,
    authorize_url: &'static str,
    token_url: &'static str,
    scope: &'static str,
}

/// Normalized profile fields the engine needs from any provider.
pub(super) struct Profile {
    pub(super) email: String,
    pub(super) name: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct GoogleProfile {
    email: String,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Deserialize)]
struct GithubProfile {
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct GithubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

impl Provider {
    /// Unrecognized provider names are skipped; credential presence alone
    /// does not make a provider.
    pub(super) fn from_credentials(credentials: &OAuthCredentials) -> Option<Self> {
        let (authorize_url, token_url, scope) = match credentials.provider.as_str() {
            "google" => (
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
                "openid email profile",
            ),
            "github" => (
                "https://github.com/login/oauth/authorize",
                "https://github.com/login/oauth/access_token",
                "read:user user:email",
            ),
            _ => return None,
        };
        Some(Self {
            name: credentials.provider.clone(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            authorize_url,
            token_url,
            scope,
        })
    }

    pub(super) fn name(&self) -> &str {
        &self.name
    }

    /// Provider authorization URL for the initial redirect.
    pub(super) fn authorize_redirect(&self, redirect_uri: &str, state: &str) -> Result<String> {
        let mut url = Url::parse(self.authorize_url).context("invalid authorize URL")?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", self.scope)
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Exchange the callback code for an access token.
    pub(super) async fn exchange_code(
        &self,
        http: &reqwest::Client,
        code: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        let params = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ];
        let response = http
            .post(self.token_url)
            // GitHub replies with form-encoding unless JSON is requested.
            .header(ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .context("token exchange request failed")?
            .error_for_status()
            .context("token exchange rejected")?;

        let token: TokenResponse = response
            .json()
            .await
            .context("invalid token exchange response")?;
        Ok(token.access_token)
    }

    pub(super) async fn fetch_profile(
        &self,
        http: &reqwest::Client,
        access_token: &str,
    ) -> Result<Profile> {
        match self.name.as_str() {
            "google" => fetch_google_profile(http, access_token).await,
            "github" => fetch_github_profile(http, access_token).await,
            other => Err(anyhow!("unsupported oauth provider: {other}")),
        }
    }
}

async fn fetch_google_profile(http: &reqwest::Client, access_token: &str) -> Result<Profile> {
    let profile: GoogleProfile = http
        .get("https://openidconnect.googleapis.com/v1/userinfo")
        .header(AUTHORIZATION, format!("Bearer {access_token}"))
        .send()
        .await
        .context("google userinfo request failed")?
        .error_for_status()
        .context("google userinfo rejected")?
        .json()
        .await
        .context("invalid google userinfo response")?;

    let name = profile.name.unwrap_or_else(|| profile.email.clone());
    Ok(Profile {
        email: profile.email,
        name,
    })
}

async fn fetch_github_profile(http: &reqwest::Client, access_token: &str) -> Result<Profile> {
    let profile: GithubProfile = http
        .get("https://api.github.com/user")
        .header(AUTHORIZATION, format!("Bearer {access_token}"))
        .header(USER_AGENT, crate::APP_USER_AGENT)
        .send()
        .await
        .context("github user request failed")?
        .error_for_status()
        .context("github user rejected")?
        .json()
        .await
        .context("invalid github user response")?;

    // The public profile email may be hidden; fall back to the emails API
    // and take the verified primary address.
    let email = match profile.email {
        Some(email) => email,
        None => fetch_github_primary_email(http, access_token).await?,
    };

    let name = profile.name.unwrap_or(profile.login);
    Ok(Profile { email, name })
}

async fn fetch_github_primary_email(
    http: &reqwest::Client,
    access_token: &str,
) -> Result<String> {
    let emails: Vec<GithubEmail> = http
        .get("https://api.github.com/user/emails")
        .header(AUTHORIZATION, format!("Bearer {access_token}"))
        .header(USER_AGENT, crate::APP_USER_AGENT)
        .send()
        .await
        .context("github emails request failed")?
        .error_for_status()
        .context("github emails rejected")?
        .json()
        .await
        .context("invalid github emails response")?;

    emails
        .into_iter()
        .find(|entry| entry.primary && entry.verified)
        .map(|entry| entry.email)
        .ok_or_else(|| anyhow!("github account has no verified primary email"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials(provider: &str) -> OAuthCredentials {
        OAuthCredentials {
            provider: provider.to_string(),
            client_id: "client-id".to_string(),
            client_secret: SecretString::from("client-secret".to_string()),
        }
    }

    #[test]
    fn known_providers_are_registered() {
        assert!(Provider::from_credentials(&credentials("google")).is_some());
        assert!(Provider::from_credentials(&credentials("github")).is_some());
        assert!(Provider::from_credentials(&credentials("myspace")).is_none());
    }

    #[test]
    fn authorize_redirect_carries_state_and_callback() -> Result<()> {
        let provider = Provider::from_credentials(&credentials("google"))
            .context("google provider should exist")?;
        let url = provider.authorize_redirect(
            "http://localhost:8080/api/auth/oauth/google/callback",
            "nonce",
        )?;
        let parsed = Url::parse(&url)?;
        let pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(pairs.contains(&("state".to_string(), "nonce".to_string())));
        assert!(pairs.contains(&(
            "redirect_uri".to_string(),
            "http://localhost:8080/api/auth/oauth/google/callback".to_string()
        )));
        assert!(pairs.contains(&("response_type".to_string(), "code".to_string())));
        Ok(())
    }

    #[test]
    fn github_email_fallback_picks_verified_primary() {
        let emails = vec![
            GithubEmail {
                email: "secondary@example.com".to_string(),
                primary: false,
                verified: true,
            },
            GithubEmail {
                email: "primary@example.com".to_string(),
                primary: true,
                verified: true,
            },
        ];
        let picked = emails
            .into_iter()
            .find(|entry| entry.primary && entry.verified)
            .map(|entry| entry.email);
        assert_eq!(picked.as_deref(), Some("primary@example.com"));
    }
}
