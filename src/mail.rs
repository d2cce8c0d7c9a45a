//! Transactional email delivery.
//!
//! The `Mailer` trait is the delivery seam: the auth engine renders a
//! template and hands the finished message over. `SmtpMailer` delivers over
//! an async SMTP relay; `LogMailer` logs the payload instead and is the local
//! dev default when no SMTP host is configured.
//!
//! The sender address question is resolved in exactly one place: when no
//! `--smtp-from` is configured, `SmtpMailer` falls back to the SMTP user.

use crate::cli::commands::smtp;
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};
use secrecy::ExposeSecret;
use tracing::info;

#[derive(Clone, Debug)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the auth engine.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a message or return an error for the caller to log.
    async fn send(&self, email: Email) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: Email) -> Result<()> {
        info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "email send stub"
        );
        Ok(())
    }
}

/// SMTP relay sender.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    /// Build the SMTP transport from parsed options.
    ///
    /// # Errors
    /// Returns an error if the relay host, credentials, or sender address are
    /// invalid.
    pub fn new(options: &smtp::Options) -> Result<Self> {
        let mut builder = if options.secure {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&options.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&options.host)
        }
        .with_context(|| format!("Invalid SMTP relay host: {}", options.host))?
        .port(options.port);

        if let (Some(user), Some(pass)) = (&options.user, &options.pass) {
            builder = builder.credentials(Credentials::new(
                user.clone(),
                pass.expose_secret().to_string(),
            ));
        }

        // --smtp-from falls back to the SMTP user when absent.
        let from = options
            .from
            .as_deref()
            .or(options.user.as_deref())
            .ok_or_else(|| anyhow!("SMTP sender required: set --smtp-from or --smtp-user"))?
            .parse::<Mailbox>()
            .context("Invalid SMTP sender address")?;

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, email: Email) -> Result<()> {
        let message = Message::builder()
            .from(self.from.clone())
            .to(email
                .to
                .parse::<Mailbox>()
                .with_context(|| format!("Invalid recipient address: {}", email.to))?)
            .subject(email.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(email.body)
            .context("Failed to build email message")?;

        self.transport
            .send(message)
            .await
            .context("SMTP delivery failed")?;

        Ok(())
    }
}

/// Template content for the transactional mail this service owns.
pub mod templates {
    use super::Email;

    #[must_use]
    pub fn verification(to: &str, frontend_url: &str, token: &str) -> Email {
        let base = frontend_url.trim_end_matches('/');
        Email {
            to: to.to_string(),
            subject: "Verify your email address".to_string(),
            body: format!(
                "Welcome!\n\nPlease confirm your email address by opening the link below:\n\n\
                 {base}/verify-email?token={token}\n\n\
                 The link expires shortly. If you did not sign up, ignore this message.\n"
            ),
        }
    }

    #[must_use]
    pub fn password_reset(to: &str, frontend_url: &str, token: &str) -> Email {
        let base = frontend_url.trim_end_matches('/');
        Email {
            to: to.to_string(),
            subject: "Reset your password".to_string(),
            body: format!(
                "A password reset was requested for your account.\n\n\
                 {base}/reset-password?token={token}\n\n\
                 The link expires shortly. If you did not request a reset, ignore this message.\n"
            ),
        }
    }

    #[must_use]
    pub fn one_time_code(to: &str, code: &str) -> Email {
        Email {
            to: to.to_string(),
            subject: "Your sign-in code".to_string(),
            body: format!(
                "Your one-time sign-in code is:\n\n    {code}\n\n\
                 The code expires shortly and can be used once.\n"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_template_links_to_frontend() {
        let email = templates::verification("user@example.com", "http://localhost:3000/", "tok");
        assert_eq!(email.to, "user@example.com");
        assert!(
            email
                .body
                .contains("http://localhost:3000/verify-email?token=tok")
        );
    }

    #[test]
    fn one_time_code_template_contains_code() {
        let email = templates::one_time_code("user@example.com", "123456");
        assert!(email.body.contains("123456"));
    }

    #[tokio::test]
    async fn smtp_from_falls_back_to_user() -> Result<()> {
        let options = smtp::Options {
            host: "smtp.example.com".to_string(),
            port: 587,
            secure: false,
            user: Some("mailer@example.com".to_string()),
            pass: Some(secrecy::SecretString::from("secret".to_string())),
            from: None,
        };
        let mailer = SmtpMailer::new(&options)?;
        assert_eq!(mailer.from.email.to_string(), "mailer@example.com");
        Ok(())
    }

    #[test]
    fn smtp_without_sender_is_rejected() {
        let options = smtp::Options {
            host: "smtp.example.com".to_string(),
            port: 587,
            secure: false,
            user: None,
            pass: None,
            from: None,
        };
        assert!(SmtpMailer::new(&options).is_err());
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() -> Result<()> {
        let mailer = LogMailer;
        mailer
            .send(templates::one_time_code("user@example.com", "000000"))
            .await
    }
}
