//! Database helpers for users, sessions, one-time tokens, and codes.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::{generate_token, hash_token, is_unique_violation};

pub(super) const PURPOSE_VERIFY_EMAIL: &str = "verify_email";
pub(super) const PURPOSE_RESET_PASSWORD: &str = "reset_password";

/// Outcome when attempting to create a new user.
#[derive(Debug)]
pub(super) enum SignupOutcome {
    Created(Uuid),
    Conflict,
}

pub(super) struct UserRecord {
    pub(super) id: Uuid,
    pub(super) email: String,
    pub(super) name: String,
    pub(super) password_hash: Option<String>,
    pub(super) email_verified: bool,
    pub(super) otp_enabled: bool,
}

/// Minimal data returned for a valid session token.
pub(super) struct SessionRecord {
    pub(super) user_id: Uuid,
    pub(super) email: String,
    pub(super) name: String,
    pub(super) expires_at: DateTime<Utc>,
    pub(super) refreshed_at: DateTime<Utc>,
}

pub(super) async fn insert_user(
    pool: &PgPool,
    email: &str,
    name: &str,
    password_hash: &str,
) -> Result<SignupOutcome> {
    let query = r"
        INSERT INTO users (email, name, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(SignupOutcome::Created(row.get("id"))),
        Err(err) if is_unique_violation(&err) => Ok(SignupOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Insert or revive a provider-verified user. OAuth accounts have no local
/// password and arrive with a verified email.
pub(super) async fn upsert_oauth_user(pool: &PgPool, email: &str, name: &str) -> Result<Uuid> {
    let query = r"
        INSERT INTO users (email, name, password_hash, email_verified)
        VALUES ($1, $2, NULL, TRUE)
        ON CONFLICT (email) DO UPDATE
        SET email_verified = TRUE,
            updated_at = NOW()
        RETURNING id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(name)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to upsert oauth user")?;
    Ok(row.get("id"))
}

pub(super) async fn lookup_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = r"
        SELECT id, email, name, password_hash, email_verified, otp_enabled
        FROM users
        WHERE email = $1
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup user")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        password_hash: row.get("password_hash"),
        email_verified: row.get("email_verified"),
        otp_enabled: row.get("otp_enabled"),
    }))
}

pub(super) async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    ttl_seconds: i64,
) -> Result<String> {
    // Generate a random token, store only its hash, and return the raw value
    // so the caller can set the session cookie.
    let query = r"
        INSERT INTO sessions (user_id, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    for _ in 0..3 {
        let token = generate_token()?;
        let token_hash = hash_token(&token);
        let result = sqlx::query(query)
            .bind(user_id)
            .bind(token_hash)
            .bind(ttl_seconds)
            .execute(pool)
            .instrument(span.clone())
            .await;

        match result {
            Ok(_) => return Ok(token),
            Err(err) if is_unique_violation(&err) => {}
            Err(err) => return Err(err).context("failed to insert session"),
        }
    }

    Err(anyhow!("failed to generate unique session token"))
}

pub(super) async fn lookup_session(
    pool: &PgPool,
    token_hash: &[u8],
) -> Result<Option<SessionRecord>> {
    // Expiry is enforced here; refresh is the caller's decision.
    let query = r"
        SELECT users.id, users.email, users.name,
               sessions.expires_at, sessions.refreshed_at
        FROM sessions
        JOIN users ON users.id = sessions.user_id
        WHERE sessions.token_hash = $1
          AND sessions.expires_at > NOW()
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to lookup session")?;

    Ok(row.map(|row| SessionRecord {
        user_id: row.get("id"),
        email: row.get("email"),
        name: row.get("name"),
        expires_at: row.get("expires_at"),
        refreshed_at: row.get("refreshed_at"),
    }))
}

/// Slide the session window forward; returns the new expiry.
pub(super) async fn refresh_session(
    pool: &PgPool,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<DateTime<Utc>> {
    let query = r"
        UPDATE sessions
        SET expires_at = NOW() + ($2 * INTERVAL '1 second'),
            refreshed_at = NOW()
        WHERE token_hash = $1
        RETURNING expires_at
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(ttl_seconds)
        .fetch_one(pool)
        .instrument(span)
        .await
        .context("failed to refresh session")?;
    Ok(row.get("expires_at"))
}

pub(super) async fn delete_session(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    // Sign-out is idempotent; it's fine if no rows are deleted.
    let query = "DELETE FROM sessions WHERE token_hash = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete session")?;
    Ok(())
}

pub(super) async fn delete_sessions_for_user(pool: &PgPool, user_id: Uuid) -> Result<u64> {
    let query = "DELETE FROM sessions WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user sessions")?;
    Ok(result.rows_affected())
}

pub(super) async fn insert_one_time_token(
    pool: &PgPool,
    user_id: Uuid,
    purpose: &str,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO one_time_tokens (user_id, purpose, token_hash, expires_at)
        VALUES ($1, $2, $3, NOW() + ($4 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(purpose)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert one-time token")?;
    Ok(())
}

/// Consume a valid one-time token, returning its owner. `None` covers
/// unknown, expired, and already-consumed tokens alike.
pub(super) async fn consume_one_time_token(
    pool: &PgPool,
    purpose: &str,
    token_hash: &[u8],
) -> Result<Option<Uuid>> {
    let query = r"
        UPDATE one_time_tokens
        SET consumed_at = NOW()
        WHERE token_hash = $1
          AND purpose = $2
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(purpose)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume one-time token")?;
    Ok(row.map(|row| row.get("user_id")))
}

pub(super) async fn mark_email_verified(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET email_verified = TRUE,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;
    Ok(())
}

pub(super) async fn update_password(
    pool: &PgPool,
    user_id: Uuid,
    password_hash: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET password_hash = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to update password")?;
    Ok(())
}

/// Cooldown prevents repeated resend requests from spamming the mailer.
pub(super) async fn token_cooldown_active(
    pool: &PgPool,
    user_id: Uuid,
    purpose: &str,
    cooldown_seconds: i64,
) -> Result<bool> {
    let query = r"
        SELECT 1
        FROM one_time_tokens
        WHERE user_id = $1
          AND purpose = $2
          AND created_at > NOW() - ($3 * INTERVAL '1 second')
        LIMIT 1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(purpose)
        .bind(cooldown_seconds)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to check token cooldown")?;
    Ok(row.is_some())
}

/// Store a fresh one-time code, replacing any outstanding one for the user.
pub(super) async fn replace_otp_code(
    pool: &PgPool,
    user_id: Uuid,
    code_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let mut tx = pool.begin().await.context("begin otp transaction")?;

    let query = "DELETE FROM otp_codes WHERE user_id = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to delete previous otp codes")?;

    let query = r"
        INSERT INTO otp_codes (user_id, code_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(code_hash)
        .bind(ttl_seconds)
        .execute(&mut *tx)
        .instrument(span)
        .await
        .context("failed to insert otp code")?;

    tx.commit().await.context("commit otp transaction")?;
    Ok(())
}

/// Consume a matching, unexpired code. Codes are single use.
pub(super) async fn consume_otp_code(
    pool: &PgPool,
    user_id: Uuid,
    code_hash: &[u8],
) -> Result<bool> {
    let query = r"
        UPDATE otp_codes
        SET consumed_at = NOW()
        WHERE user_id = $1
          AND code_hash = $2
          AND consumed_at IS NULL
          AND expires_at > NOW()
        RETURNING user_id
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(code_hash)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume otp code")?;
    Ok(row.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_outcome_debug_names() {
        assert!(format!("{:?}", SignupOutcome::Created(Uuid::nil())).starts_with("Created"));
        assert_eq!(format!("{:?}", SignupOutcome::Conflict), "Conflict");
    }

    #[test]
    fn purposes_are_distinct() {
        assert_ne!(PURPOSE_VERIFY_EMAIL, PURPOSE_RESET_PASSWORD);
    }
}
