//! Database connection manager.
//!
//! An explicit handle owning the Postgres pool and a small state machine
//! {disconnected, connecting, connected, error}. The handle is cloned into
//! request extensions so health probes read connectivity without reaching for
//! a process-wide global. Startup makes exactly one connection attempt; a
//! failure is fatal for the caller.

use anyhow::{Context, Result};
use sqlx::{Connection, PgPool, postgres::PgPoolOptions};
use std::{
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
    time::Duration,
};
use tracing::{Instrument, error, info_span};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }

    const fn as_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::Connected => 2,
            Self::Error => 3,
        }
    }

    /// Three-valued view used by the health report.
    #[must_use]
    pub const fn probe_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Connecting => "unknown",
            Self::Disconnected | Self::Error => "disconnected",
        }
    }
}

#[derive(Clone, Debug)]
pub struct Database {
    pool: PgPool,
    state: Arc<AtomicU8>,
}

impl Database {
    /// Connect to the database with one startup attempt.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established; the state is
    /// left as `Error` and the caller is expected to treat this as fatal.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let state = Arc::new(AtomicU8::new(ConnectionState::Connecting.as_u8()));

        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .inspect_err(|_| state.store(ConnectionState::Error.as_u8(), Ordering::Release))
            .context("Failed to connect to database")?;

        state.store(ConnectionState::Connected.as_u8(), Ordering::Release);

        Ok(Self { pool, state })
    }

    /// Build a handle whose pool connects on first use.
    ///
    /// The state starts as `Disconnected` and only changes when a [`ping`]
    /// observes the store. Used by tooling and tests that need a `Database`
    /// without a live server.
    ///
    /// # Errors
    /// Returns an error if the connection string cannot be parsed.
    ///
    /// [`ping`]: Database::ping
    pub fn connect_lazy(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_lazy(dsn)
            .context("Invalid database connection string")?;

        Ok(Self {
            pool,
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.as_u8())),
        })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Current state, readable synchronously by the readiness probe.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Actively verify connectivity and update the state machine.
    pub async fn ping(&self) -> bool {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let healthy = match self.pool.acquire().instrument(acquire_span).await {
            Ok(mut conn) => {
                let ping_span =
                    info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
                match conn.ping().instrument(ping_span).await {
                    Ok(()) => true,
                    Err(err) => {
                        error!("Failed to ping database: {err}");
                        false
                    }
                }
            }
            Err(err) => {
                error!("Failed to acquire database connection: {err}");
                false
            }
        };

        let next = if healthy {
            ConnectionState::Connected
        } else {
            ConnectionState::Error
        };
        self.state.store(next.as_u8(), Ordering::Release);

        healthy
    }

    /// Release pool resources; called on graceful shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
        self.state
            .store(ConnectionState::Disconnected.as_u8(), Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Error,
        ] {
            assert_eq!(ConnectionState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn probe_str_is_three_valued() {
        assert_eq!(ConnectionState::Connected.probe_str(), "connected");
        assert_eq!(ConnectionState::Connecting.probe_str(), "unknown");
        assert_eq!(ConnectionState::Disconnected.probe_str(), "disconnected");
        assert_eq!(ConnectionState::Error.probe_str(), "disconnected");
    }

    #[tokio::test]
    async fn lazy_handle_starts_disconnected() -> Result<()> {
        let db = Database::connect_lazy("postgres://localhost:1/portcullis")?;
        assert_eq!(db.state(), ConnectionState::Disconnected);
        Ok(())
    }

    #[tokio::test]
    async fn close_transitions_to_disconnected() -> Result<()> {
        let db = Database::connect_lazy("postgres://localhost:1/portcullis")?;
        db.close().await;
        assert_eq!(db.state(), ConnectionState::Disconnected);
        Ok(())
    }
}
