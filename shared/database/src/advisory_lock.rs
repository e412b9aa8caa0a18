//! Scoped wrappers around Postgres advisory locks (spec §5).
//!
//! Three well-known session-scoped keys keep each worker to a single
//! active instance cluster-wide. The decision engine additionally
//! takes a transaction-scoped per-contact lock so two instances never
//! decide the same contact concurrently.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};

pub const QUEUE_WORKER_LOCK_KEY: i64 = 0x0551_0001;
pub const DECISION_ENGINE_LOCK_KEY: i64 = 0x0551_0002;
pub const REPLY_DETECTOR_LOCK_KEY: i64 = 0x0551_0003;

/// Holds a dedicated connection for as long as the worker runs.
/// Dropping it (or calling `release`) unlocks and returns the
/// connection to the pool.
pub struct SessionLock {
    conn: sqlx::pool::PoolConnection<Postgres>,
    key: i64,
}

impl SessionLock {
    /// Attempts to acquire the session-scoped advisory lock `key`.
    /// Returns `None` if another process already holds it.
    pub async fn try_acquire(pool: &PgPool, key: i64) -> Result<Option<Self>> {
        let mut conn = pool.acquire().await?;
        let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(&mut *conn)
            .await?;

        if acquired {
            Ok(Some(Self { conn, key }))
        } else {
            Ok(None)
        }
    }

    pub async fn release(mut self) -> Result<()> {
        sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(self.key)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }
}

/// Attempts the transaction-scoped per-contact lock used by the
/// decision engine. Released automatically on commit/rollback.
pub async fn try_acquire_contact_lock(
    tx: &mut Transaction<'_, Postgres>,
    contact_id: i64,
) -> Result<bool> {
    let (acquired,): (bool,) = sqlx::query_as("SELECT pg_try_advisory_xact_lock($1)")
        .bind(contact_id)
        .fetch_one(&mut **tx)
        .await?;
    Ok(acquired)
}

/// Convenience for tests that want a pool without going through
/// `AppConfig`.
pub async fn connect_for_tests(database_url: &str) -> Result<PgPool> {
    Ok(PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?)
}
