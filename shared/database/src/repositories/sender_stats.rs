use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use orchestrator_models::SenderStats;

pub struct SenderStatsRepository {
    pool: PgPool,
}

impl SenderStatsRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, key: &str) -> Result<Option<SenderStats>> {
        sqlx::query_as("SELECT key, last_sent, cooldown_seconds FROM sender_stats WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch sender stats")
    }

    /// Domain-level row dominates the per-email row (spec §4.2).
    pub async fn find_effective(&self, sender_email: &str) -> Result<Option<SenderStats>> {
        let domain_key = SenderStats::domain_key(sender_email);
        if let Some(domain_stats) = self.find(&domain_key).await? {
            return Ok(Some(domain_stats));
        }
        self.find(sender_email).await
    }

    pub async fn upsert(&self, key: &str, last_sent: DateTime<Utc>, cooldown_seconds: i32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sender_stats (key, last_sent, cooldown_seconds)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                last_sent = EXCLUDED.last_sent,
                cooldown_seconds = EXCLUDED.cooldown_seconds
            "#,
        )
        .bind(key)
        .bind(last_sent)
        .bind(cooldown_seconds)
        .execute(&self.pool)
        .await
        .context("failed to upsert sender stats")?;
        Ok(())
    }

    /// Refreshes `last_sent` without touching `cooldown_seconds`
    /// (spec §4.2: "the per-email row's last_sent is refreshed but its
    /// cooldown is not overwritten").
    pub async fn refresh_last_sent_only(&self, key: &str, last_sent: DateTime<Utc>) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sender_stats (key, last_sent, cooldown_seconds)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET last_sent = EXCLUDED.last_sent
            "#,
        )
        .bind(key)
        .bind(last_sent)
        .bind(SenderStats::DEFAULT_COOLDOWN_SECONDS)
        .execute(&self.pool)
        .await
        .context("failed to refresh sender stats last_sent")?;
        Ok(())
    }
}
