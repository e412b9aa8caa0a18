use anyhow::{Context, Result};
use sqlx::PgPool;

pub struct BouncedEmailRepository {
    pool: PgPool,
}

impl BouncedEmailRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn is_bounced(&self, email: &str) -> Result<bool> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT email FROM bounced_emails WHERE LOWER(email) = LOWER($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .context("failed to check bounced-email set")?;
        Ok(row.is_some())
    }

    /// `ON CONFLICT ... DO UPDATE` upsert incrementing `bounce_count`,
    /// mirroring `handle_bounce_email`'s upsert in the original
    /// implementation.
    pub async fn upsert_bounce(&self, email: &str, bounce_type: &str, bounce_reason: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bounced_emails (email, first_bounced_at, last_bounced_at, bounce_count, bounce_type, bounce_reason)
            VALUES (LOWER($1), NOW(), NOW(), 1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET
                last_bounced_at = NOW(),
                bounce_count = bounced_emails.bounce_count + 1,
                bounce_type = EXCLUDED.bounce_type,
                bounce_reason = EXCLUDED.bounce_reason
            "#,
        )
        .bind(email)
        .bind(bounce_type)
        .bind(bounce_reason)
        .execute(&self.pool)
        .await
        .context("failed to upsert bounced email")?;
        Ok(())
    }
}
