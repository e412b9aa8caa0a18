use anyhow::{Context, Result};
use sqlx::PgPool;

use orchestrator_models::Event;

pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Event>> {
        sqlx::query_as(
            r#"
            SELECT id, sender_email, event_name, org_name, city, venue, date2, month, created_at
            FROM events WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch event by id")
    }

    /// Every mailbox the system sends from, used by the reply detector
    /// to know which inboxes to poll (spec §4.5 prefetch: one
    /// `fetch_inbox` call per distinct sender mailbox).
    pub async fn distinct_sender_emails(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT DISTINCT sender_email FROM events")
            .fetch_all(&self.pool)
            .await
            .context("failed to list distinct sender mailboxes")?;
        Ok(rows.into_iter().map(|(email,)| email).collect())
    }
}
