use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use orchestrator_models::Message;

pub struct MessageRepository {
    pool: PgPool,
}

impl MessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn exists(&self, message_id: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM messages WHERE message_id = $1")
            .bind(message_id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to check message existence")?;
        Ok(row.is_some())
    }

    /// Insert is a no-op (returns `false`) on a duplicate `message_id`
    /// thanks to the unique index — reprocessing an inbox message
    /// never creates a second row (spec §8 idempotence property).
    #[allow(clippy::too_many_arguments)]
    pub async fn insert(
        &self,
        message_id: &str,
        conversation_id: Option<&str>,
        direction: &str,
        contact_id: Option<i64>,
        sender_email: &str,
        recipient_email: Option<&str>,
        subject: Option<&str>,
        body: Option<&str>,
        in_reply_to: Option<&str>,
        sent_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages
                (message_id, conversation_id, direction, contact_id, sender_email,
                 recipient_email, subject, body, in_reply_to, sent_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (message_id) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(conversation_id)
        .bind(direction)
        .bind(contact_id)
        .bind(sender_email)
        .bind(recipient_email)
        .bind(subject)
        .bind(body)
        .bind(in_reply_to)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .context("failed to insert message audit row")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn latest_sent_at_for_contact(&self, contact_id: i64) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT sent_at FROM messages
            WHERE contact_id = $1 AND direction = 'sent'
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up latest message sent_at")?;
        Ok(row.map(|(t,)| t))
    }

    /// The most recent sent message sharing `conversation_id`, used by
    /// the reply detector's conversation-id correlation tier (spec
    /// §4.5).
    pub async fn latest_sent_by_conversation_id(&self, conversation_id: &str) -> Result<Option<Message>> {
        sqlx::query_as(
            r#"
            SELECT id, message_id, conversation_id, direction, contact_id, sender_email,
                   recipient_email, subject, body, in_reply_to, sent_at, created_at
            FROM messages
            WHERE direction = 'sent' AND conversation_id = $1
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(conversation_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up latest message by conversation id")
    }

    pub async fn latest_sent_by_recipient(&self, recipient_email: &str) -> Result<Option<Message>> {
        sqlx::query_as(
            r#"
            SELECT id, message_id, conversation_id, direction, contact_id, sender_email,
                   recipient_email, subject, body, in_reply_to, sent_at, created_at
            FROM messages
            WHERE direction = 'sent' AND LOWER(recipient_email) = LOWER($1)
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(recipient_email)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up latest message by recipient")
    }
}
