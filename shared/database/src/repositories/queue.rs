//! Email queue repository: durable job storage with priority fetch,
//! per-row locked transactions, and the duplicate-suppression queries
//! the send worker and decision engine both rely on (spec §3, §4.3).

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use orchestrator_models::QueueRow;

pub struct QueueRepository {
    pool: PgPool,
}

const QUEUE_COLUMNS: &str = r#"
    id, contact_id, event_id, sender_email, recipient_email, cc_recipients,
    subject, message, last_message_type, status, created_at, due_at,
    scheduled_at, sent_at, attachment, attachment_filename,
    attachment_mimetype, conversation_id, message_id, in_reply_to,
    error_message, retry_count
"#;

/// The priority-tier CASE expression from spec §4.3's fetch ordering.
const PRIORITY_TIER_SQL: &str = r#"
    CASE
        WHEN last_message_type IN
            ('forms_initial', 'payments_initial', 'sepa_initial', 'rh_initial',
             'forms_main', 'payment_main') THEN 1
        WHEN last_message_type LIKE 'forms_reminder%' THEN 2
        WHEN last_message_type LIKE 'payments_reminder%' THEN 3
        WHEN last_message_type LIKE 'sepa_reminder%' THEN 4
        WHEN last_message_type LIKE 'rh_reminder%' THEN 5
        WHEN last_message_type IN ('campaign_main', 'reminder1', 'reminder2') THEN 6
        ELSE 7
    END
"#;

impl QueueRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The DB's authoritative clock (spec §7 "Clock skew").
    pub async fn db_now(&self) -> Result<DateTime<Utc>> {
        let (now,): (DateTime<Utc>,) = sqlx::query_as("SELECT NOW()")
            .fetch_one(&self.pool)
            .await
            .context("failed to read db now()")?;
        Ok(now)
    }

    /// IDs of rows due now, ordered by priority tier then FIFO
    /// (spec §4.3 Fetch).
    pub async fn fetch_due_ids(&self, limit: i64) -> Result<Vec<i64>> {
        let sql = format!(
            r#"
            SELECT id FROM email_queue
            WHERE status = 'pending'
              AND (scheduled_at IS NULL OR scheduled_at <= NOW())
            ORDER BY ({PRIORITY_TIER_SQL}) ASC, created_at ASC
            LIMIT $1
            "#
        );
        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch due queue ids")?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    /// Opens a bare transaction, for callers (the decision engine's
    /// enqueue path) that need to combine an existence check and an
    /// insert atomically without claiming an existing row.
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Opens a transaction and locks one row for exclusive processing
    /// (spec §4.3: "each row its own DB transaction, row locked
    /// `FOR UPDATE SKIP LOCKED`"). Returns `None` if another process
    /// already holds the row or it is no longer pending.
    pub async fn begin_claim(&self, id: i64) -> Result<Option<(Transaction<'static, Postgres>, QueueRow)>> {
        let mut tx = self.pool.begin().await?;
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM email_queue WHERE id = $1 AND status = 'pending' FOR UPDATE SKIP LOCKED"
        );
        let row: Option<QueueRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("failed to claim queue row")?;

        match row {
            Some(row) => Ok(Some((tx, row))),
            None => {
                tx.rollback().await.ok();
                Ok(None)
            }
        }
    }

    /// Duplicate suppression (spec §4.3 step 2): another active row
    /// for the same (contact, message_type, recipient) created within
    /// the last hour.
    pub async fn has_recent_duplicate(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        contact_id: i64,
        message_type: &str,
        recipient_email: &str,
        exclude_id: i64,
    ) -> Result<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM email_queue
            WHERE contact_id = $1
              AND last_message_type = $2
              AND recipient_email = $3
              AND status IN ('pending', 'sent')
              AND id != $4
              AND created_at >= NOW() - INTERVAL '1 hour'
            "#,
        )
        .bind(contact_id)
        .bind(message_type)
        .bind(recipient_email)
        .bind(exclude_id)
        .fetch_one(&mut **tx)
        .await
        .context("failed to check duplicate queue rows")?;
        Ok(count > 0)
    }

    /// Stuck-row GC (spec §4.3 step 6): an older pending row for the
    /// same (contact, message_type) predating `id` by more than 300s.
    pub async fn find_stuck_predecessor(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        contact_id: i64,
        message_type: &str,
        id: i64,
    ) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM email_queue
            WHERE contact_id = $1
              AND last_message_type = $2
              AND status = 'pending'
              AND id != $3
              AND created_at < (SELECT created_at FROM email_queue WHERE id = $3) - INTERVAL '300 seconds'
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .bind(message_type)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .context("failed to look up stuck predecessor row")?;
        Ok(row.map(|(id,)| id))
    }

    pub async fn reschedule(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        scheduled_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query("UPDATE email_queue SET scheduled_at = $2 WHERE id = $1")
            .bind(id)
            .bind(scheduled_at)
            .execute(&mut **tx)
            .await
            .context("failed to reschedule queue row")?;
        Ok(())
    }

    pub async fn mark_skipped(&self, tx: &mut Transaction<'_, Postgres>, id: i64) -> Result<()> {
        sqlx::query("UPDATE email_queue SET status = 'skipped' WHERE id = $1")
            .bind(id)
            .execute(&mut **tx)
            .await
            .context("failed to mark queue row skipped")?;
        Ok(())
    }

    pub async fn mark_failed(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        error_message: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE email_queue SET status = 'failed', error_message = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(error_message)
        .execute(&mut **tx)
        .await
        .context("failed to mark queue row failed")?;
        Ok(())
    }

    /// Marks every pending row for a bounced address failed (spec
    /// §4.5 step 2). Runs outside a per-row transaction since it
    /// affects a whole address, not a single claimed row.
    pub async fn fail_pending_for_bounced_address(&self, email: &str, reason: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE email_queue SET status = 'failed', error_message = $2
            WHERE LOWER(recipient_email) = LOWER($1) AND status = 'pending'
            "#,
        )
        .bind(email)
        .bind(reason)
        .execute(&self.pool)
        .await
        .context("failed to fail pending rows for bounced address")?;
        Ok(result.rows_affected())
    }

    pub async fn set_attachment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        bytes: &[u8],
        filename: &str,
        mimetype: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE email_queue SET
                attachment = $2, attachment_filename = $3, attachment_mimetype = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(bytes)
        .bind(filename)
        .bind(mimetype)
        .execute(&mut **tx)
        .await
        .context("failed to persist propagated attachment")?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn mark_sent(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        sent_at: DateTime<Utc>,
        message_id: &str,
        conversation_id: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE email_queue SET
                status = 'sent', sent_at = $2, message_id = $3, conversation_id = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .bind(message_id)
        .bind(conversation_id)
        .execute(&mut **tx)
        .await
        .context("failed to mark queue row sent")?;
        Ok(())
    }

    /// Inserts a new row (decision engine enqueue path, spec §4.4).
    /// Relies on the partial unique index as the final arbiter of the
    /// at-most-one-active-row invariant; a unique-violation is
    /// surfaced to the caller to treat as "another transaction won".
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_row(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        contact_id: i64,
        event_id: i64,
        sender_email: &str,
        recipient_email: &str,
        cc_recipients: Option<&str>,
        subject: &str,
        message: &str,
        last_message_type: &str,
        due_at: DateTime<Utc>,
        scheduled_at: DateTime<Utc>,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO email_queue
                (contact_id, event_id, sender_email, recipient_email, cc_recipients,
                 subject, message, last_message_type, status, due_at, scheduled_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'pending', $9, $10)
            RETURNING id
            "#,
        )
        .bind(contact_id)
        .bind(event_id)
        .bind(sender_email)
        .bind(recipient_email)
        .bind(cc_recipients)
        .bind(subject)
        .bind(message)
        .bind(last_message_type)
        .bind(due_at)
        .bind(scheduled_at)
        .fetch_one(&mut **tx)
        .await
        .context("failed to insert queue row")?;
        Ok(id)
    }

    /// True if a pending-or-sent row already exists for
    /// (contact, message_type) — the decision engine's double-check
    /// before insert (spec §4.4 "sendCampaignMessage").
    pub async fn exists_active(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        contact_id: i64,
        message_type: &str,
    ) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT id FROM email_queue
            WHERE contact_id = $1 AND last_message_type = $2 AND status IN ('pending', 'sent')
            FOR UPDATE SKIP LOCKED
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .bind(message_type)
        .fetch_optional(&mut **tx)
        .await
        .context("failed to check active row existence")?;
        Ok(row.is_some())
    }

    /// Most recent `sent_at` for a message_type with the given exact
    /// or prefix match, used to resolve cadence anchors (spec §4.4).
    pub async fn latest_sent_at_for_type_prefix(
        &self,
        contact_id: i64,
        prefix: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let pattern = format!("{prefix}%");
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT sent_at FROM email_queue
            WHERE contact_id = $1 AND status = 'sent' AND last_message_type LIKE $2
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .bind(pattern)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up latest sent_at for type prefix")?;
        Ok(row.map(|(t,)| t))
    }

    pub async fn latest_sent_at_for_exact_type(
        &self,
        contact_id: i64,
        message_type: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        let row: Option<(DateTime<Utc>,)> = sqlx::query_as(
            r#"
            SELECT sent_at FROM email_queue
            WHERE contact_id = $1 AND status = 'sent' AND last_message_type = $2
            ORDER BY sent_at DESC
            LIMIT 1
            "#,
        )
        .bind(contact_id)
        .bind(message_type)
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up latest sent_at for exact type")?;
        Ok(row.map(|(t,)| t))
    }

    pub async fn has_pending_for_type(&self, contact_id: i64, message_type: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM email_queue WHERE contact_id = $1 AND last_message_type = $2 AND status = 'pending' LIMIT 1",
        )
        .bind(contact_id)
        .bind(message_type)
        .fetch_optional(&self.pool)
        .await
        .context("failed to check pending row for type")?;
        Ok(row.is_some())
    }

    pub async fn is_sent(&self, contact_id: i64, message_type: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT id FROM email_queue WHERE contact_id = $1 AND last_message_type = $2 AND status = 'sent' LIMIT 1",
        )
        .bind(contact_id)
        .bind(message_type)
        .fetch_optional(&self.pool)
        .await
        .context("failed to check sent row for type")?;
        Ok(row.is_some())
    }

    pub fn cadence_window(days: i64) -> Duration {
        Duration::days(days)
    }
}
