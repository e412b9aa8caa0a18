//! Contact repository.
//!
//! Uses runtime-unchecked SQL (`query_as` with explicit binds) to avoid
//! requiring `DATABASE_URL` at compile time, matching the reference
//! repositories.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use orchestrator_models::Contact;

pub struct ContactRepository {
    pool: PgPool,
}

const CONTACT_COLUMNS: &str = r#"
    id, event_id, name, prefix, email, cc_store, stage, status,
    last_message_type, last_triggered_at, last_sent_body, last_sent_at,
    last_reply_body, last_reply_at, campaign_paused, email_bounced,
    flow_type, attachment, attachment_filename, attachment_mimetype,
    forms_link, payment_link, invoice_number, assigned_to, email_error,
    last_error_at, trigger, created_at, updated_at
"#;

impl ContactRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Contact>> {
        let sql = format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = $1");
        sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("failed to fetch contact by id")
    }

    /// Every contact eligible for the decision engine's 60s tick
    /// (spec §4.4): not paused, not in a terminal status/stage,
    /// oldest `last_triggered_at` first with nulls first so freshly
    /// created contacts are seen promptly.
    pub async fn find_eligible_for_decision_engine(&self, limit: i64) -> Result<Vec<Contact>> {
        let sql = format!(
            r#"
            SELECT {CONTACT_COLUMNS} FROM contacts
            WHERE campaign_paused = FALSE
              AND status NOT IN ('completed', 'cancelled', 'Replied')
              AND stage NOT IN ('completed', 'cancelled')
            ORDER BY last_triggered_at ASC NULLS FIRST
            LIMIT $1
            "#
        );
        sqlx::query_as(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch contacts eligible for the decision engine")
    }

    /// Every contact the reply detector should check for inbound
    /// correlation (spec §4.5 prefetch): not paused, status not
    /// terminal.
    pub async fn find_active_for_reply_detection(&self) -> Result<Vec<Contact>> {
        let sql = format!(
            r#"
            SELECT {CONTACT_COLUMNS} FROM contacts
            WHERE campaign_paused = FALSE
              AND status NOT IN ('completed', 'cancelled', 'Replied')
            "#
        );
        sqlx::query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .context("failed to fetch contacts for reply detection")
    }

    /// Writes owned by the decision engine (spec §3 ownership split):
    /// `status`, `last_message_type`, `last_triggered_at`, plus the
    /// trigger audit append.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_decision_enqueue(
        &self,
        contact_id: i64,
        new_status: &str,
        new_last_message_type: &str,
        triggered_at: DateTime<Utc>,
        trigger_line: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contacts SET
                status = $2,
                last_message_type = $3,
                last_triggered_at = $4,
                trigger = COALESCE(trigger || E'\n', '') || $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contact_id)
        .bind(new_status)
        .bind(new_last_message_type)
        .bind(triggered_at)
        .bind(trigger_line)
        .execute(&self.pool)
        .await
        .context("failed to record decision-engine enqueue")?;
        Ok(())
    }

    /// Resets the contact for operator review when the stage changes
    /// out of {forms, payments, sepa, rh} (spec §3 invariant).
    pub async fn reset_for_stage_change(&self, contact_id: i64, new_stage: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contacts SET
                stage = $2,
                last_message_type = NULL,
                campaign_paused = TRUE,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contact_id)
        .bind(new_stage)
        .execute(&self.pool)
        .await
        .context("failed to reset contact for stage change")?;
        Ok(())
    }

    /// Writes owned by the send worker: mirrors the sent body/time on
    /// the contact and sets the post-send status token (spec §4.3
    /// step 10).
    pub async fn mark_send_mirrored(
        &self,
        contact_id: i64,
        sent_body: &str,
        sent_at: DateTime<Utc>,
        status_token: &str,
        trigger_line: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contacts SET
                last_sent_body = $2,
                last_sent_at = $3,
                status = $4,
                trigger = COALESCE(trigger || E'\n', '') || $5,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contact_id)
        .bind(sent_body)
        .bind(sent_at)
        .bind(status_token)
        .bind(trigger_line)
        .execute(&self.pool)
        .await
        .context("failed to mirror send onto contact")?;
        Ok(())
    }

    /// Appends a trigger-audit line without touching `last_error_at`
    /// (spec §7 "template render failure": logged and audited, but the
    /// contact otherwise keeps deciding from its current
    /// `last_message_type`/cadence anchor next tick rather than falling
    /// into the send-failure retry gate).
    pub async fn append_trigger_line(&self, contact_id: i64, trigger_line: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contacts SET
                trigger = COALESCE(trigger || E'\n', '') || $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contact_id)
        .bind(trigger_line)
        .execute(&self.pool)
        .await
        .context("failed to append trigger line to contact")?;
        Ok(())
    }

    pub async fn record_send_error(&self, contact_id: i64, error_text: &str) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contacts SET
                email_error = $2,
                last_error_at = NOW(),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contact_id)
        .bind(error_text)
        .execute(&self.pool)
        .await
        .context("failed to record send error on contact")?;
        Ok(())
    }

    /// Writes owned by the reply detector: `status='Replied'`,
    /// `campaign_paused=true`, and the reply's cleaned body/timestamp
    /// for the next outgoing message's quote block (spec §3 ownership
    /// split, §4.5 step 5).
    pub async fn mark_replied(
        &self,
        contact_id: i64,
        trigger_line: &str,
        reply_body: &str,
        reply_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE contacts SET
                status = 'Replied',
                campaign_paused = TRUE,
                last_reply_body = $3,
                last_reply_at = $4,
                trigger = COALESCE(trigger || E'\n', '') || $2,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(contact_id)
        .bind(trigger_line)
        .bind(reply_body)
        .bind(reply_at)
        .execute(&self.pool)
        .await
        .context("failed to mark contact replied")?;
        Ok(())
    }

    /// Marks every contact sharing `email` as bounced (spec §4.5 step
    /// 2), excluding stages already terminal/intentional.
    pub async fn mark_bounced_by_email(&self, email: &str, trigger_line: &str) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE contacts SET
                email_bounced = TRUE,
                campaign_paused = TRUE,
                stage = CASE
                    WHEN stage IS NULL OR stage NOT IN
                        ('completed', 'invoice & confirmation', 'payment due', 'wrong person')
                    THEN 'mail delivery'
                    ELSE stage
                END,
                trigger = COALESCE(trigger || E'\n', '') || $2,
                updated_at = NOW()
            WHERE LOWER(SPLIT_PART(email, ',', 1)) = LOWER($1)
              AND email_bounced = FALSE
            "#,
        )
        .bind(email)
        .bind(trigger_line)
        .execute(&self.pool)
        .await
        .context("failed to mark contacts bounced")?;
        Ok(result.rows_affected())
    }

    pub async fn set_custom_complete(&self, contact_id: i64) -> Result<()> {
        sqlx::query("UPDATE contacts SET status = 'custom-complete', updated_at = NOW() WHERE id = $1")
            .bind(contact_id)
            .execute(&self.pool)
            .await
            .context("failed to mark custom flow complete")?;
        Ok(())
    }

    pub async fn set_step_status(&self, contact_id: i64, status: &str) -> Result<()> {
        sqlx::query("UPDATE contacts SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(contact_id)
            .bind(status)
            .execute(&self.pool)
            .await
            .context("failed to set contact step status")?;
        Ok(())
    }
}
