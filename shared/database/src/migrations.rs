use anyhow::Result;
use sqlx::PgPool;

/// Creates the schema described in spec §3. Idempotent: safe to run on
/// every process start, mirroring the reference `run_postgres_migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("running schema migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id BIGSERIAL PRIMARY KEY,
            sender_email VARCHAR NOT NULL,
            event_name VARCHAR NOT NULL,
            org_name VARCHAR,
            city VARCHAR,
            venue VARCHAR,
            date2 VARCHAR,
            month VARCHAR,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id BIGSERIAL PRIMARY KEY,
            event_id BIGINT NOT NULL REFERENCES events(id),
            name VARCHAR NOT NULL,
            prefix VARCHAR,
            email VARCHAR NOT NULL,
            cc_store VARCHAR,
            stage VARCHAR NOT NULL DEFAULT 'initial',
            status VARCHAR NOT NULL DEFAULT 'pending',
            last_message_type VARCHAR,
            last_triggered_at TIMESTAMPTZ,
            last_sent_body TEXT,
            last_sent_at TIMESTAMPTZ,
            last_reply_body TEXT,
            last_reply_at TIMESTAMPTZ,
            campaign_paused BOOLEAN NOT NULL DEFAULT FALSE,
            email_bounced BOOLEAN NOT NULL DEFAULT FALSE,
            flow_type VARCHAR,
            attachment BYTEA,
            attachment_filename VARCHAR,
            attachment_mimetype VARCHAR,
            forms_link VARCHAR,
            payment_link VARCHAR,
            invoice_number VARCHAR,
            assigned_to VARCHAR,
            email_error TEXT,
            last_error_at TIMESTAMPTZ,
            trigger TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_queue (
            id BIGSERIAL PRIMARY KEY,
            contact_id BIGINT NOT NULL REFERENCES contacts(id),
            event_id BIGINT NOT NULL REFERENCES events(id),
            sender_email VARCHAR NOT NULL,
            recipient_email VARCHAR NOT NULL,
            cc_recipients VARCHAR,
            subject VARCHAR NOT NULL,
            message TEXT NOT NULL,
            last_message_type VARCHAR NOT NULL,
            status VARCHAR NOT NULL DEFAULT 'pending',
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            due_at TIMESTAMPTZ NOT NULL,
            scheduled_at TIMESTAMPTZ NOT NULL,
            sent_at TIMESTAMPTZ,
            attachment BYTEA,
            attachment_filename VARCHAR,
            attachment_mimetype VARCHAR,
            conversation_id VARCHAR,
            message_id VARCHAR,
            in_reply_to VARCHAR,
            error_message TEXT,
            retry_count INT NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // The core correctness property of spec §3/§8: at most one row per
    // (contact_id, last_message_type) while pending or sent.
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS uq_email_queue_contact_message_type_active
        ON email_queue (contact_id, last_message_type)
        WHERE status IN ('pending', 'sent')
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_email_queue_scheduled ON email_queue(status, scheduled_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id BIGSERIAL PRIMARY KEY,
            message_id VARCHAR NOT NULL UNIQUE,
            conversation_id VARCHAR,
            direction VARCHAR NOT NULL,
            contact_id BIGINT REFERENCES contacts(id),
            sender_email VARCHAR NOT NULL,
            recipient_email VARCHAR,
            subject VARCHAR,
            body TEXT,
            in_reply_to VARCHAR,
            sent_at TIMESTAMPTZ NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS message_contact_map (
            message_id VARCHAR PRIMARY KEY,
            contact_id BIGINT NOT NULL REFERENCES contacts(id),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sender_stats (
            key VARCHAR PRIMARY KEY,
            last_sent TIMESTAMPTZ,
            cooldown_seconds INT NOT NULL DEFAULT 90
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS bounced_emails (
            email VARCHAR PRIMARY KEY,
            first_bounced_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            last_bounced_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            bounce_count INT NOT NULL DEFAULT 1,
            bounce_type VARCHAR NOT NULL,
            bounce_reason VARCHAR NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS custom_flows (
            id BIGSERIAL PRIMARY KEY,
            contact_id BIGINT NOT NULL REFERENCES contacts(id),
            active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS custom_flow_steps (
            id BIGSERIAL PRIMARY KEY,
            flow_id BIGINT NOT NULL REFERENCES custom_flows(id),
            step_order INT NOT NULL,
            step_type VARCHAR NOT NULL,
            subject VARCHAR NOT NULL,
            body TEXT NOT NULL,
            delay_days INT NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("schema migrations complete");
    Ok(())
}
