use anyhow::{Context, Result};
use sqlx::{Postgres, Transaction};

pub struct MessageContactMapRepository;

impl MessageContactMapRepository {
    /// Populated on send for the primary recipient only (spec §3):
    /// CCs from `cc_store` are intentionally not mapped.
    pub async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        message_id: &str,
        contact_id: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO message_contact_map (message_id, contact_id)
            VALUES ($1, $2)
            ON CONFLICT (message_id) DO NOTHING
            "#,
        )
        .bind(message_id)
        .bind(contact_id)
        .execute(&mut **tx)
        .await
        .context("failed to insert message-contact map row")?;
        Ok(())
    }

    pub async fn find_contact_id(
        pool: &sqlx::PgPool,
        message_id: &str,
    ) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT contact_id FROM message_contact_map WHERE message_id = $1",
        )
        .bind(message_id)
        .fetch_optional(pool)
        .await
        .context("failed to look up message-contact map")?;
        Ok(row.map(|(id,)| id))
    }
}
