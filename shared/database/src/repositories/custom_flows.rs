use anyhow::{Context, Result};
use sqlx::PgPool;

use orchestrator_models::{CustomFlow, CustomFlowStep};

pub struct CustomFlowRepository {
    pool: PgPool,
}

impl CustomFlowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_active_flow_for_contact(&self, contact_id: i64) -> Result<Option<CustomFlow>> {
        sqlx::query_as(
            "SELECT id, contact_id, active, created_at FROM custom_flows WHERE contact_id = $1 AND active = TRUE LIMIT 1",
        )
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch active custom flow")
    }

    pub async fn steps_for_flow(&self, flow_id: i64) -> Result<Vec<CustomFlowStep>> {
        sqlx::query_as(
            r#"
            SELECT id, flow_id, step_order, step_type, subject, body, delay_days
            FROM custom_flow_steps
            WHERE flow_id = $1
            ORDER BY step_order ASC
            "#,
        )
        .bind(flow_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch custom flow steps")
    }

    pub async fn create_flow(&self, contact_id: i64) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            "INSERT INTO custom_flows (contact_id, active) VALUES ($1, TRUE) RETURNING id",
        )
        .bind(contact_id)
        .fetch_one(&self.pool)
        .await
        .context("failed to create custom flow")?;
        Ok(id)
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_step(
        &self,
        flow_id: i64,
        step_order: i32,
        step_type: &str,
        subject: &str,
        body: &str,
        delay_days: i32,
    ) -> Result<i64> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO custom_flow_steps (flow_id, step_order, step_type, subject, body, delay_days)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(flow_id)
        .bind(step_order)
        .bind(step_type)
        .bind(subject)
        .bind(body)
        .bind(delay_days)
        .fetch_one(&self.pool)
        .await
        .context("failed to add custom flow step")?;
        Ok(id)
    }
}
