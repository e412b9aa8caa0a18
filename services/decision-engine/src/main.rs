mod action;
mod context;
mod engine;
mod flows;
mod immediate;
mod sending;

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use orchestrator_database::{
    create_postgres_pool, health_check, ContactRepository, CustomFlowRepository, EventRepository, MessageRepository,
    QueueRepository, SessionLock, DECISION_ENGINE_LOCK_KEY,
};
use orchestrator_util::{init_logging, init_metrics, serve_metrics, AppConfig, TemplateStore};

use engine::DecisionEngine;

const SERVICE_NAME: &str = "decision-engine";

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(&config.logging)?;

    if config.monitoring.metrics_enabled {
        init_metrics(&config.monitoring.prometheus_namespace);
        let port = config.monitoring.metrics_port;
        tokio::spawn(async move {
            if let Err(err) = serve_metrics(port).await {
                error!(error = %err, "metrics listener stopped");
            }
        });
    }

    let pool = create_postgres_pool(&config.database.postgres_url, config.database.max_connections).await?;
    health_check(&pool).await?;

    let Some(_lock) = SessionLock::try_acquire(&pool, DECISION_ENGINE_LOCK_KEY).await? else {
        info!("another decision-engine instance already holds the advisory lock, exiting");
        return Ok(());
    };

    let templates = TemplateStore::load_from_dir(Path::new(&config.templates.dir))?;

    let engine = DecisionEngine {
        queue: QueueRepository::new(pool.clone()),
        contacts: ContactRepository::new(pool.clone()),
        events: EventRepository::new(pool.clone()),
        messages: MessageRepository::new(pool.clone()),
        custom_flows: CustomFlowRepository::new(pool.clone()),
        templates,
        pool: pool.clone(),
        batch_size: config.decision_engine.batch_size,
    };

    info!(poll_interval_seconds = config.decision_engine.poll_interval_seconds, "decision-engine started");

    let mut interval = tokio::time::interval(Duration::from_secs(config.decision_engine.poll_interval_seconds));
    loop {
        interval.tick().await;
        orchestrator_util::record_tick(SERVICE_NAME);
        if let Err(err) = engine.run_tick().await {
            orchestrator_util::record_tick_error(SERVICE_NAME);
            error!(error = %err, "decision-engine tick failed");
        }
    }
}
