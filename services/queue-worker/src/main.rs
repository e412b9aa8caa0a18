mod cadence;
mod processing;

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use orchestrator_database::{
    create_postgres_pool, health_check, BouncedEmailRepository, ContactRepository, MessageRepository,
    QueueRepository, SenderStatsRepository, SessionLock, QUEUE_WORKER_LOCK_KEY,
};
use orchestrator_mailer::{GraphMailTransport, MailTransport, SenderCredentials};
use orchestrator_util::{init_logging, init_metrics, serve_metrics, AppConfig};

use processing::QueueWorker;

const SERVICE_NAME: &str = "queue-worker";

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

    let Some(_lock) = SessionLock::try_acquire(&pool, QUEUE_WORKER_LOCK_KEY).await? else {
        info!("another queue-worker instance already holds the advisory lock, exiting");
        return Ok(());
    };

    let transport = build_transport(&config.graph);

    let worker = QueueWorker {
        queue: QueueRepository::new(pool.clone()),
        contacts: ContactRepository::new(pool.clone()),
        messages: MessageRepository::new(pool.clone()),
        sender_stats: SenderStatsRepository::new(pool.clone()),
        bounced: BouncedEmailRepository::new(pool.clone()),
        transport,
        pool: pool.clone(),
        batch_size: config.queue_worker.batch_size,
    };

    info!(poll_interval_seconds = config.queue_worker.poll_interval_seconds, "queue-worker started");

    let mut interval = tokio::time::interval(Duration::from_secs(config.queue_worker.poll_interval_seconds));
    loop {
        interval.tick().await;
        orchestrator_util::record_tick(SERVICE_NAME);
        if let Err(err) = worker.run_tick().await {
            orchestrator_util::record_tick_error(SERVICE_NAME);
            error!(error = %err, "queue-worker tick failed");
        }
    }
}

fn build_transport(graph: &orchestrator_util::GraphConfig) -> MailTransport {
    let credentials = graph
        .senders
        .iter()
        .map(|s| SenderCredentials {
            sender_email: s.sender_email.clone(),
            tenant_id: s.tenant_id.clone(),
            client_id: s.client_id.clone(),
            client_secret: s.client_secret.clone(),
        })
        .collect();

    let default_credentials = if graph.tenant_id.is_empty() {
        None
    } else {
        Some(SenderCredentials {
            sender_email: String::new(),
            tenant_id: graph.tenant_id.clone(),
            client_id: graph.client_id.clone(),
            client_secret: graph.client_secret.clone(),
        })
    };

    GraphMailTransport::with_default(&graph.graph_base_url, &graph.scope, credentials, default_credentials).into()
}
