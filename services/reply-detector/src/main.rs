mod bounce;
mod correlate;
mod detector;

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use orchestrator_database::{
    create_postgres_pool, health_check, BouncedEmailRepository, ContactRepository, EventRepository, MessageRepository,
    QueueRepository, SessionLock, REPLY_DETECTOR_LOCK_KEY,
};
use orchestrator_mailer::{GraphMailTransport, MailTransport, SenderCredentials};
use orchestrator_util::{init_logging, init_metrics, serve_metrics, AppConfig};

use detector::ReplyDetector;

const INBOX_PAGE_SIZE: usize = 100;
const SERVICE_NAME: &str = "reply-detector";

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

    let Some(_lock) = SessionLock::try_acquire(&pool, REPLY_DETECTOR_LOCK_KEY).await? else {
        info!("another reply-detector instance already holds the advisory lock, exiting");
        return Ok(());
    };

    let transport = build_transport(&config.graph);

    let detector = ReplyDetector {
        pool: pool.clone(),
        contacts: ContactRepository::new(pool.clone()),
        events: EventRepository::new(pool.clone()),
        messages: MessageRepository::new(pool.clone()),
        queue: QueueRepository::new(pool.clone()),
        bounced: BouncedEmailRepository::new(pool.clone()),
        transport,
        inbox_page_size: INBOX_PAGE_SIZE,
    };

    info!(poll_interval_seconds = config.reply_detector.poll_interval_seconds, "reply-detector started");

    let mut interval = tokio::time::interval(Duration::from_secs(config.reply_detector.poll_interval_seconds));
    loop {
        interval.tick().await;
        orchestrator_util::record_tick(SERVICE_NAME);
        if let Err(err) = detector.run_tick().await {
            orchestrator_util::record_tick_error(SERVICE_NAME);
            error!(error = %err, "reply-detector tick failed");
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
