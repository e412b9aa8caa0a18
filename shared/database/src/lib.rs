pub mod advisory_lock;
pub mod migrations;
pub mod postgres;
pub mod repositories;

pub use advisory_lock::{
    try_acquire_contact_lock, SessionLock, DECISION_ENGINE_LOCK_KEY, QUEUE_WORKER_LOCK_KEY,
    REPLY_DETECTOR_LOCK_KEY,
};
pub use migrations::run_migrations;
pub use postgres::{create_postgres_pool, health_check, PgPool};
pub use repositories::{
    BouncedEmailRepository, ContactRepository, CustomFlowRepository, EventRepository,
    MessageContactMapRepository, MessageRepository, QueueRepository, SenderStatsRepository,
};
