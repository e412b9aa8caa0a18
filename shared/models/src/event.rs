use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An event; contacts inherit their sending sender mailbox from it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: i64,
    pub sender_email: String,
    pub event_name: String,
    pub org_name: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub date2: Option<String>,
    pub month: Option<String>,
    pub created_at: DateTime<Utc>,
}
