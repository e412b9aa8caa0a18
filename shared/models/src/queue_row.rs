use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A durable job: one outbound send, at most once per
/// (contact_id, last_message_type) while pending or sent (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QueueRow {
    pub id: i64,
    pub contact_id: i64,
    pub event_id: i64,
    pub sender_email: String,
    pub recipient_email: String,
    /// Snapshot of CCs at enqueue time; never re-derived from cc_store
    /// once the row exists.
    pub cc_recipients: Option<String>,
    pub subject: String,
    pub message: String,
    pub last_message_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub scheduled_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub attachment: Option<Vec<u8>>,
    pub attachment_filename: Option<String>,
    pub attachment_mimetype: Option<String>,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
    pub in_reply_to: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: i32,
}

impl QueueRow {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }

    pub fn is_sent(&self) -> bool {
        self.status == "sent"
    }
}
