use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Audit of every message, sent or received, the system originated or
/// saw. Keyed by provider `message_id`; a unique index prevents
/// re-insertion of the same inbound/outbound message.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i64,
    pub message_id: String,
    pub conversation_id: Option<String>,
    pub direction: String, // "sent" | "received"
    pub contact_id: Option<i64>,
    pub sender_email: String,
    pub recipient_email: Option<String>,
    pub subject: Option<String>,
    pub body: Option<String>,
    pub in_reply_to: Option<String>,
    pub sent_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Maps a provider `message_id` to the contact(s) it was sent to.
/// Populated on send for the primary recipient only; CCs from
/// `cc_store` are intentionally not mapped.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageContactMap {
    pub message_id: String,
    pub contact_id: i64,
    pub created_at: DateTime<Utc>,
}
