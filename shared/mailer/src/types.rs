use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct Attachment {
    pub filename: String,
    pub content: Vec<u8>,
    pub mimetype: String,
}

/// Everything needed to send one outbound message. Mirrors one email
/// queue row.
#[derive(Debug, Clone)]
pub struct SendMailRequest {
    pub sender_email: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
    pub references: Option<String>,
    pub attachment: Option<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent { message_id: String, conversation_id: Option<String> },
    Failed { error_message: String, http_status: Option<u16> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboxMessage {
    pub message_id: String,
    pub conversation_id: Option<String>,
    pub from_address: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub in_reply_to: Option<String>,
}
