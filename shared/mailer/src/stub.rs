use std::sync::Mutex;

use anyhow::Result;

use crate::types::{InboxMessage, SendMailRequest, SendOutcome};

/// In-memory transport for tests: records every send and serves a
/// canned inbox, with no network calls.
pub struct StubMailTransport {
    sent: Mutex<Vec<SendMailRequest>>,
    next_message_id: Mutex<u64>,
    inbox: Mutex<Vec<InboxMessage>>,
}

impl StubMailTransport {
    pub fn new() -> Self {
        Self { sent: Mutex::new(Vec::new()), next_message_id: Mutex::new(1), inbox: Mutex::new(Vec::new()) }
    }

    pub fn with_inbox(inbox: Vec<InboxMessage>) -> Self {
        let transport = Self::new();
        *transport.inbox.lock().unwrap() = inbox;
        transport
    }

    pub fn sent_requests(&self) -> Vec<SendMailRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub async fn send(&self, request: SendMailRequest) -> Result<SendOutcome> {
        let mut counter = self.next_message_id.lock().unwrap();
        let message_id = format!("stub-message-{}", *counter);
        *counter += 1;

        self.sent.lock().unwrap().push(request);
        Ok(SendOutcome::Sent { message_id, conversation_id: Some("stub-conversation".to_string()) })
    }

    pub async fn fetch_inbox(&self, _sender_email: &str, max_messages: usize) -> Result<Vec<InboxMessage>> {
        Ok(self.inbox.lock().unwrap().iter().take(max_messages).cloned().collect())
    }
}

impl Default for StubMailTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SendMailRequest {
        SendMailRequest {
            sender_email: "events@example.com".into(),
            to: vec!["jane@example.com".into()],
            cc: vec![],
            subject: "Hello".into(),
            body: "Body".into(),
            in_reply_to: None,
            references: None,
            attachment: None,
        }
    }

    #[tokio::test]
    async fn records_every_send() {
        let transport = StubMailTransport::new();
        let outcome = transport.send(request()).await.unwrap();
        assert!(matches!(outcome, SendOutcome::Sent { .. }));
        assert_eq!(transport.sent_requests().len(), 1);
    }

    #[tokio::test]
    async fn fetch_inbox_returns_seeded_messages() {
        let transport = StubMailTransport::with_inbox(vec![]);
        let messages = transport.fetch_inbox("events@example.com", 10).await.unwrap();
        assert!(messages.is_empty());
    }
}
