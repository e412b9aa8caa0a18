use anyhow::Result;

use crate::graph::GraphMailTransport;
use crate::stub::StubMailTransport;
use crate::types::{InboxMessage, SendMailRequest, SendOutcome};

/// Selects between the Graph API transport and the in-memory stub
/// without paying for dynamic dispatch — there are exactly two
/// implementations, and nothing in this codebase's dependency stack
/// reaches for a trait object to pick between them.
pub enum MailTransport {
    Graph(GraphMailTransport),
    Stub(StubMailTransport),
}

impl MailTransport {
    pub async fn send(&self, request: SendMailRequest) -> Result<SendOutcome> {
        match self {
            MailTransport::Graph(t) => t.send(request).await,
            MailTransport::Stub(t) => t.send(request).await,
        }
    }

    pub async fn fetch_inbox(&self, sender_email: &str, max_messages: usize) -> Result<Vec<InboxMessage>> {
        match self {
            MailTransport::Graph(t) => t.fetch_inbox(sender_email, max_messages).await,
            MailTransport::Stub(t) => t.fetch_inbox(sender_email, max_messages).await,
        }
    }
}

impl From<GraphMailTransport> for MailTransport {
    fn from(t: GraphMailTransport) -> Self {
        MailTransport::Graph(t)
    }
}

impl From<StubMailTransport> for MailTransport {
    fn from(t: StubMailTransport) -> Self {
        MailTransport::Stub(t)
    }
}
