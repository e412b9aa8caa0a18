pub mod graph;
pub mod oauth;
pub mod stub;
pub mod transport;
pub mod types;

pub use graph::GraphMailTransport;
pub use oauth::{SenderCredentials, TokenCache};
pub use stub::StubMailTransport;
pub use transport::MailTransport;
pub use types::{Attachment, InboxMessage, SendMailRequest, SendOutcome};
