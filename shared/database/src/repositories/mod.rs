pub mod bounced_emails;
pub mod contacts;
pub mod custom_flows;
pub mod events;
pub mod message_contact_map;
pub mod messages;
pub mod queue;
pub mod sender_stats;

pub use bounced_emails::BouncedEmailRepository;
pub use contacts::ContactRepository;
pub use custom_flows::CustomFlowRepository;
pub use events::EventRepository;
pub use message_contact_map::MessageContactMapRepository;
pub use messages::MessageRepository;
pub use queue::QueueRepository;
pub use sender_stats::SenderStatsRepository;
