//! Per-tick inbox sweep (spec §4.5): fetches each configured mailbox's
//! inbox, screens for bounces, and correlates everything else against
//! the active contact set before marking matches replied.

use anyhow::Result;
use tracing::{debug, info, warn};

use orchestrator_database::{BouncedEmailRepository, ContactRepository, EventRepository, MessageRepository, QueueRepository};
use orchestrator_mailer::{InboxMessage, MailTransport};
use orchestrator_models::Contact;
use sqlx::PgPool;

use crate::bounce::handle_if_bounce;
use crate::correlate::correlate_contact;

pub struct ReplyDetector {
    pub pool: PgPool,
    pub contacts: ContactRepository,
    pub events: EventRepository,
    pub messages: MessageRepository,
    pub queue: QueueRepository,
    pub bounced: BouncedEmailRepository,
    pub transport: MailTransport,
    pub inbox_page_size: usize,
}

impl ReplyDetector {
    pub async fn run_tick(&self) -> Result<()> {
        let mailboxes = self.events.distinct_sender_emails().await?;
        if mailboxes.is_empty() {
            return Ok(());
        }

        let active_contacts = self.contacts.find_active_for_reply_detection().await?;
        if active_contacts.is_empty() {
            debug!("no active contacts to correlate replies against");
            return Ok(());
        }

        for mailbox in &mailboxes {
            if let Err(err) = self.sweep_mailbox(mailbox, &active_contacts).await {
                warn!(mailbox = %mailbox, error = %err, "failed to sweep mailbox for replies");
            }
        }
        Ok(())
    }

    async fn sweep_mailbox(&self, mailbox: &str, active_contacts: &[Contact]) -> Result<()> {
        let inbox = self.transport.fetch_inbox(mailbox, self.inbox_page_size).await?;
        if inbox.is_empty() {
            return Ok(());
        }
        info!(mailbox = %mailbox, count = inbox.len(), "fetched inbox messages");
        orchestrator_util::record_rows_processed("reply-detector", inbox.len() as i64);

        for message in &inbox {
            // A single message's failure (a transient DB error, most
            // commonly) is abandoned for this tick rather than aborting
            // the rest of the mailbox's messages; the next tick picks it
            // up again since it was never recorded as seen.
            if let Err(err) = self.process_message(mailbox, message, active_contacts).await {
                warn!(mailbox = %mailbox, message_id = %message.message_id, error = %err, "failed to process inbound message, will retry next tick");
            }
        }
        Ok(())
    }

    async fn process_message(&self, mailbox: &str, message: &InboxMessage, active_contacts: &[Contact]) -> Result<()> {
        if self.messages.exists(&message.message_id).await? {
            return Ok(());
        }

        if handle_if_bounce(&self.bounced, &self.contacts, &self.queue, message).await? {
            return Ok(());
        }

        let contact_id = correlate_contact(&self.pool, &self.messages, active_contacts, message).await?;

        let trigger_line = format!("{} - reply received: {}", message.received_at, message.subject);
        if let Some(contact_id) = contact_id {
            let cleaned_body = orchestrator_util::clean_email_body(&message.body);
            self.contacts.mark_replied(contact_id, &trigger_line, &cleaned_body, message.received_at).await?;
            self.messages
                .insert(
                    &message.message_id,
                    message.conversation_id.as_deref(),
                    "received",
                    Some(contact_id),
                    &message.from_address,
                    Some(mailbox),
                    Some(&message.subject),
                    Some(&message.body),
                    message.in_reply_to.as_deref(),
                    message.received_at,
                )
                .await?;
            info!(contact_id, message_id = %message.message_id, "correlated reply to contact");
        } else {
            self.messages
                .insert(
                    &message.message_id,
                    message.conversation_id.as_deref(),
                    "received",
                    None,
                    &message.from_address,
                    Some(mailbox),
                    Some(&message.subject),
                    Some(&message.body),
                    message.in_reply_to.as_deref(),
                    message.received_at,
                )
                .await?;
            debug!(message_id = %message.message_id, from = %message.from_address, "no contact correlated for inbound message");
        }
        Ok(())
    }
}
