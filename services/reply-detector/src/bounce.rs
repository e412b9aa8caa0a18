//! Bounce handling (spec §4.5 step 2): checked before reply
//! correlation, since a bounce notification is never itself a reply
//! from the contact.

use anyhow::Result;
use tracing::info;

use orchestrator_database::{BouncedEmailRepository, ContactRepository, QueueRepository};
use orchestrator_mailer::InboxMessage;
use orchestrator_models::classify_bounce;
use orchestrator_util::{extract_bounced_email, is_bounce_email};

/// If `message` looks like a bounce, records it and pauses/fails the
/// affected contact's pending sends. Returns `true` if it was handled
/// as a bounce, so the caller skips reply correlation for it.
pub async fn handle_if_bounce(
    bounced: &BouncedEmailRepository,
    contacts: &ContactRepository,
    queue: &QueueRepository,
    message: &InboxMessage,
) -> Result<bool> {
    if !is_bounce_email(&message.subject, &message.body, &message.from_address) {
        return Ok(false);
    }

    let Some(bounced_address) = extract_bounced_email(&message.body) else {
        info!(subject = %message.subject, "message looked like a bounce but no address could be extracted");
        return Ok(true);
    };

    let (bounce_type, bounce_reason) = classify_bounce(&message.body);
    bounced.upsert_bounce(&bounced_address, bounce_type.as_str(), bounce_reason).await?;

    let trigger_line = format!("{} - bounce detected: {}", message.received_at, message.subject);
    let affected = contacts.mark_bounced_by_email(&bounced_address, &trigger_line).await?;
    let failed = queue.fail_pending_for_bounced_address(&bounced_address, "recipient address bounced").await?;

    info!(
        address = %bounced_address,
        contacts_marked = affected,
        queue_rows_failed = failed,
        "handled bounce notification"
    );

    Ok(true)
}
