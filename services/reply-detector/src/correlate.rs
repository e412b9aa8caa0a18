//! Inbound-message-to-contact correlation cascade (spec §4.5).
//!
//! Tries increasingly loose signals in order and returns on the first
//! hit: a direct In-Reply-To map lookup, a shared conversation id, a
//! normalized-subject-plus-recipient heuristic, then a bare
//! sender-address fallback across the prefetched contact set.

use once_cell::sync::Lazy;
use regex::Regex;

use orchestrator_database::{MessageContactMapRepository, MessageRepository};
use orchestrator_mailer::InboxMessage;
use orchestrator_models::Contact;
use sqlx::PgPool;

static REPLY_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(re|fwd?|fw)\s*:\s*").expect("valid regex"));

fn normalize_subject(subject: &str) -> String {
    let mut s = subject.trim().to_string();
    loop {
        let next = REPLY_PREFIX.replace(&s, "").into_owned();
        if next.len() == s.len() {
            break;
        }
        s = next;
    }
    s.trim().to_lowercase()
}

/// Resolves `message` to the contact it is a reply from, or `None` if
/// no tier matches.
pub async fn correlate_contact(
    pool: &PgPool,
    messages: &MessageRepository,
    known_contacts: &[Contact],
    message: &InboxMessage,
) -> anyhow::Result<Option<i64>> {
    if let Some(in_reply_to) = &message.in_reply_to {
        if let Some(contact_id) = MessageContactMapRepository::find_contact_id(pool, in_reply_to).await? {
            return Ok(Some(contact_id));
        }
    }

    if let Some(conversation_id) = &message.conversation_id {
        if let Some(sent) = messages.latest_sent_by_conversation_id(conversation_id).await? {
            if let Some(contact_id) =
                MessageContactMapRepository::find_contact_id(pool, &sent.message_id).await?
            {
                return Ok(Some(contact_id));
            }
            if let Some(contact_id) = sent.contact_id {
                return Ok(Some(contact_id));
            }
        }
    }

    let normalized_incoming_subject = normalize_subject(&message.subject);
    if let Some(sent) = messages.latest_sent_by_recipient(&message.from_address).await? {
        let normalized_sent_subject = normalize_subject(sent.subject.as_deref().unwrap_or(""));
        if !normalized_sent_subject.is_empty() && normalized_incoming_subject.contains(&normalized_sent_subject) {
            if let Some(contact_id) = MessageContactMapRepository::find_contact_id(pool, &sent.message_id).await? {
                return Ok(Some(contact_id));
            }
            if let Some(contact_id) = sent.contact_id {
                return Ok(Some(contact_id));
            }
        }
    }

    let from_lower = message.from_address.to_lowercase();
    for contact in known_contacts {
        if contact.known_addresses().iter().any(|addr| addr.to_lowercase() == from_lower) {
            return Ok(Some(contact.id));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_single_re_prefix() {
        assert_eq!(normalize_subject("Re: Your invoice"), "your invoice");
    }

    #[test]
    fn strips_repeated_prefixes() {
        assert_eq!(normalize_subject("Fwd: Re: Re: Your invoice"), "your invoice");
    }

    #[test]
    fn leaves_plain_subject_untouched() {
        assert_eq!(normalize_subject("Your invoice"), "your invoice");
    }
}
