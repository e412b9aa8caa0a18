use chrono::{DateTime, Utc};

use orchestrator_models::Contact;

/// Appends a quoted block of the prior conversation to a new outgoing
/// body: the contact's last reply if we have one, otherwise our own
/// last sent message. Never both — whichever is more recent history
/// wins, mirroring the reference implementation's reply-over-sent
/// preference.
pub fn build_outgoing_body(contact: &Contact, new_body: &str, sender_email: &str) -> String {
    let quoted_block = if let (Some(reply_body), Some(reply_at)) =
        (&contact.last_reply_body, contact.last_reply_at)
    {
        Some(quote_block(&format_quote_time(reply_at), &format!("{} <{}>", contact.name, contact.email), reply_body))
    } else if let (Some(sent_body), Some(sent_at)) = (&contact.last_sent_body, contact.last_sent_at) {
        Some(quote_block(&format_quote_time(sent_at), sender_email, sent_body))
    } else {
        None
    };

    match quoted_block {
        Some(block) => format!("{new_body}\n{block}"),
        None => new_body.to_string(),
    }
}

fn quote_block(formatted_time: &str, attributed_to: &str, body: &str) -> String {
    let header = format!("\nOn {formatted_time} {attributed_to} wrote:\n");
    let quoted_text: String = body.lines().collect::<Vec<_>>().join("\n");
    format!("{header}{quoted_text}")
}

fn format_quote_time(at: DateTime<Utc>) -> String {
    at.format("%a, %b %-d, %Y at %-I:%M %p").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_models::Stage;

    fn base_contact() -> Contact {
        Contact {
            id: 1,
            event_id: 1,
            name: "Jane Doe".into(),
            prefix: None,
            email: "jane@example.com".into(),
            cc_store: None,
            stage: Stage::Forms.as_str().to_string(),
            status: "pending".into(),
            last_message_type: None,
            last_triggered_at: None,
            last_sent_body: None,
            last_sent_at: None,
            last_reply_body: None,
            last_reply_at: None,
            campaign_paused: false,
            email_bounced: false,
            flow_type: None,
            attachment: None,
            attachment_filename: None,
            attachment_mimetype: None,
            forms_link: None,
            payment_link: None,
            invoice_number: None,
            assigned_to: None,
            email_error: None,
            last_error_at: None,
            trigger: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn no_history_returns_body_unchanged() {
        let contact = base_contact();
        assert_eq!(build_outgoing_body(&contact, "Hello", "sender@example.com"), "Hello");
    }

    #[test]
    fn quotes_last_reply_over_last_sent() {
        let mut contact = base_contact();
        contact.last_reply_body = Some("Sounds good".into());
        contact.last_reply_at = Some(Utc::now());
        contact.last_sent_body = Some("Original message".into());
        contact.last_sent_at = Some(Utc::now());

        let body = build_outgoing_body(&contact, "Following up", "sender@example.com");
        assert!(body.starts_with("Following up"));
        assert!(body.contains("Sounds good"));
        assert!(!body.contains("Original message"));
    }

    #[test]
    fn falls_back_to_last_sent_when_no_reply() {
        let mut contact = base_contact();
        contact.last_sent_body = Some("Original message".into());
        contact.last_sent_at = Some(Utc::now());

        let body = build_outgoing_body(&contact, "Following up", "sender@example.com");
        assert!(body.contains("Original message"));
        assert!(body.contains("sender@example.com"));
    }
}
