use once_cell::sync::Lazy;
use regex::Regex;

const BOUNCE_SUBJECTS: &[&str] = &[
    "delivery status notification",
    "mail delivery failed",
    "delivery failure",
    "undelivered mail returned to sender",
    "message delivery failure",
    "returned mail",
    "mail system error",
    "delivery error",
    "postmaster@",
    "mailer-daemon@",
    "delivery report",
    "non-delivery report",
    "ndr",
    "bounce",
    "failure notice",
];

const BOUNCE_SENDERS: &[&str] = &[
    "postmaster@",
    "mailer-daemon@",
    "noreply@",
    "no-reply@",
    "bounce@",
    "bounces@",
    "delivery@",
];

const BOUNCE_BODY_INDICATORS: &[&str] = &[
    "message could not be delivered",
    "delivery has failed",
    "recipient address rejected",
    "mailbox unavailable",
    "address not found",
    "user unknown",
    "mailbox full",
    "quota exceeded",
    "message rejected",
    "recipient not found",
    "smtp error",
    "550",
    "554",
    "permanent failure",
    "bounce message",
    "delivery failure",
];

/// Detects whether an inbox message is a delivery-failure bounce
/// rather than a genuine reply, by subject/sender/body indicator
/// sets, checked in that order.
pub fn is_bounce_email(subject: &str, body: &str, sender_email: &str) -> bool {
    let subject_lower = subject.to_lowercase();
    let sender_lower = sender_email.to_lowercase();
    let body_lower = body.to_lowercase();

    if BOUNCE_SUBJECTS.iter().any(|ind| subject_lower.contains(ind)) {
        return true;
    }
    if BOUNCE_SENDERS.iter().any(|ind| sender_lower.contains(ind)) {
        return true;
    }
    BOUNCE_BODY_INDICATORS.iter().any(|ind| body_lower.contains(ind))
}

static PATTERN_LABELLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:original recipient|recipient address|failed recipient)[:\s]+([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})")
        .expect("valid regex")
});
static PATTERN_DELIVERY_TO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:delivery to the following recipient failed)[:\s]+([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})")
        .expect("valid regex")
});
static PATTERN_ANGLE_BRACKETS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})>").expect("valid regex")
});
static PATTERN_ANY_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b([a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,})\b").expect("valid regex")
});

/// Extracts the original recipient address from a bounce message body,
/// trying increasingly loose patterns in order and returning on the
/// first hit.
pub fn extract_bounced_email(body: &str) -> Option<String> {
    if body.is_empty() {
        return None;
    }

    for pattern in [&*PATTERN_LABELLED, &*PATTERN_DELIVERY_TO, &*PATTERN_ANGLE_BRACKETS, &*PATTERN_ANY_EMAIL] {
        if let Some(caps) = pattern.captures(body) {
            if let Some(m) = caps.get(1) {
                return Some(crate::normalize_email(m.as_str()));
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_bounce_subject() {
        assert!(is_bounce_email("Mail Delivery Failed", "", "sender@example.com"));
    }

    #[test]
    fn detects_bounce_sender() {
        assert!(is_bounce_email("Re: hello", "all good", "mailer-daemon@example.com"));
    }

    #[test]
    fn detects_bounce_body_indicator() {
        assert!(is_bounce_email("Re: hello", "550 mailbox unavailable", "someone@example.com"));
    }

    #[test]
    fn plain_reply_is_not_a_bounce() {
        assert!(!is_bounce_email("Re: hello", "Sounds good, thanks!", "jane@example.com"));
    }

    #[test]
    fn extracts_labelled_recipient() {
        let body = "Original Recipient: Jane.Doe@Example.com failed permanently";
        assert_eq!(extract_bounced_email(body), Some("jane.doe@example.com".to_string()));
    }

    #[test]
    fn extracts_angle_bracket_fallback() {
        let body = "Delivery failed for <jane@example.com> after 3 attempts";
        assert_eq!(extract_bounced_email(body), Some("jane@example.com".to_string()));
    }

    #[test]
    fn returns_none_when_no_email_present() {
        assert_eq!(extract_bounced_email("no addresses here"), None);
    }
}
