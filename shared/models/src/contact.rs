use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::enums::{Stage, Status};

/// A campaign recipient. Owns the cadence/state fields the decision
/// engine, send worker, and reply detector all read and partially
/// write (see ownership split in spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub prefix: Option<String>,
    /// Primary address plus optional embedded extras, comma-separated.
    pub email: String,
    /// Persistent CC list. Storage-only: never used to compose an
    /// outgoing message and never mapped for reply correlation.
    pub cc_store: Option<String>,
    pub stage: String,
    pub status: String,
    pub last_message_type: Option<String>,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_sent_body: Option<String>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub last_reply_body: Option<String>,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub campaign_paused: bool,
    pub email_bounced: bool,
    pub flow_type: Option<String>,
    pub attachment: Option<Vec<u8>>,
    pub attachment_filename: Option<String>,
    pub attachment_mimetype: Option<String>,
    pub forms_link: Option<String>,
    pub payment_link: Option<String>,
    pub invoice_number: Option<String>,
    pub assigned_to: Option<String>,
    pub email_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
    pub trigger: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Contact {
    pub fn stage(&self) -> Stage {
        Stage::from_str(&self.stage)
    }

    pub fn status(&self) -> Status {
        Status::from_str(&self.status)
    }

    pub fn is_eligible_for_auto_send(&self) -> bool {
        if self.campaign_paused || self.email_bounced {
            return false;
        }
        let stage = self.stage();
        let status = self.status();
        !stage.is_terminal() && !status.is_terminal()
    }

    /// Primary address: the first comma-separated token in `email`.
    pub fn primary_email(&self) -> &str {
        self.email.split(',').next().unwrap_or(&self.email).trim()
    }

    /// Embedded extra addresses beyond the primary, from the `email`
    /// field (legacy CC mechanism, distinct from `cc_store`).
    pub fn embedded_extra_emails(&self) -> Vec<String> {
        self.email
            .split(',')
            .skip(1)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn is_payments_class_stage(&self) -> bool {
        let s = self.stage.to_lowercase();
        s.contains("payment") || s.contains("sepa")
    }

    /// All addresses the contact is known to be reachable at: primary
    /// plus embedded extras. Used by the reply detector's verification
    /// step, never for sending.
    pub fn known_addresses(&self) -> Vec<String> {
        let mut addrs = vec![self.primary_email().to_string()];
        addrs.extend(self.embedded_extra_emails());
        addrs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_contact(email: String, paused: bool, bounced: bool) -> Contact {
        Contact {
            id: 1,
            event_id: 1,
            name: "Jane Doe".into(),
            prefix: None,
            email,
            cc_store: None,
            stage: "forms".into(),
            status: "pending".into(),
            last_message_type: None,
            last_triggered_at: None,
            last_sent_body: None,
            last_sent_at: None,
            last_reply_body: None,
            last_reply_at: None,
            campaign_paused: paused,
            email_bounced: bounced,
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
    fn primary_email_is_first_token() {
        let c = sample_contact("alice@example.com, bob@example.com".into(), false, false);
        assert_eq!(c.primary_email(), "alice@example.com");
        assert_eq!(c.embedded_extra_emails(), vec!["bob@example.com".to_string()]);
    }

    #[test]
    fn bounced_or_paused_contact_is_not_eligible() {
        assert!(!sample_contact("a@x.com".into(), true, false).is_eligible_for_auto_send());
        assert!(!sample_contact("a@x.com".into(), false, true).is_eligible_for_auto_send());
        assert!(sample_contact("a@x.com".into(), false, false).is_eligible_for_auto_send());
    }

    proptest! {
        #[test]
        fn primary_email_never_contains_comma(local in "[a-z]{3,10}", domain in "[a-z]{3,10}\\.[a-z]{2,3}") {
            let email = format!("{local}@{domain}");
            let c = sample_contact(email.clone(), false, false);
            prop_assert_eq!(c.primary_email(), email);
            prop_assert!(!c.primary_email().contains(','));
        }
    }
}
