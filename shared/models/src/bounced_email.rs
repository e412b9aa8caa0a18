use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::enums::BounceType;

/// A lowercased address that has produced at least one bounce NDR.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BouncedEmail {
    pub email: String,
    pub first_bounced_at: DateTime<Utc>,
    pub last_bounced_at: DateTime<Utc>,
    pub bounce_count: i32,
    pub bounce_type: String,
    pub bounce_reason: String,
}

impl BouncedEmail {
    pub fn bounce_type(&self) -> Option<BounceType> {
        match self.bounce_type.as_str() {
            "hard" => Some(BounceType::Hard),
            "soft" => Some(BounceType::Soft),
            _ => None,
        }
    }
}

/// Classification lifted from `handle_bounce_email` in the original
/// implementation: subject/sender checks happen upstream (see
/// `orchestrator_util::bounce`), this only classifies the NDR body.
pub fn classify_bounce(body: &str) -> (BounceType, &'static str) {
    let lower = body.to_lowercase();
    if lower.contains("mailbox full") || lower.contains("quota exceeded") {
        (BounceType::Soft, "Mailbox full")
    } else if lower.contains("temporary failure") {
        (BounceType::Soft, "Temporary delivery failure")
    } else if lower.contains("user unknown") || lower.contains("address not found") {
        (BounceType::Hard, "Invalid email address")
    } else if lower.contains("mailbox unavailable") {
        (BounceType::Hard, "Mailbox unavailable")
    } else {
        (BounceType::Hard, "Email delivery failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_soft_bounces() {
        assert_eq!(classify_bounce("Mailbox full, quota exceeded").0, BounceType::Soft);
        assert_eq!(classify_bounce("a Temporary failure occurred").0, BounceType::Soft);
    }

    #[test]
    fn classifies_hard_bounces() {
        assert_eq!(classify_bounce("550 user unknown").0, BounceType::Hard);
        assert_eq!(classify_bounce("recipient address not found").0, BounceType::Hard);
        assert_eq!(classify_bounce("mailbox unavailable").0, BounceType::Hard);
    }

    #[test]
    fn defaults_to_hard_with_generic_reason() {
        let (t, reason) = classify_bounce("something went wrong");
        assert_eq!(t, BounceType::Hard);
        assert_eq!(reason, "Email delivery failed");
    }
}
