use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Cooldown bookkeeping, keyed by either `sender_email` or
/// `domain:<host>`. The domain-level row dominates the per-email row
/// when both exist (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SenderStats {
    pub key: String,
    pub last_sent: Option<DateTime<Utc>>,
    pub cooldown_seconds: i32,
}

impl SenderStats {
    pub const MIN_COOLDOWN_SECONDS: i32 = 30;
    pub const MAX_COOLDOWN_SECONDS: i32 = 300;
    pub const DEFAULT_COOLDOWN_SECONDS: i32 = 90;
    pub const POST_SEND_RANDOM_MIN_SECONDS: i32 = 60;
    pub const POST_SEND_RANDOM_MAX_SECONDS: i32 = 180;

    pub fn domain_key(sender_email: &str) -> String {
        let host = sender_email.split('@').nth(1).unwrap_or(sender_email);
        format!("domain:{host}")
    }

    /// Cooldown clamped to [30, 300], defaulting to 90 if unset/invalid.
    pub fn clamped_cooldown(&self) -> i32 {
        self.cooldown_seconds.clamp(
            Self::MIN_COOLDOWN_SECONDS,
            Self::MAX_COOLDOWN_SECONDS,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_key_extracts_host() {
        assert_eq!(SenderStats::domain_key("alice@example.com"), "domain:example.com");
    }

    #[test]
    fn cooldown_clamps_to_bounds() {
        let mut s = SenderStats { key: "x".into(), last_sent: None, cooldown_seconds: 5 };
        assert_eq!(s.clamped_cooldown(), SenderStats::MIN_COOLDOWN_SECONDS);
        s.cooldown_seconds = 9000;
        assert_eq!(s.clamped_cooldown(), SenderStats::MAX_COOLDOWN_SECONDS);
        s.cooldown_seconds = 100;
        assert_eq!(s.clamped_cooldown(), 100);
    }
}
