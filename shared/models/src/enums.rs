//! Typed stand-ins for the string-typed tokens the store persists:
//! stage, status, and message_type. Each carries an `Other` variant so
//! legacy or operator-typed values round-trip without data loss.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The macro-phase a contact is in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Initial,
    Forms,
    Payments,
    Sepa,
    Rh,
    Custom,
    Completed,
    Cancelled,
    Other(String),
}

impl Stage {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "initial" | "" => Stage::Initial,
            "forms" => Stage::Forms,
            "payments" | "payment" => Stage::Payments,
            "sepa" => Stage::Sepa,
            "rh" => Stage::Rh,
            "custom" => Stage::Custom,
            "completed" => Stage::Completed,
            "cancelled" | "canceled" => Stage::Cancelled,
            other => Stage::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Stage::Initial => "initial",
            Stage::Forms => "forms",
            Stage::Payments => "payments",
            Stage::Sepa => "sepa",
            Stage::Rh => "rh",
            Stage::Custom => "custom",
            Stage::Completed => "completed",
            Stage::Cancelled => "cancelled",
            Stage::Other(s) => s.as_str(),
        }
    }

    /// The fixed set of stages the bounce handler treats as terminal or
    /// otherwise intentional, and therefore never overwrites with
    /// `mail delivery`.
    pub fn is_terminal_or_intentional(&self) -> bool {
        matches!(
            self.as_str(),
            "completed" | "invoice & confirmation" | "payment due" | "wrong person"
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Completed | Stage::Cancelled)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::Initial
    }
}

/// A stage-qualified marker of the contact's most recent successful
/// send, or an operator/reply-set terminal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Replied,
    Ooo,
    Completed,
    Cancelled,
    CustomComplete,
    /// A concrete `..._sent` marker, e.g. `forms_reminder2_sent`,
    /// `first_message_sent`, `step-3_sent`.
    SentMarker(String),
    Other(String),
}

impl Status {
    pub fn from_str(s: &str) -> Self {
        match s.trim() {
            "" | "pending" => Status::Pending,
            "Replied" => Status::Replied,
            "ooo" => Status::Ooo,
            "completed" => Status::Completed,
            "cancelled" | "canceled" => Status::Cancelled,
            "custom-complete" => Status::CustomComplete,
            s if s.ends_with("_sent") => Status::SentMarker(s.to_string()),
            s => Status::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Status::Pending => "pending",
            Status::Replied => "Replied",
            Status::Ooo => "ooo",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
            Status::CustomComplete => "custom-complete",
            Status::SentMarker(s) => s.as_str(),
            Status::Other(s) => s.as_str(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Cancelled | Status::Replied)
    }

    pub fn is_replied(&self) -> bool {
        matches!(self, Status::Replied)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Pending
    }
}

/// The canonical message_type alphabet (spec §6). Legacy aliases are
/// accepted on read but never written (`forms_main` -> `forms_initial`,
/// `payment_main` -> `payments_initial`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    CampaignMain,
    Reminder1,
    Reminder2,
    FormsInitial,
    FormsReminder(u8),
    PaymentsInitial,
    PaymentsReminder(u8),
    SepaInitial,
    SepaReminder(u8),
    RhInitial,
    RhReminder(u8),
    CustomStep(u32),
    Error,
    Other(String),
}

impl MessageType {
    pub fn from_str(raw: &str) -> Self {
        match raw {
            "campaign_main" => MessageType::CampaignMain,
            "reminder1" => MessageType::Reminder1,
            "reminder2" => MessageType::Reminder2,
            "forms_initial" | "forms_main" => MessageType::FormsInitial,
            "payments_initial" | "payment_main" => MessageType::PaymentsInitial,
            "sepa_initial" => MessageType::SepaInitial,
            "rh_initial" => MessageType::RhInitial,
            "error" => MessageType::Error,
            other => {
                if let Some(n) = other.strip_prefix("forms_reminder") {
                    if let Ok(n) = n.parse() {
                        return MessageType::FormsReminder(n);
                    }
                }
                if let Some(n) = other.strip_prefix("payments_reminder") {
                    if let Ok(n) = n.parse() {
                        return MessageType::PaymentsReminder(n);
                    }
                }
                if let Some(n) = other.strip_prefix("sepa_reminder") {
                    if let Ok(n) = n.parse() {
                        return MessageType::SepaReminder(n);
                    }
                }
                if let Some(n) = other.strip_prefix("rh_reminder") {
                    if let Ok(n) = n.parse() {
                        return MessageType::RhReminder(n);
                    }
                }
                if let Some(n) = other.strip_prefix("custom-step-") {
                    if let Ok(n) = n.parse() {
                        return MessageType::CustomStep(n);
                    }
                }
                MessageType::Other(other.to_string())
            }
        }
    }

    /// Canonical, never-alias form used for every write path.
    pub fn as_str(&self) -> String {
        match self {
            MessageType::CampaignMain => "campaign_main".to_string(),
            MessageType::Reminder1 => "reminder1".to_string(),
            MessageType::Reminder2 => "reminder2".to_string(),
            MessageType::FormsInitial => "forms_initial".to_string(),
            MessageType::FormsReminder(n) => format!("forms_reminder{n}"),
            MessageType::PaymentsInitial => "payments_initial".to_string(),
            MessageType::PaymentsReminder(n) => format!("payments_reminder{n}"),
            MessageType::SepaInitial => "sepa_initial".to_string(),
            MessageType::SepaReminder(n) => format!("sepa_reminder{n}"),
            MessageType::RhInitial => "rh_initial".to_string(),
            MessageType::RhReminder(n) => format!("rh_reminder{n}"),
            MessageType::CustomStep(n) => format!("custom-step-{n}"),
            MessageType::Error => "error".to_string(),
            MessageType::Other(s) => s.clone(),
        }
    }

    /// The status token written on a successful send of this message
    /// type (spec §6, §4.3 step 10).
    pub fn sent_status_token(&self) -> String {
        match self {
            MessageType::CampaignMain => "first_message_sent".to_string(),
            MessageType::Reminder1 => "first_reminder".to_string(),
            MessageType::Reminder2 => "second_reminder".to_string(),
            MessageType::FormsInitial => "forms_initial_sent".to_string(),
            MessageType::FormsReminder(n) => format!("forms_reminder{n}_sent"),
            MessageType::PaymentsInitial => "payments_initial_sent".to_string(),
            MessageType::PaymentsReminder(n) => format!("payments_reminder{n}_sent"),
            MessageType::SepaInitial => "sepa_initial_sent".to_string(),
            MessageType::SepaReminder(n) => format!("sepa_reminder{n}_sent"),
            MessageType::RhInitial => "rh_initial_sent".to_string(),
            MessageType::RhReminder(n) => format!("rh_reminder{n}_sent"),
            MessageType::CustomStep(n) => format!("step-{n}_sent"),
            MessageType::Error => "error".to_string(),
            MessageType::Other(s) => format!("{s}_sent"),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stage bucket used only by the decision engine's default branch to
/// pick a cadence table (spec §4.4): the stage string is normalized by
/// substring match, not exact equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizedStage {
    Rh,
    Payments,
    Sepa,
    Forms,
    Generic,
}

impl NormalizedStage {
    pub fn from_stage_str(stage: &str) -> Self {
        let s = stage.to_lowercase();
        if s.contains("rh") {
            NormalizedStage::Rh
        } else if s.contains("payments") || s.contains("payment") {
            NormalizedStage::Payments
        } else if s.contains("sepa") {
            NormalizedStage::Sepa
        } else if s.contains("forms") {
            NormalizedStage::Forms
        } else {
            NormalizedStage::Generic
        }
    }
}

/// The status a queue row can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Sent,
    Failed,
    Skipped,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Sent => "sent",
            QueueStatus::Failed => "failed",
            QueueStatus::Skipped => "skipped",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueStatus::Pending),
            "sent" => Some(QueueStatus::Sent),
            "failed" => Some(QueueStatus::Failed),
            "skipped" => Some(QueueStatus::Skipped),
            _ => None,
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A step type within a `CustomFlow`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomStepType {
    Email,
    Task,
    Notification,
}

impl CustomStepType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomStepType::Email => "email",
            CustomStepType::Task => "task",
            CustomStepType::Notification => "notification",
        }
    }
}

impl fmt::Display for CustomStepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bounce's severity classification (spec §3 `BouncedEmail`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BounceType {
    Hard,
    Soft,
}

impl BounceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BounceType::Hard => "hard",
            BounceType::Soft => "soft",
        }
    }
}

impl fmt::Display for BounceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_type_roundtrips_canonical_tokens() {
        for raw in [
            "campaign_main",
            "reminder1",
            "reminder2",
            "forms_initial",
            "forms_reminder1",
            "payments_reminder6",
            "sepa_reminder3",
            "rh_reminder2",
            "custom-step-4",
            "error",
        ] {
            assert_eq!(MessageType::from_str(raw).as_str(), raw);
        }
    }

    #[test]
    fn message_type_normalizes_legacy_aliases() {
        assert_eq!(MessageType::from_str("forms_main").as_str(), "forms_initial");
        assert_eq!(
            MessageType::from_str("payment_main").as_str(),
            "payments_initial"
        );
    }

    #[test]
    fn sent_status_tokens_match_spec_examples() {
        assert_eq!(MessageType::CampaignMain.sent_status_token(), "first_message_sent");
        assert_eq!(MessageType::Reminder1.sent_status_token(), "first_reminder");
        assert_eq!(
            MessageType::FormsReminder(2).sent_status_token(),
            "forms_reminder2_sent"
        );
        assert_eq!(MessageType::CustomStep(3).sent_status_token(), "step-3_sent");
    }

    #[test]
    fn normalized_stage_matches_by_substring() {
        assert_eq!(NormalizedStage::from_stage_str("Payments"), NormalizedStage::Payments);
        assert_eq!(NormalizedStage::from_stage_str("payment"), NormalizedStage::Payments);
        assert_eq!(NormalizedStage::from_stage_str("RH"), NormalizedStage::Rh);
        assert_eq!(NormalizedStage::from_stage_str("custom"), NormalizedStage::Generic);
    }

    #[test]
    fn stage_terminal_or_intentional_exclusion_list() {
        assert!(Stage::from_str("wrong person").is_terminal_or_intentional());
        assert!(Stage::from_str("payment due").is_terminal_or_intentional());
        assert!(!Stage::from_str("mail delivery").is_terminal_or_intentional());
        assert!(!Stage::Forms.is_terminal_or_intentional());
    }
}
