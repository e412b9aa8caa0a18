//! Per message_type cadence gate (spec §4.3 step 5): how many days must
//! separate a reminder from the send it follows, and which message_type
//! that prior send is.

use orchestrator_models::MessageType;

/// The message_type whose `sent_at` anchors this one's cadence window,
/// or `None` for initial messages and custom-flow steps (no gate).
pub fn predecessor_message_type(message_type: &MessageType) -> Option<String> {
    match message_type {
        MessageType::Reminder1 => Some(MessageType::CampaignMain.as_str()),
        MessageType::Reminder2 => Some(MessageType::Reminder1.as_str()),
        MessageType::FormsReminder(1) => Some(MessageType::FormsInitial.as_str()),
        MessageType::FormsReminder(n) => Some(MessageType::FormsReminder(n - 1).as_str()),
        MessageType::PaymentsReminder(1) => Some(MessageType::PaymentsInitial.as_str()),
        MessageType::PaymentsReminder(n) => Some(MessageType::PaymentsReminder(n - 1).as_str()),
        MessageType::SepaReminder(1) => Some(MessageType::SepaInitial.as_str()),
        MessageType::SepaReminder(n) => Some(MessageType::SepaReminder(n - 1).as_str()),
        MessageType::RhReminder(1) => Some(MessageType::RhInitial.as_str()),
        MessageType::RhReminder(n) => Some(MessageType::RhReminder(n - 1).as_str()),
        _ => None,
    }
}

/// Minimum whole days that must separate `message_type` from its
/// predecessor's `sent_at` (spec §4.3 step 5 table). `None` means no
/// gate applies here.
pub fn cadence_gate_days(message_type: &MessageType) -> Option<i64> {
    match message_type {
        MessageType::Reminder1 => Some(3),
        MessageType::Reminder2 => Some(4),
        MessageType::FormsReminder(1) => Some(2),
        MessageType::FormsReminder(2) => Some(2),
        MessageType::FormsReminder(3) => Some(3),
        MessageType::PaymentsReminder(1) => Some(2),
        MessageType::PaymentsReminder(2) => Some(2),
        MessageType::PaymentsReminder(3) => Some(3),
        MessageType::PaymentsReminder(4..=6) => Some(7),
        MessageType::SepaReminder(1..=3) => Some(2),
        MessageType::RhReminder(1..=3) => Some(2),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reminder_chain_predecessors() {
        assert_eq!(predecessor_message_type(&MessageType::Reminder1).as_deref(), Some("campaign_main"));
        assert_eq!(predecessor_message_type(&MessageType::Reminder2).as_deref(), Some("reminder1"));
        assert_eq!(
            predecessor_message_type(&MessageType::FormsReminder(2)).as_deref(),
            Some("forms_reminder1")
        );
        assert_eq!(
            predecessor_message_type(&MessageType::PaymentsReminder(4)).as_deref(),
            Some("payments_reminder3")
        );
    }

    #[test]
    fn initial_and_custom_have_no_gate() {
        assert_eq!(predecessor_message_type(&MessageType::FormsInitial), None);
        assert_eq!(cadence_gate_days(&MessageType::FormsInitial), None);
        assert_eq!(cadence_gate_days(&MessageType::CustomStep(2)), None);
    }

    #[test]
    fn payments_reminder_gate_days_match_spec_table() {
        assert_eq!(cadence_gate_days(&MessageType::PaymentsReminder(1)), Some(2));
        assert_eq!(cadence_gate_days(&MessageType::PaymentsReminder(3)), Some(3));
        assert_eq!(cadence_gate_days(&MessageType::PaymentsReminder(6)), Some(7));
    }
}
