//! Pure cadence decision table (spec §4.4 `determineNextAction`).

use chrono::Duration;

use orchestrator_models::{MessageType, NormalizedStage, Status};

/// Picks the next message to send for a contact, or `None` if nothing
/// is due yet. Pure: every input the table depends on is passed in
/// explicitly so this can be tested without a database.
pub fn determine_next_action(
    normalized_stage: NormalizedStage,
    status: &Status,
    last_message_type: Option<&MessageType>,
    time_since_last: Option<Duration>,
    error_since: Option<Duration>,
) -> Option<MessageType> {
    if status.is_replied() {
        return None;
    }

    // An outstanding send error retries the same message_type once an
    // hour has passed, ahead of the normal cadence gates.
    if let Some(since) = error_since {
        return if since >= Duration::hours(1) { last_message_type.cloned() } else { None };
    }

    let gated = |gate_days: i64, next: MessageType| match time_since_last {
        Some(elapsed) if elapsed >= Duration::days(gate_days) => Some(next),
        _ => None,
    };

    match normalized_stage {
        NormalizedStage::Generic => match last_message_type {
            None => Some(MessageType::CampaignMain),
            Some(MessageType::CampaignMain) => gated(3, MessageType::Reminder1),
            Some(MessageType::Reminder1) => gated(4, MessageType::Reminder2),
            _ => None,
        },
        NormalizedStage::Forms => match last_message_type {
            None => Some(MessageType::FormsInitial),
            Some(MessageType::FormsInitial) => gated(2, MessageType::FormsReminder(1)),
            Some(MessageType::FormsReminder(1)) => gated(2, MessageType::FormsReminder(2)),
            Some(MessageType::FormsReminder(2)) => gated(3, MessageType::FormsReminder(3)),
            _ => None,
        },
        NormalizedStage::Payments => match last_message_type {
            None => Some(MessageType::PaymentsInitial),
            Some(MessageType::PaymentsInitial) => gated(2, MessageType::PaymentsReminder(1)),
            Some(MessageType::PaymentsReminder(1)) => gated(2, MessageType::PaymentsReminder(2)),
            Some(MessageType::PaymentsReminder(2)) => gated(3, MessageType::PaymentsReminder(3)),
            Some(MessageType::PaymentsReminder(3)) => gated(7, MessageType::PaymentsReminder(4)),
            Some(MessageType::PaymentsReminder(4)) => gated(7, MessageType::PaymentsReminder(5)),
            Some(MessageType::PaymentsReminder(5)) => gated(7, MessageType::PaymentsReminder(6)),
            _ => None,
        },
        // SEPA and RH run their own 2/2/2-day chain, then fall into the
        // shared payments_reminder4..6 tail at 7 days each (spec §4.4).
        NormalizedStage::Sepa => match last_message_type {
            None => Some(MessageType::SepaInitial),
            Some(MessageType::SepaInitial) => gated(2, MessageType::SepaReminder(1)),
            Some(MessageType::SepaReminder(1)) => gated(2, MessageType::SepaReminder(2)),
            Some(MessageType::SepaReminder(2)) => gated(2, MessageType::SepaReminder(3)),
            Some(MessageType::SepaReminder(3)) => gated(7, MessageType::PaymentsReminder(4)),
            Some(MessageType::PaymentsReminder(4)) => gated(7, MessageType::PaymentsReminder(5)),
            Some(MessageType::PaymentsReminder(5)) => gated(7, MessageType::PaymentsReminder(6)),
            _ => None,
        },
        NormalizedStage::Rh => match last_message_type {
            None => Some(MessageType::RhInitial),
            Some(MessageType::RhInitial) => gated(2, MessageType::RhReminder(1)),
            Some(MessageType::RhReminder(1)) => gated(2, MessageType::RhReminder(2)),
            Some(MessageType::RhReminder(2)) => gated(2, MessageType::RhReminder(3)),
            Some(MessageType::RhReminder(3)) => gated(7, MessageType::PaymentsReminder(4)),
            Some(MessageType::PaymentsReminder(4)) => gated(7, MessageType::PaymentsReminder(5)),
            Some(MessageType::PaymentsReminder(5)) => gated(7, MessageType::PaymentsReminder(6)),
            _ => None,
        },
    }
}

/// The gate, in whole days, that had to elapse before `message_type`
/// became due — used by the caller to compute `due_at` for the
/// enqueued row. Kept local to this service rather than shared with
/// the send worker's re-verification gate (`queue-worker::cadence`),
/// since the two read the table for different purposes and the table
/// itself is small enough that duplication costs less than a
/// cross-service dependency.
pub fn gate_days_for(message_type: &MessageType) -> Option<i64> {
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
    fn replied_contact_never_gets_an_action() {
        let action = determine_next_action(
            NormalizedStage::Generic,
            &Status::Replied,
            Some(&MessageType::CampaignMain),
            Some(Duration::days(30)),
            None,
        );
        assert_eq!(action, None);
    }

    #[test]
    fn no_prior_message_starts_the_generic_chain() {
        let action = determine_next_action(NormalizedStage::Generic, &Status::Pending, None, None, None);
        assert_eq!(action, Some(MessageType::CampaignMain));
    }

    #[test]
    fn reminder1_waits_for_the_three_day_gate() {
        let too_soon = determine_next_action(
            NormalizedStage::Generic,
            &Status::Pending,
            Some(&MessageType::CampaignMain),
            Some(Duration::days(2)),
            None,
        );
        assert_eq!(too_soon, None);

        let due = determine_next_action(
            NormalizedStage::Generic,
            &Status::Pending,
            Some(&MessageType::CampaignMain),
            Some(Duration::days(3)),
            None,
        );
        assert_eq!(due, Some(MessageType::Reminder1));
    }

    #[test]
    fn sepa_chain_falls_back_to_shared_payments_tail() {
        let action = determine_next_action(
            NormalizedStage::Sepa,
            &Status::Pending,
            Some(&MessageType::SepaReminder(3)),
            Some(Duration::days(7)),
            None,
        );
        assert_eq!(action, Some(MessageType::PaymentsReminder(4)));
    }

    #[test]
    fn error_retries_same_type_after_one_hour() {
        let too_soon = determine_next_action(
            NormalizedStage::Forms,
            &Status::Pending,
            Some(&MessageType::FormsReminder(1)),
            None,
            Some(Duration::minutes(30)),
        );
        assert_eq!(too_soon, None);

        let due = determine_next_action(
            NormalizedStage::Forms,
            &Status::Pending,
            Some(&MessageType::FormsReminder(1)),
            None,
            Some(Duration::hours(2)),
        );
        assert_eq!(due, Some(MessageType::FormsReminder(1)));
    }
}
