//! `sendCampaignMessage` (spec §4.4): template resolution, duplicate
//! double-check, and queue-row insertion for one decided action.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Postgres, Transaction};

use orchestrator_database::{ContactRepository, EventRepository, QueueRepository};
use orchestrator_models::{Contact, MessageType};
use orchestrator_util::{next_allowed_uk_business_time, render_template_strict, TemplateStore};
use tracing::warn;

use crate::action::gate_days_for;
use crate::context::{build_context, snapshot_cc};

/// `(template_type, reminder_type, stage)` for [`TemplateStore::resolve`].
fn template_key_for(message_type: &MessageType) -> (&'static str, Option<String>, Option<&'static str>) {
    match message_type {
        MessageType::CampaignMain => ("campaign", None, Some("initial")),
        MessageType::Reminder1 => ("reminder", Some("reminder1".to_string()), None),
        MessageType::Reminder2 => ("reminder", Some("reminder2".to_string()), None),
        MessageType::FormsInitial => ("forms", None, Some("initial")),
        MessageType::FormsReminder(n) => ("forms", Some(format!("reminder{n}")), None),
        MessageType::PaymentsInitial => ("payments", None, Some("initial")),
        MessageType::PaymentsReminder(n) => ("payments", Some(format!("reminder{n}")), None),
        MessageType::SepaInitial => ("sepa", None, Some("initial")),
        MessageType::SepaReminder(n) => ("sepa", Some(format!("reminder{n}")), None),
        MessageType::RhInitial => ("rh", None, Some("initial")),
        MessageType::RhReminder(n) => ("rh", Some(format!("reminder{n}")), None),
        MessageType::CustomStep(_) | MessageType::Error | MessageType::Other(_) => ("campaign", None, Some("initial")),
    }
}

/// Resolves and renders both halves of a message up front so a missing
/// template or an unresolved placeholder is caught before anything is
/// written to the queue (spec §7 "template render failure").
fn resolve_and_render(
    templates: &TemplateStore,
    template_type: &str,
    reminder_type: Option<&str>,
    stage: Option<&str>,
    context: &orchestrator_util::TemplateContext,
) -> Result<(String, String)> {
    let subject_template = templates.resolve(template_type, "subject", reminder_type, stage)?;
    let body_template = templates.resolve(template_type, "body", reminder_type, stage)?;
    let subject = render_template_strict(subject_template, context)?;
    let body = render_template_strict(body_template, context)?;
    Ok((subject, body))
}

/// Enqueues `message_type` for `contact` within the caller's
/// transaction (the same one holding the contact's advisory lock), so
/// the existence check and the insert are never split across a lock
/// boundary. Does not commit; the caller does, once it releases the
/// lock.
#[allow(clippy::too_many_arguments)]
pub async fn send_campaign_message(
    tx: &mut Transaction<'_, Postgres>,
    queue: &QueueRepository,
    contacts: &ContactRepository,
    events: &EventRepository,
    templates: &TemplateStore,
    contact: &Contact,
    message_type: &MessageType,
    cadence_anchor: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    if queue.exists_active(tx, contact.id, &message_type.as_str()).await? {
        return Ok(None);
    }

    let event = events
        .find_by_id(contact.event_id)
        .await?
        .with_context(|| format!("event {} referenced by contact {} not found", contact.event_id, contact.id))?;

    let (template_type, reminder_type, stage) = template_key_for(message_type);
    let context = build_context(contact, &event);

    let rendered = resolve_and_render(templates, template_type, reminder_type.as_deref(), stage, &context);
    let (subject, body) = match rendered {
        Ok(pair) => pair,
        Err(err) => {
            warn!(contact_id = contact.id, message_type = %message_type.as_str(), error = %err, "template resolution/render failed, not enqueuing");
            let trigger_line = format!("{now} - template render failed for {}: {err}", message_type.as_str());
            contacts.append_trigger_line(contact.id, &trigger_line).await?;
            return Ok(None);
        }
    };

    let due_at = match gate_days_for(message_type) {
        Some(gate_days) => cadence_anchor.unwrap_or(now) + Duration::days(gate_days),
        None => now,
    };
    let scheduled_at = due_at.max(next_allowed_uk_business_time(now));

    let cc_recipients = snapshot_cc(contact);
    let attachment_is_present = contact.is_payments_class_stage() && contact.attachment.is_some();

    let id = queue
        .insert_row(
            tx,
            contact.id,
            contact.event_id,
            &event.sender_email,
            contact.primary_email(),
            cc_recipients.as_deref(),
            &subject,
            &body,
            &message_type.as_str(),
            due_at,
            scheduled_at,
        )
        .await?;

    if attachment_is_present {
        if let (Some(bytes), Some(filename), Some(mimetype)) =
            (&contact.attachment, &contact.attachment_filename, &contact.attachment_mimetype)
        {
            queue.set_attachment(tx, id, bytes, filename, mimetype).await?;
        }
    }

    let status_token = message_type.sent_status_token();
    let trigger_line = format!("{now} - enqueued {} ({status_token})", message_type.as_str());
    contacts
        .record_decision_enqueue(contact.id, &status_token, &message_type.as_str(), now, &trigger_line)
        .await?;

    Ok(Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_util::TemplateContext;

    #[test]
    fn resolve_and_render_errors_on_missing_key_without_writing_anything() {
        let mut store = TemplateStore::new();
        store.insert("forms", "subject", None, Some("initial".to_string()), "Hi {{greeting_name}}");
        store.insert("forms", "body", None, Some("initial".to_string()), "Please see {{forms_link}}");

        let ctx = TemplateContext::new();
        let result = resolve_and_render(&store, "forms", None, Some("initial"), &ctx);
        assert!(result.is_err());
    }

    #[test]
    fn resolve_and_render_succeeds_once_every_key_is_set() {
        let mut store = TemplateStore::new();
        store.insert("forms", "subject", None, Some("initial".to_string()), "Hi {{greeting_name}}");
        store.insert("forms", "body", None, Some("initial".to_string()), "Please see {{forms_link}}");

        let mut ctx = TemplateContext::new();
        ctx.set("greeting_name", "Doe".to_string());
        ctx.set("forms_link", "https://forms.example.com".to_string());

        let (subject, body) = resolve_and_render(&store, "forms", None, Some("initial"), &ctx).unwrap();
        assert_eq!(subject, "Hi Doe");
        assert_eq!(body, "Please see https://forms.example.com");
    }
}
