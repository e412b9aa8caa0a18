//! Operator-defined custom flow branch (spec §4.4 "custom" flow_type).
//!
//! A custom flow is a fixed, contact-specific list of steps — email,
//! task, or notification — walked in order. Each step's due time is
//! the previous step's completion plus its `delay_days`, except the
//! first step which is due immediately once the flow starts.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{Postgres, Transaction};

use orchestrator_database::{ContactRepository, CustomFlowRepository, EventRepository, MessageRepository, QueueRepository};
use orchestrator_models::{Contact, CustomStepType, MessageType};
use orchestrator_util::{next_allowed_uk_business_time, render_template_strict};
use tracing::warn;

use crate::context::{build_context, snapshot_cc};

/// Finds the contact's active flow and advances it by one step if due,
/// using the caller's transaction (the one holding the contact's
/// advisory lock) for the email-enqueue case. Returns `true` if an
/// action (enqueue, step advance, or completion) was taken this call.
#[allow(clippy::too_many_arguments)]
pub async fn process_custom_flow(
    tx: &mut Transaction<'_, Postgres>,
    queue: &QueueRepository,
    contacts: &ContactRepository,
    custom_flows: &CustomFlowRepository,
    messages: &MessageRepository,
    events: &EventRepository,
    contact: &Contact,
    now: DateTime<Utc>,
) -> Result<bool> {
    let Some(flow) = custom_flows.find_active_flow_for_contact(contact.id).await? else {
        return Ok(false);
    };
    let steps = custom_flows.steps_for_flow(flow.id).await?;

    let mut next_step = None;
    for step in &steps {
        let message_type = MessageType::CustomStep(step.step_order as u32);
        if !queue.is_sent(contact.id, &message_type.as_str()).await? {
            next_step = Some(step);
            break;
        }
    }

    let Some(step) = next_step else {
        contacts.set_custom_complete(contact.id).await?;
        return Ok(true);
    };

    let message_type = MessageType::CustomStep(step.step_order as u32);
    if queue.has_pending_for_type(contact.id, &message_type.as_str()).await? {
        return Ok(false);
    }

    let due_at = if step.is_first() {
        now
    } else {
        let predecessor = MessageType::CustomStep(step.step_order as u32 - 1);
        let anchor = step_anchor(queue, messages, contact, &predecessor).await?.unwrap_or(now);
        anchor + Duration::days(step.delay_days as i64)
    };

    if now < due_at {
        return Ok(false);
    }

    match step.step_type() {
        CustomStepType::Task | CustomStepType::Notification => {
            contacts.set_step_status(contact.id, &format!("step-{}", step.step_order)).await?;
            Ok(true)
        }
        CustomStepType::Email => {
            let event = events
                .find_by_id(contact.event_id)
                .await?
                .with_context(|| format!("event {} referenced by contact {} not found", contact.event_id, contact.id))?;

            if queue.exists_active(tx, contact.id, &message_type.as_str()).await? {
                return Ok(false);
            }

            let context = build_context(contact, &event);
            let (subject, body) = match render_step_template(&step.subject, &step.body, &context) {
                Ok(pair) => pair,
                Err(err) => {
                    warn!(contact_id = contact.id, step_order = step.step_order, error = %err, "custom step template render failed, not enqueuing");
                    let trigger_line = format!("{now} - template render failed for custom step {}: {err}", step.step_order);
                    contacts.append_trigger_line(contact.id, &trigger_line).await?;
                    return Ok(false);
                }
            };
            let scheduled_at = due_at.max(next_allowed_uk_business_time(now));
            let cc_recipients = snapshot_cc(contact);

            queue
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

            let trigger_line = format!("{now} - enqueued custom step {}", step.step_order);
            contacts
                .record_decision_enqueue(contact.id, &format!("step-{}", step.step_order), &message_type.as_str(), now, &trigger_line)
                .await?;
            Ok(true)
        }
    }
}

fn render_step_template(
    subject_template: &str,
    body_template: &str,
    context: &orchestrator_util::TemplateContext,
) -> Result<(String, String)> {
    let subject = render_template_strict(subject_template, context)?;
    let body = render_template_strict(body_template, context)?;
    Ok((subject, body))
}

async fn step_anchor(
    queue: &QueueRepository,
    messages: &MessageRepository,
    contact: &Contact,
    predecessor: &MessageType,
) -> Result<Option<DateTime<Utc>>> {
    if let Some(sent_at) = queue.latest_sent_at_for_exact_type(contact.id, &predecessor.as_str()).await? {
        return Ok(Some(sent_at));
    }
    if let Some(sent_at) = messages.latest_sent_at_for_contact(contact.id).await? {
        return Ok(Some(sent_at));
    }
    Ok(contact.last_triggered_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use orchestrator_util::TemplateContext;

    #[test]
    fn render_step_template_errors_on_unset_placeholder() {
        let ctx = TemplateContext::new();
        let result = render_step_template("Hi {{greeting_name}}", "Body text", &ctx);
        assert!(result.is_err());
    }

    #[test]
    fn render_step_template_renders_both_halves() {
        let mut ctx = TemplateContext::new();
        ctx.set("greeting_name", "Doe".to_string());
        let (subject, body) = render_step_template("Hi {{greeting_name}}", "Steady as she goes", &ctx).unwrap();
        assert_eq!(subject, "Hi Doe");
        assert_eq!(body, "Steady as she goes");
    }
}
