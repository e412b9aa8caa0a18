//! Immediate single-contact processor (spec §4.6).
//!
//! Invoked after operator actions (resume campaign, custom flow
//! creation) from outside the poll cycle, but shares the tick's
//! decision/enqueue primitives and the same per-contact advisory lock.

use anyhow::{Context, Result};
use sqlx::PgPool;

use orchestrator_database::{
    try_acquire_contact_lock, ContactRepository, CustomFlowRepository, EventRepository, MessageRepository,
    QueueRepository,
};
use orchestrator_models::{MessageType, NormalizedStage};
use orchestrator_util::TemplateStore;

use crate::flows::process_custom_flow;
use crate::sending::send_campaign_message;

/// Returns `true` if an action (enqueue or custom-flow advance) was
/// taken for this contact.
#[allow(clippy::too_many_arguments)]
pub async fn process_contact_immediately(
    pool: &PgPool,
    queue: &QueueRepository,
    contacts: &ContactRepository,
    events: &EventRepository,
    messages: &MessageRepository,
    custom_flows: &CustomFlowRepository,
    templates: &TemplateStore,
    contact_id: i64,
) -> Result<bool> {
    let contact = contacts
        .find_by_id(contact_id)
        .await?
        .with_context(|| format!("contact {contact_id} not found"))?;

    if !contact.is_eligible_for_auto_send() {
        return Ok(false);
    }

    let mut tx = pool.begin().await?;
    if !try_acquire_contact_lock(&mut tx, contact.id).await? {
        tx.rollback().await.ok();
        return Ok(false);
    }

    let now = queue.db_now().await?;

    if contact.flow_type.as_deref() == Some("custom") {
        let acted =
            process_custom_flow(&mut tx, queue, contacts, custom_flows, messages, events, &contact, now).await?;
        tx.commit().await?;
        return Ok(acted);
    }

    let normalized_stage = NormalizedStage::from_stage_str(&contact.stage);
    let Some(initial) = initial_message_type_for(normalized_stage) else {
        tx.commit().await?;
        return Ok(false);
    };

    if queue.is_sent(contact.id, &initial.as_str()).await? {
        tx.commit().await?;
        return Ok(false);
    }

    let enqueued =
        send_campaign_message(&mut tx, queue, contacts, events, templates, &contact, &initial, None, now).await?;
    tx.commit().await?;
    Ok(enqueued.is_some())
}

fn initial_message_type_for(stage: NormalizedStage) -> Option<MessageType> {
    match stage {
        NormalizedStage::Forms => Some(MessageType::FormsInitial),
        NormalizedStage::Payments => Some(MessageType::PaymentsInitial),
        NormalizedStage::Sepa => Some(MessageType::SepaInitial),
        NormalizedStage::Rh => Some(MessageType::RhInitial),
        NormalizedStage::Generic => None,
    }
}
