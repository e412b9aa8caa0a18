//! Per-contact decision orchestration (spec §4.4).
//!
//! Runs on a fixed interval, locking each eligible contact with a
//! transaction-scoped advisory lock so two decision-engine instances
//! never race on the same contact, dispatching to either the
//! operator-defined custom flow or the default cadence table.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use orchestrator_database::{
    try_acquire_contact_lock, ContactRepository, CustomFlowRepository, EventRepository, MessageRepository,
    QueueRepository,
};
use orchestrator_models::{Contact, MessageType, NormalizedStage};
use orchestrator_util::TemplateStore;

use crate::action::determine_next_action;
use crate::flows::process_custom_flow;
use crate::sending::send_campaign_message;

pub struct DecisionEngine {
    pub queue: QueueRepository,
    pub contacts: ContactRepository,
    pub events: EventRepository,
    pub messages: MessageRepository,
    pub custom_flows: CustomFlowRepository,
    pub templates: TemplateStore,
    pub pool: sqlx::PgPool,
    pub batch_size: i64,
}

/// A contact that resumed very recently (no prior message yet, but
/// triggered within this window) is left alone for one more tick so
/// the send worker has a chance to pick up anything already queued
/// before the engine re-evaluates it (spec §4.4 "recent resume guard").
const RECENT_RESUME_GUARD: Duration = Duration::minutes(5);

impl DecisionEngine {
    pub async fn run_tick(&self) -> Result<()> {
        let contacts = self.contacts.find_eligible_for_decision_engine(self.batch_size).await?;
        orchestrator_util::record_queue_depth("decision-engine", contacts.len() as i64);
        if contacts.is_empty() {
            return Ok(());
        }
        info!(count = contacts.len(), "evaluating contacts for next action");
        orchestrator_util::record_rows_processed("decision-engine", contacts.len() as i64);

        for contact in contacts {
            if let Err(err) = self.process_contact(&contact).await {
                tracing::warn!(contact_id = contact.id, error = %err, "decision engine failed to process contact");
            }
        }
        Ok(())
    }

    async fn process_contact(&self, contact: &Contact) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        if !try_acquire_contact_lock(&mut tx, contact.id).await? {
            tx.rollback().await.ok();
            debug!(contact_id = contact.id, "another instance holds this contact's lock, skipping");
            return Ok(());
        }

        let now = self.queue.db_now().await?;

        if self.recently_resumed(contact, now) {
            tx.commit().await?;
            return Ok(());
        }

        if contact.flow_type.as_deref() == Some("custom") {
            process_custom_flow(
                &mut tx,
                &self.queue,
                &self.contacts,
                &self.custom_flows,
                &self.messages,
                &self.events,
                contact,
                now,
            )
            .await?;
            tx.commit().await?;
            return Ok(());
        }

        let normalized_stage = NormalizedStage::from_stage_str(&contact.stage);
        let status = contact.status();
        let last_message_type = contact.last_message_type.as_deref().map(MessageType::from_str);
        let error_since = contact.last_error_at.map(|at| now - at);

        // Pending-exists guard (spec "Critical rule"): a reminder can only
        // be decided once its predecessor's row has actually reached
        // `sent`. Without this, a cooldown longer than one tick makes every
        // later step in the chain look due while the predecessor is still
        // `pending`, jumping the pipeline ahead of the send worker.
        if let Some(lmt) = &last_message_type {
            if self.queue.has_pending_for_type(contact.id, &lmt.as_str()).await? {
                tx.commit().await?;
                return Ok(());
            }
        }

        let cadence_anchor = self.cadence_anchor(contact, &last_message_type).await?;
        let time_since_last = cadence_anchor.map(|anchor| now - anchor);

        let Some(next) =
            determine_next_action(normalized_stage, &status, last_message_type.as_ref(), time_since_last, error_since)
        else {
            tx.commit().await?;
            return Ok(());
        };

        if self.queue.has_pending_for_type(contact.id, &next.as_str()).await? {
            tx.commit().await?;
            return Ok(());
        }

        send_campaign_message(
            &mut tx,
            &self.queue,
            &self.contacts,
            &self.events,
            &self.templates,
            contact,
            &next,
            cadence_anchor,
            now,
        )
        .await?;
        tx.commit().await?;
        Ok(())
    }

    /// True if the contact started its chain within [`RECENT_RESUME_GUARD`]
    /// and hasn't sent anything yet — give the send worker a head start.
    fn recently_resumed(&self, contact: &Contact, now: DateTime<Utc>) -> bool {
        contact.last_message_type.is_none()
            && contact.last_triggered_at.map(|at| now - at < RECENT_RESUME_GUARD).unwrap_or(false)
    }

    /// Resolves how long it has been since the contact's last send in
    /// its current normalized-stage chain (spec §4.4 priority order):
    /// 1. the latest `queue.sent_at` whose `last_message_type` shares
    ///    the stage's prefix (falls through cleanly once a sepa/rh
    ///    contact has moved into the shared `payments_reminder4..6`
    ///    tail, since the stage string itself is unchanged),
    /// 2. `contact.last_triggered_at`,
    /// 3. the latest `messages.sent_at` for the contact.
    async fn cadence_anchor(
        &self,
        contact: &Contact,
        last_message_type: &Option<MessageType>,
    ) -> Result<Option<DateTime<Utc>>> {
        if last_message_type.is_none() {
            return Ok(None);
        }

        let prefix = NormalizedStage::from_stage_str(&contact.stage);
        let prefix_str = match prefix {
            NormalizedStage::Rh => "rh",
            NormalizedStage::Payments => "payments",
            NormalizedStage::Sepa => "sepa",
            NormalizedStage::Forms => "forms",
            NormalizedStage::Generic => "",
        };

        if !prefix_str.is_empty() {
            if let Some(sent_at) = self.queue.latest_sent_at_for_type_prefix(contact.id, prefix_str).await? {
                return Ok(Some(sent_at));
            }
        }

        if let Some(at) = contact.last_triggered_at {
            return Ok(Some(at));
        }

        if let Some(sent_at) = self.messages.latest_sent_at_for_contact(contact.id).await? {
            return Ok(Some(sent_at));
        }

        Ok(None)
    }
}
