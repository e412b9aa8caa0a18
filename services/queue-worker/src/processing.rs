//! Per-row send-worker processing (spec §4.3).

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use tracing::{info, warn};

use orchestrator_database::{
    BouncedEmailRepository, ContactRepository, MessageContactMapRepository, MessageRepository, QueueRepository,
    SenderStatsRepository,
};
use orchestrator_mailer::{Attachment, MailTransport, SendMailRequest, SendOutcome};
use orchestrator_models::{Contact, MessageType, QueueRow, SenderStats};
use orchestrator_util::{
    build_outgoing_body, cooldown_elapsed, is_business_hours, next_allowed_uk_business_time,
    randomize_post_send_delay,
};

use crate::cadence::{cadence_gate_days, predecessor_message_type};

pub struct QueueWorker {
    pub queue: QueueRepository,
    pub contacts: ContactRepository,
    pub messages: MessageRepository,
    pub sender_stats: SenderStatsRepository,
    pub bounced: BouncedEmailRepository,
    pub transport: MailTransport,
    pub pool: sqlx::PgPool,
    pub batch_size: i64,
}

/// How a single row was disposed of this tick, for logging.
#[derive(Debug)]
pub enum RowOutcome {
    NotDueYet,
    Skipped(&'static str),
    Rescheduled(&'static str),
    Failed(String),
    Sent { message_id: String },
}

impl QueueWorker {
    pub async fn run_tick(&self) -> Result<()> {
        let ids = self.queue.fetch_due_ids(self.batch_size).await?;
        orchestrator_util::record_queue_depth("queue-worker", ids.len() as i64);
        if ids.is_empty() {
            return Ok(());
        }
        info!(count = ids.len(), "processing due queue rows");
        orchestrator_util::record_rows_processed("queue-worker", ids.len() as i64);

        for id in ids {
            match self.process_row(id).await {
                Ok(outcome) => info!(row_id = id, ?outcome, "queue row processed"),
                Err(err) => warn!(row_id = id, error = %err, "queue row processing failed with an unhandled error"),
            }
        }
        Ok(())
    }

    async fn process_row(&self, id: i64) -> Result<RowOutcome> {
        let Some((mut tx, row)) = self.queue.begin_claim(id).await? else {
            return Ok(RowOutcome::Skipped("row already claimed or no longer pending"));
        };

        let now = self.queue.db_now().await?;

        // Step 1: re-check due_at against the authoritative clock.
        if row.due_at > now {
            tx.rollback().await.ok();
            return Ok(RowOutcome::NotDueYet);
        }

        // Step 2: duplicate suppression.
        if self
            .queue
            .has_recent_duplicate(&mut tx, row.contact_id, &row.last_message_type, &row.recipient_email, row.id)
            .await?
        {
            self.queue.mark_skipped(&mut tx, row.id).await?;
            tx.commit().await?;
            return Ok(RowOutcome::Skipped("duplicate active row for contact/type/recipient"));
        }

        // Step 3: business-hours re-check.
        if !is_business_hours(now) {
            let rescheduled = next_allowed_uk_business_time(now);
            self.queue.reschedule(&mut tx, row.id, rescheduled).await?;
            tx.commit().await?;
            return Ok(RowOutcome::Rescheduled("outside business hours"));
        }

        let Some(contact) = self.contacts.find_by_id(row.contact_id).await? else {
            self.queue.mark_failed(&mut tx, row.id, "contact no longer exists").await?;
            tx.commit().await?;
            return Ok(RowOutcome::Failed("contact no longer exists".to_string()));
        };

        // Step 4: contact gating.
        let stage = contact.stage();
        let status = contact.status();
        if contact.campaign_paused || stage.is_terminal() || status.is_terminal() {
            self.queue.mark_skipped(&mut tx, row.id).await?;
            tx.commit().await?;
            return Ok(RowOutcome::Skipped("contact paused or in a terminal stage/status"));
        }

        // Step 5: cadence re-verification.
        let message_type = MessageType::from_str(&row.last_message_type);
        if let Some(gate_days) = cadence_gate_days(&message_type) {
            let anchor = self.cadence_anchor(&row, &contact, &message_type).await?;
            if let Some(anchor) = anchor {
                if now - anchor < ChronoDuration::days(gate_days) {
                    let resume_at = anchor + ChronoDuration::days(gate_days);
                    let rescheduled = next_allowed_uk_business_time(resume_at.max(now));
                    self.queue.reschedule(&mut tx, row.id, rescheduled).await?;
                    tx.commit().await?;
                    return Ok(RowOutcome::Rescheduled("cadence gap not yet satisfied"));
                }
            }
        }

        // Step 6: stuck-row GC. Custom-flow rows bypass the cooldown
        // precondition; everything else only GCs while the sender
        // isn't presently cooling down.
        let sender_stats = self.sender_stats.find_effective(&row.sender_email).await?;
        let cooling_down = sender_stats
            .as_ref()
            .map(|s| !cooldown_elapsed(s.last_sent, s.clamped_cooldown(), now))
            .unwrap_or(false);
        let is_custom_step = matches!(message_type, MessageType::CustomStep(_));
        if is_custom_step || !cooling_down {
            if let Some(stuck_id) =
                self.queue.find_stuck_predecessor(&mut tx, row.contact_id, &row.last_message_type, row.id).await?
            {
                self.queue.mark_failed(&mut tx, stuck_id, "Message stuck in pending state").await?;
            }
        }

        // Step 7: cooldown gate.
        if let Some(stats) = &sender_stats {
            if !cooldown_elapsed(stats.last_sent, stats.clamped_cooldown(), now) {
                let expires = stats.last_sent.expect("cooling_down implies a prior send")
                    + ChronoDuration::seconds(stats.clamped_cooldown() as i64);
                if !is_business_hours(expires) {
                    let rescheduled = next_allowed_uk_business_time(expires);
                    self.queue.reschedule(&mut tx, row.id, rescheduled).await?;
                    tx.commit().await?;
                    return Ok(RowOutcome::Rescheduled("cooldown expires outside business hours"));
                }
                tx.commit().await?;
                return Ok(RowOutcome::Skipped("sender cooling down, retrying next tick"));
            }
        }

        // Step 8: bounce gate.
        let recipient = primary_address(&row.recipient_email);
        if self.bounced.is_bounced(&recipient).await? {
            self.queue.mark_failed(&mut tx, row.id, "recipient address is on the bounced-email list").await?;
            tx.commit().await?;
            return Ok(RowOutcome::Failed("recipient bounced".to_string()));
        }

        // Step 9: send.
        let cc = self.resolve_cc(&row, &contact);
        let attachment = self.resolve_attachment(&mut tx, &row, &contact).await?;
        let body = build_outgoing_body(&contact, &row.message, &row.sender_email);

        let request = SendMailRequest {
            sender_email: row.sender_email.clone(),
            to: vec![recipient.clone()],
            cc,
            subject: row.subject.clone(),
            body,
            in_reply_to: row.in_reply_to.clone(),
            references: None,
            attachment,
        };

        let outcome = self.transport.send(request).await.context("mail transport send failed")?;

        match outcome {
            SendOutcome::Sent { message_id, conversation_id } => {
                self.apply_successful_send(&mut tx, &row, &contact, &message_type, &message_id, conversation_id, now)
                    .await?;
                tx.commit().await?;
                Ok(RowOutcome::Sent { message_id })
            }
            SendOutcome::Failed { error_message, .. } => {
                // Step 11: failures.
                self.queue.mark_failed(&mut tx, row.id, &error_message).await?;
                tx.commit().await?;
                self.contacts.record_send_error(row.contact_id, &error_message).await?;
                Ok(RowOutcome::Failed(error_message))
            }
        }
    }

    /// Resolves the cadence anchor: `queue.sent_at -> messages.sent_at
    /// -> contact.last_triggered_at` (spec §4.3 step 5).
    async fn cadence_anchor(
        &self,
        row: &QueueRow,
        contact: &Contact,
        message_type: &MessageType,
    ) -> Result<Option<chrono::DateTime<Utc>>> {
        let Some(predecessor) = predecessor_message_type(message_type) else {
            return Ok(None);
        };
        if let Some(sent_at) = self.queue.latest_sent_at_for_exact_type(row.contact_id, &predecessor).await? {
            return Ok(Some(sent_at));
        }
        if let Some(sent_at) = self.messages.latest_sent_at_for_contact(row.contact_id).await? {
            return Ok(Some(sent_at));
        }
        Ok(contact.last_triggered_at)
    }

    /// Derives CCs: the row's snapshot if present, else the contact's
    /// legacy embedded extras. `cc_store` is never consulted here.
    fn resolve_cc(&self, row: &QueueRow, contact: &Contact) -> Vec<String> {
        match &row.cc_recipients {
            Some(raw) if !raw.trim().is_empty() => {
                raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
            }
            _ => contact.embedded_extra_emails(),
        }
    }

    /// Propagates the contact's attachment onto a payments-class row
    /// that doesn't already carry one, persisting it so retries don't
    /// need the contact lookup again (spec §4.3 step 9).
    async fn resolve_attachment(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &QueueRow,
        contact: &Contact,
    ) -> Result<Option<Attachment>> {
        if let (Some(bytes), Some(filename), Some(mimetype)) =
            (&row.attachment, &row.attachment_filename, &row.attachment_mimetype)
        {
            return Ok(Some(Attachment { filename: filename.clone(), content: bytes.clone(), mimetype: mimetype.clone() }));
        }

        if !contact.is_payments_class_stage() {
            return Ok(None);
        }

        let (Some(bytes), Some(filename), Some(mimetype)) =
            (&contact.attachment, &contact.attachment_filename, &contact.attachment_mimetype)
        else {
            return Ok(None);
        };

        self.queue.set_attachment(tx, row.id, bytes, filename, mimetype).await?;
        Ok(Some(Attachment { filename: filename.clone(), content: bytes.clone(), mimetype: mimetype.clone() }))
    }

    /// Step 10: all post-send bookkeeping for a confirmed send.
    #[allow(clippy::too_many_arguments)]
    async fn apply_successful_send(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        row: &QueueRow,
        contact: &Contact,
        message_type: &MessageType,
        message_id: &str,
        conversation_id: Option<String>,
        sent_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        self.queue.mark_sent(tx, row.id, sent_at, message_id, conversation_id.as_deref()).await?;

        self.messages
            .insert(
                message_id,
                conversation_id.as_deref(),
                "sent",
                Some(row.contact_id),
                &row.sender_email,
                Some(&row.recipient_email),
                Some(&row.subject),
                Some(&row.message),
                None,
                sent_at,
            )
            .await?;

        let status_token = message_type.sent_status_token();
        let trigger_line = format!("{sent_at} - sent {} ({status_token})", message_type.as_str());
        self.contacts.mark_send_mirrored(row.contact_id, &row.message, sent_at, &status_token, &trigger_line).await?;

        MessageContactMapRepository::insert(tx, message_id, row.contact_id).await?;

        let domain_key = SenderStats::domain_key(&row.sender_email);
        let new_cooldown = randomize_post_send_delay().num_seconds() as i32;
        self.sender_stats.upsert(&domain_key, sent_at, new_cooldown).await?;
        self.sender_stats.refresh_last_sent_only(&row.sender_email, sent_at).await?;

        let _ = contact;
        Ok(())
    }
}

fn primary_address(recipient_email: &str) -> String {
    recipient_email.split(',').next().unwrap_or(recipient_email).trim().to_string()
}
