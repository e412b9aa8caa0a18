//! Shared template-context and CC-snapshot helpers used by both the
//! default cadence branch and the custom flow branch.

use orchestrator_models::{Contact, Event};
use orchestrator_util::TemplateContext;

pub fn build_context(contact: &Contact, event: &Event) -> TemplateContext {
    let mut ctx = TemplateContext::new().with_name_parts(&contact.name, contact.prefix.as_deref());
    ctx.set("event_name", event.event_name.clone());
    ctx.set_opt("org_name", event.org_name.clone());
    ctx.set_opt("city", event.city.clone());
    ctx.set_opt("venue", event.venue.clone());
    ctx.set_opt("date2", event.date2.clone());
    ctx.set_opt("month", event.month.clone());
    ctx.set_opt("invoice_number", contact.invoice_number.clone());
    ctx.set_opt("forms_link", contact.forms_link.clone());
    ctx.set_opt("payment_link", contact.payment_link.clone());
    ctx
}

/// Derives the snapshot cc list for a new row: `cc_store` if present,
/// else the contact's legacy embedded extras. Captured once at
/// enqueue time per spec §4.4, so later edits to `cc_store` never
/// retroactively change an already-queued row.
pub fn snapshot_cc(contact: &Contact) -> Option<String> {
    match &contact.cc_store {
        Some(raw) if !raw.trim().is_empty() => Some(raw.clone()),
        _ => {
            let extras = contact.embedded_extra_emails();
            if extras.is_empty() {
                None
            } else {
                Some(extras.join(","))
            }
        }
    }
}
