//! Scenario-level integration tests for spec §8's end-to-end cases,
//! scoped to what's exercisable without a live database: template
//! resolution end to end, and the business-hours/cooldown boundary
//! scenarios spec §8 calls out explicitly.

use chrono::{Duration, TimeZone, Utc};

use orchestrator_models::Contact;
use orchestrator_util::{
    cooldown_elapsed, next_allowed_uk_business_time, render_template_strict, TemplateContext, TemplateStore,
};

fn sample_contact(stage: &str, status: &str) -> Contact {
    Contact {
        id: 1,
        event_id: 1,
        name: "Jane Doe".to_string(),
        prefix: Some("Dr".to_string()),
        email: "jane@example.com,extra@example.com".to_string(),
        cc_store: None,
        stage: stage.to_string(),
        status: status.to_string(),
        last_message_type: None,
        last_triggered_at: None,
        last_sent_body: None,
        last_sent_at: None,
        last_reply_body: None,
        last_reply_at: None,
        campaign_paused: false,
        email_bounced: false,
        flow_type: None,
        attachment: None,
        attachment_filename: None,
        attachment_mimetype: None,
        forms_link: None,
        payment_link: None,
        invoice_number: None,
        assigned_to: None,
        email_error: None,
        last_error_at: None,
        trigger: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

/// spec §8 boundary case: a send attempt at local 20:59:59 proceeds
/// unchanged; at 21:00:00 it reschedules to next day 06:00.
#[test]
fn business_hours_boundary_20_59_59_vs_21_00_00() {
    let just_before = Utc.with_ymd_and_hms(2026, 3, 9, 20, 59, 59).unwrap();
    let at_close = Utc.with_ymd_and_hms(2026, 3, 9, 21, 0, 0).unwrap();

    assert_eq!(next_allowed_uk_business_time(just_before), just_before);

    let rescheduled = next_allowed_uk_business_time(at_close);
    assert_ne!(rescheduled, at_close);
    assert_eq!(rescheduled, Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap());
}

/// spec §8 boundary case: a send attempt at local 05:59:59 reschedules
/// to 06:00:00 the same day.
#[test]
fn business_hours_boundary_05_59_59_reschedules_same_day() {
    let early = Utc.with_ymd_and_hms(2026, 3, 9, 5, 59, 59).unwrap();
    let rescheduled = next_allowed_uk_business_time(early);
    assert_eq!(rescheduled, Utc.with_ymd_and_hms(2026, 3, 9, 6, 0, 0).unwrap());
}

/// spec §8 scenario 4: a cooldown-gated row becomes due a moment
/// before the business-hours window closes; after clamping it across
/// the boundary it lands in the next day's window.
#[test]
fn cooldown_crossing_the_window_lands_next_morning() {
    let last_sent = Utc.with_ymd_and_hms(2026, 3, 9, 20, 59, 0).unwrap();
    let cooldown_seconds = 90;

    let cooldown_expires = last_sent + Duration::seconds(cooldown_seconds as i64);
    assert_eq!(cooldown_expires, Utc.with_ymd_and_hms(2026, 3, 9, 21, 0, 30).unwrap());
    assert!(cooldown_elapsed(Some(last_sent), cooldown_seconds, cooldown_expires));

    let scheduled_at = next_allowed_uk_business_time(cooldown_expires);
    assert_eq!(scheduled_at, Utc.with_ymd_and_hms(2026, 3, 10, 6, 0, 0).unwrap());
}

/// Full template resolution + strict rendering, the way the decision
/// engine composes a forms_initial send: fallback-resolved templates,
/// rendered against a contact-derived context, with name-parts and
/// alias normalization applied.
#[test]
fn forms_initial_template_resolves_and_renders() {
    let mut store = TemplateStore::new();
    store.insert("forms", "subject", None, Some("initial".to_string()), "{{prefix}} {{last_name}}: complete your forms");
    store.insert(
        "forms",
        "body",
        None,
        Some("initial".to_string()),
        "Dear {{greeting_name}}, please complete your forms at {{forms_link}}.",
    );

    let contact = sample_contact("forms", "pending");
    let mut ctx = TemplateContext::new().with_name_parts(&contact.name, contact.prefix.as_deref());
    ctx.set("forms_link", "https://forms.example.com/abc".to_string());

    let subject_template = store.resolve("forms", "subject", None, Some("initial")).unwrap();
    let body_template = store.resolve("forms", "body", None, Some("initial")).unwrap();

    let subject = render_template_strict(subject_template, &ctx).unwrap();
    let body = render_template_strict(body_template, &ctx).unwrap();

    assert_eq!(subject, "Dr. Doe: complete your forms");
    assert!(body.contains("Dear Doe,"));
    assert!(body.contains("https://forms.example.com/abc"));
}

/// Templates fall back from the most specific key down to the
/// template-type default when no reminder/stage-specific copy exists.
#[test]
fn template_resolution_falls_back_to_template_type_default() {
    let mut store = TemplateStore::new();
    store.insert("payments", "subject", None, None, "Payment reminder");

    let resolved = store.resolve("payments", "subject", Some("reminder2"), None).unwrap();
    assert_eq!(resolved, "Payment reminder");
}

/// `payment_link`/`payments_link` aliasing: a template using either
/// spelling resolves against a context that only set one of them.
#[test]
fn payment_link_alias_resolves_either_spelling() {
    let mut ctx = TemplateContext::new();
    ctx.set("payment_link", "https://pay.example.com/xyz".to_string());

    let rendered = render_template_strict("Pay here: {{payments_link}}", &ctx).unwrap();
    assert_eq!(rendered, "Pay here: https://pay.example.com/xyz");
}
