//! Property-based tests for the invariants spec §8 lists as holding
//! "for all runs" — the ones expressible purely in terms of the shared
//! utility crates, without a live database.

use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Europe::London;
use proptest::prelude::*;

use orchestrator_util::{
    cooldown_elapsed, extract_bounced_email, is_bounce_email, is_business_hours, next_allowed_uk_business_time,
    render_template_strict, TemplateContext,
};

fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (2020i32..2030, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(|(y, mo, d, h, mi, s)| {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).single().expect("valid date")
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// `next_allowed_uk_business_time` never moves a timestamp backwards,
    /// and its result always falls within the UK business-hours window.
    #[test]
    fn next_business_time_is_forward_and_in_window(t in arb_timestamp()) {
        let next = next_allowed_uk_business_time(t);
        prop_assert!(next >= t);
        let uk_hour = next.with_timezone(&London).hour();
        prop_assert!((6..21).contains(&uk_hour));
    }

    /// A timestamp already inside the window is returned unchanged —
    /// idempotent under repeated application.
    #[test]
    fn business_time_is_idempotent(t in arb_timestamp()) {
        let once = next_allowed_uk_business_time(t);
        let twice = next_allowed_uk_business_time(once);
        prop_assert_eq!(once, twice);
    }

    /// `is_business_hours` and `next_allowed_uk_business_time` agree:
    /// if a timestamp is already in business hours, the function is a
    /// no-op; otherwise it strictly advances.
    #[test]
    fn business_hours_flag_matches_adjustment(t in arb_timestamp()) {
        let adjusted = next_allowed_uk_business_time(t);
        if is_business_hours(t) {
            prop_assert_eq!(adjusted, t);
        } else {
            prop_assert!(adjusted > t);
        }
    }

    /// Cooldown gate: any gap shorter than the configured window blocks,
    /// any gap at or beyond it allows (spec §8 "30s cooldown floor").
    #[test]
    fn cooldown_gate_matches_elapsed_seconds(cooldown_seconds in 1i32..600, elapsed_seconds in 0i64..1200) {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let last = now - chrono::Duration::seconds(elapsed_seconds);
        let allowed = cooldown_elapsed(Some(last), cooldown_seconds, now);
        prop_assert_eq!(allowed, elapsed_seconds >= cooldown_seconds as i64);
    }

    /// Strict template rendering never silently drops a missing key —
    /// it always errors rather than substituting an empty string.
    #[test]
    fn strict_render_errors_on_missing_key(key in "[a-z_]{3,12}") {
        let template = format!("Hello {{{{{key}}}}}");
        let ctx = TemplateContext::new();
        prop_assert!(render_template_strict(&template, &ctx).is_err());
    }

    /// Once the key is present, rendering is deterministic and
    /// substitutes exactly the stored value.
    #[test]
    fn strict_render_substitutes_present_key(key in "[a-z_]{3,12}", value in "[A-Za-z0-9 ]{0,20}") {
        let template = format!("Hello {{{{{key}}}}}!");
        let mut ctx = TemplateContext::new();
        ctx.set(key.as_str(), value.clone());
        let rendered = render_template_strict(&template, &ctx).unwrap();
        prop_assert_eq!(rendered, format!("Hello {value}!"));
    }

    /// A bounce notification's extracted address, when present, is
    /// always contained in the original body (extraction never
    /// invents an address).
    #[test]
    fn extracted_bounce_address_is_substring_of_body(
        local in "[a-z]{3,10}",
        domain in "[a-z]{3,10}\\.[a-z]{2,3}",
    ) {
        let address = format!("{local}@{domain}");
        let body = format!("Delivery has failed to these recipients:\n{address}\n\nThe error was: 550 mailbox unavailable");
        if let Some(extracted) = extract_bounced_email(&body) {
            prop_assert!(body.contains(&extracted));
        }
    }
}

#[test]
fn bounce_subject_alone_is_sufficient() {
    assert!(is_bounce_email("Undeliverable: Your message", "", "mailer-daemon@example.com"));
}

#[test]
fn ordinary_reply_is_not_a_bounce() {
    assert!(!is_bounce_email("Re: Your invoice", "Thanks, will pay tomorrow.", "alice@example.com"));
}
