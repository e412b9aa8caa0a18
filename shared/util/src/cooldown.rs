use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use orchestrator_models::SenderStats;

/// Whether enough time has passed since `last_sent` given
/// `cooldown_seconds` (already clamped by the caller via
/// `SenderStats::clamped_cooldown`).
pub fn cooldown_elapsed(last_sent: Option<DateTime<Utc>>, cooldown_seconds: i32, now: DateTime<Utc>) -> bool {
    match last_sent {
        None => true,
        Some(last) => now - last >= Duration::seconds(cooldown_seconds as i64),
    }
}

/// Picks a randomized delay within
/// `[POST_SEND_RANDOM_MIN_SECONDS, POST_SEND_RANDOM_MAX_SECONDS]` to
/// apply after a send, so consecutive sends from one sender don't
/// land on a perfectly uniform cadence.
pub fn randomize_post_send_delay() -> Duration {
    let mut rng = rand::thread_rng();
    let seconds = rng.gen_range(
        SenderStats::POST_SEND_RANDOM_MIN_SECONDS..=SenderStats::POST_SEND_RANDOM_MAX_SECONDS,
    );
    Duration::seconds(seconds as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_prior_send_is_never_blocked() {
        assert!(cooldown_elapsed(None, 90, Utc::now()));
    }

    #[test]
    fn recent_send_blocks() {
        let now = Utc::now();
        let last = now - Duration::seconds(10);
        assert!(!cooldown_elapsed(Some(last), 90, now));
    }

    #[test]
    fn elapsed_cooldown_allows_send() {
        let now = Utc::now();
        let last = now - Duration::seconds(200);
        assert!(cooldown_elapsed(Some(last), 90, now));
    }

    #[test]
    fn randomized_delay_stays_within_bounds() {
        for _ in 0..100 {
            let delay = randomize_post_send_delay();
            assert!(delay.num_seconds() >= SenderStats::POST_SEND_RANDOM_MIN_SECONDS as i64);
            assert!(delay.num_seconds() <= SenderStats::POST_SEND_RANDOM_MAX_SECONDS as i64);
        }
    }
}
