use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Europe::London;

pub const BUSINESS_HOURS_START: u32 = 6;
pub const BUSINESS_HOURS_END: u32 = 21;

/// Whether `utc_timestamp` falls within the 06:00-21:00 UK send
/// window. Every day of the week is a business day.
pub fn is_business_hours(utc_timestamp: DateTime<Utc>) -> bool {
    let uk_time = utc_timestamp.with_timezone(&London);
    let hour = uk_time.hour();
    (BUSINESS_HOURS_START..BUSINESS_HOURS_END).contains(&hour)
}

/// Computes the next UK send time at or after `utc_timestamp`:
/// - before 06:00: same day at 06:00
/// - within 06:00-21:00: now, unchanged
/// - at or after 21:00: next day at 06:00
///
/// Every day is treated as a business day, so there is no
/// weekend-skipping branch.
pub fn next_allowed_uk_business_time(utc_timestamp: DateTime<Utc>) -> DateTime<Utc> {
    let uk_time = utc_timestamp.with_timezone(&London);
    let hour = uk_time.hour();

    let next_send_uk = if hour < BUSINESS_HOURS_START {
        uk_time
            .date_naive()
            .and_hms_opt(BUSINESS_HOURS_START, 0, 0)
            .expect("valid time")
            .and_local_timezone(London)
            .single()
            .expect("unambiguous local time")
    } else if hour < BUSINESS_HOURS_END {
        uk_time
    } else {
        (uk_time.date_naive() + Duration::days(1))
            .and_hms_opt(BUSINESS_HOURS_START, 0, 0)
            .expect("valid time")
            .and_local_timezone(London)
            .single()
            .expect("unambiguous local time")
    };

    next_send_uk.with_timezone(&Utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn before_business_hours_moves_to_six_am() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 3, 0, 0).unwrap();
        let next = next_allowed_uk_business_time(t);
        assert_eq!(next.with_timezone(&London).hour(), 6);
        assert!(!is_business_hours(t));
    }

    #[test]
    fn within_business_hours_is_immediate() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 10, 0, 0).unwrap();
        assert!(is_business_hours(t));
        assert_eq!(next_allowed_uk_business_time(t), t);
    }

    #[test]
    fn after_business_hours_moves_to_next_day_six_am() {
        let t = Utc.with_ymd_and_hms(2026, 1, 5, 22, 0, 0).unwrap();
        assert!(!is_business_hours(t));
        let next = next_allowed_uk_business_time(t);
        assert_eq!(next.with_timezone(&London).hour(), 6);
        assert!(next.with_timezone(&London).date_naive() > t.with_timezone(&London).date_naive());
    }

    #[test]
    fn weekend_is_still_a_business_day() {
        // 2026-01-03 is a Saturday.
        let t = Utc.with_ymd_and_hms(2026, 1, 3, 10, 0, 0).unwrap();
        assert!(is_business_hours(t));
    }
}
