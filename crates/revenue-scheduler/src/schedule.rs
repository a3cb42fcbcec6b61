use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};

use crate::types::Schedule;

/// Compute the next UTC execution time for `schedule` starting *after* `from`.
///
/// Returns `None` when the schedule is exhausted (a `Once` job whose time has
/// already passed) or the daily time is invalid.
pub fn compute_next_run(schedule: &Schedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match schedule {
        Schedule::Once { at } => {
            // Fire only if the instant is still in the future.
            if *at > from {
                Some(*at)
            } else {
                None
            }
        }

        Schedule::Interval { every_secs } => {
            Some(from + Duration::seconds((*every_secs).max(1) as i64))
        }

        Schedule::Daily { hour, minute } => {
            // Build today's candidate at HH:MM:00 UTC.
            let candidate = Utc
                .with_ymd_and_hms(
                    from.year(),
                    from.month(),
                    from.day(),
                    *hour as u32,
                    *minute as u32,
                    0,
                )
                .single()?;
            if candidate > from {
                Some(candidate)
            } else {
                // Today's window has passed — advance to tomorrow.
                Some(candidate + Duration::days(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap()
    }

    #[test]
    fn daily_later_today() {
        let next = compute_next_run(&Schedule::Daily { hour: 6, minute: 0 }, at(5, 59, 0));
        assert_eq!(next, Some(at(6, 0, 0)));
    }

    #[test]
    fn daily_passed_rolls_to_tomorrow() {
        let next = compute_next_run(&Schedule::Daily { hour: 6, minute: 0 }, at(6, 0, 0)).unwrap();
        assert_eq!(next, at(6, 0, 0) + Duration::days(1));
    }

    #[test]
    fn daily_midnight_is_next_day() {
        let next = compute_next_run(&Schedule::Daily { hour: 0, minute: 0 }, at(12, 0, 0)).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 0, 0, 0).unwrap());
    }

    #[test]
    fn invalid_daily_time_has_no_next_run() {
        assert!(compute_next_run(&Schedule::Daily { hour: 25, minute: 0 }, at(1, 0, 0)).is_none());
    }

    #[test]
    fn once_in_past_is_exhausted() {
        let schedule = Schedule::Once { at: at(1, 0, 0) };
        assert!(compute_next_run(&schedule, at(2, 0, 0)).is_none());
        assert_eq!(compute_next_run(&schedule, at(0, 0, 0)), Some(at(1, 0, 0)));
    }

    #[test]
    fn interval_adds_seconds() {
        let next = compute_next_run(&Schedule::Interval { every_secs: 90 }, at(1, 0, 0));
        assert_eq!(next, Some(at(1, 1, 30)));
    }
}
