//! Daily logging streak tracking
//!
//! A small date-diff state machine per owner: the first record ever starts
//! a streak at 1, a record exactly one calendar day after the last one
//! increments it, a repeat on the same day leaves it untouched, and a gap
//! of more than one day resets it to 1 with the reset flagged so the
//! response layer can vary its message.

use crate::types::{StreakOutcome, StreakState};
use chrono::NaiveDate;

/// Advance an owner's streak for a record logged on `today`.
///
/// Pure function: persistence of the returned state is the caller's job.
/// The count is never incremented twice for the same calendar day.
pub fn advance(
    state: Option<&StreakState>,
    owner_id: &str,
    today: NaiveDate,
) -> (StreakState, StreakOutcome) {
    match state {
        None => (
            StreakState {
                owner_id: owner_id.to_string(),
                count: 1,
                last_logged: today,
            },
            StreakOutcome::Started,
        ),
        Some(prev) => {
            let gap = (today - prev.last_logged).num_days();
            if gap <= 0 {
                (prev.clone(), StreakOutcome::Unchanged)
            } else if gap == 1 {
                (
                    StreakState {
                        owner_id: owner_id.to_string(),
                        count: prev.count + 1,
                        last_logged: today,
                    },
                    StreakOutcome::Continued,
                )
            } else {
                (
                    StreakState {
                        owner_id: owner_id.to_string(),
                        count: 1,
                        last_logged: today,
                    },
                    StreakOutcome::Reset,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn consecutive_days_count_up() {
        let (s1, o1) = advance(None, "owner-1", day(1));
        assert_eq!((s1.count, o1), (1, StreakOutcome::Started));

        let (s2, o2) = advance(Some(&s1), "owner-1", day(2));
        assert_eq!((s2.count, o2), (2, StreakOutcome::Continued));

        let (s3, o3) = advance(Some(&s2), "owner-1", day(3));
        assert_eq!((s3.count, o3), (3, StreakOutcome::Continued));
    }

    #[test]
    fn same_day_repeat_is_unchanged() {
        let (s1, _) = advance(None, "owner-1", day(5));
        let (s2, o2) = advance(Some(&s1), "owner-1", day(5));
        assert_eq!(o2, StreakOutcome::Unchanged);
        assert_eq!(s2.count, 1);
        assert_eq!(s2.last_logged, day(5));
    }

    #[test]
    fn skipped_day_resets_with_flag() {
        let (s1, _) = advance(None, "owner-1", day(1));
        let (s2, _) = advance(Some(&s1), "owner-1", day(2));
        let (s3, o3) = advance(Some(&s2), "owner-1", day(4));
        assert_eq!(o3, StreakOutcome::Reset);
        assert_eq!(s3.count, 1);
        assert!(o3.is_change());
    }
}
