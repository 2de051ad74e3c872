use chrono::{Datelike, Duration, NaiveDate, NaiveTime};

use crate::models::{Slot, WeeklySchedule};

/// All slot boundaries for one calendar date, ascending: the walk from the
/// day's start to its end in granularity steps. N boundaries delimit N-1
/// selectable slots, so the day's final boundary is never itself bookable.
pub fn slot_boundaries(
    schedule: &WeeklySchedule,
    date: NaiveDate,
    granularity_minutes: u32,
) -> Vec<NaiveTime> {
    if granularity_minutes == 0 {
        return Vec::new();
    }

    let Some((day_start, day_end)) = schedule.range_for(date.weekday()) else {
        return Vec::new();
    };

    let step = Duration::minutes(granularity_minutes as i64);
    let mut boundaries = Vec::new();
    let mut current = day_start;

    loop {
        boundaries.push(current);
        // NaiveTime arithmetic wraps at midnight; a wrapped step means the
        // range is exhausted.
        let (next, wrapped) = current.overflowing_add_signed(step);
        if wrapped != 0 || next > day_end {
            break;
        }
        current = next;
    }

    boundaries
}

/// Expand a provider's weekly schedule into the ordered candidate slots for
/// one date. Deterministic: identical inputs always produce identical
/// output, and days that resolve to no working range produce none.
pub fn generate_slots(
    schedule: &WeeklySchedule,
    date: NaiveDate,
    granularity_minutes: u32,
) -> Vec<Slot> {
    slot_boundaries(schedule, date, granularity_minutes)
        .windows(2)
        .map(|pair| Slot {
            start: pair[0],
            end: pair[1],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn schedule_with(day: &str, range: &str) -> WeeklySchedule {
        let mut days = HashMap::new();
        days.insert(day.to_string(), range.to_string());
        WeeklySchedule::from_days(days)
    }

    // 2025-06-02 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    #[test]
    fn monday_morning_yields_six_slots_from_seven_boundaries() {
        let schedule = schedule_with("monday", "9:00 AM - 12:00 PM");

        let boundaries = slot_boundaries(&schedule, monday(), 30);
        assert_eq!(boundaries.len(), 7);

        let slots = generate_slots(&schedule, monday(), 30);
        let starts: Vec<String> = slots
            .iter()
            .map(|slot| slot.start.format("%H:%M").to_string())
            .collect();
        assert_eq!(starts, ["09:00", "09:30", "10:00", "10:30", "11:00", "11:30"]);

        let last = slots.last().unwrap();
        assert_eq!(last.end, NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }

    #[test]
    fn generation_is_deterministic() {
        let schedule = schedule_with("monday", "9:00 AM - 5:00 PM");
        let first = generate_slots(&schedule, monday(), 30);
        let second = generate_slots(&schedule, monday(), 30);
        assert_eq!(first, second);
        assert_eq!(first.len(), 16);
    }

    #[test]
    fn slots_are_ascending_and_contiguous() {
        let schedule = schedule_with("monday", "8:00 AM - 12:00 PM");
        let slots = generate_slots(&schedule, monday(), 60);
        assert_eq!(slots.len(), 4);
        for pair in slots.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].start < pair[1].start);
        }
    }

    #[test]
    fn partial_trailing_interval_is_dropped() {
        // 9:00-10:15 at 30-minute granularity: boundaries 9:00, 9:30, 10:00;
        // the 10:00-10:30 slot would overrun the day end.
        let schedule = schedule_with("monday", "9:00 AM - 10:15 AM");
        let slots = generate_slots(&schedule, monday(), 30);
        assert_eq!(slots.len(), 2);
        assert_eq!(
            slots.last().unwrap().end,
            NaiveTime::from_hms_opt(10, 0, 0).unwrap()
        );
    }

    #[test]
    fn unavailable_day_yields_no_slots() {
        let schedule = schedule_with("monday", "Not Available");
        assert!(generate_slots(&schedule, monday(), 30).is_empty());
    }

    #[test]
    fn unparsable_day_yields_no_slots_but_other_days_unaffected() {
        let mut days = HashMap::new();
        days.insert("monday".to_string(), "9:00 AM - 10:00 AM".to_string());
        days.insert("tuesday".to_string(), "garbage".to_string());
        let schedule = WeeklySchedule::from_days(days);

        let tuesday = NaiveDate::from_ymd_opt(2025, 6, 3).unwrap();
        assert!(generate_slots(&schedule, tuesday, 30).is_empty());
        assert_eq!(generate_slots(&schedule, monday(), 30).len(), 2);
    }

    #[test]
    fn day_without_entry_yields_no_slots() {
        let schedule = schedule_with("monday", "9:00 AM - 5:00 PM");
        let wednesday = NaiveDate::from_ymd_opt(2025, 6, 4).unwrap();
        assert!(generate_slots(&schedule, wednesday, 30).is_empty());
    }

    #[test]
    fn zero_granularity_is_rejected() {
        let schedule = schedule_with("monday", "9:00 AM - 5:00 PM");
        assert!(generate_slots(&schedule, monday(), 0).is_empty());
    }

    #[test]
    fn range_shorter_than_granularity_yields_no_slots() {
        let schedule = schedule_with("monday", "9:00 AM - 9:15 AM");
        assert!(generate_slots(&schedule, monday(), 30).is_empty());
    }
}
