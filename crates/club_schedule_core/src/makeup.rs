//! crates/club_schedule_core/src/makeup.rs
//!
//! Finds the slots a member may book as a makeup for an approved absence.

use std::cmp::Ordering;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::absence::Absence;
use crate::domain::{ClassCancellation, ClassSlot, SlotAvailability};
use crate::occurrences::open_dates_between;

/// A candidate slot together with the data needed to annotate it.
#[derive(Debug, Clone)]
pub struct SlotLoad {
    pub slot: ClassSlot,
    pub active_members: u32,
    pub cancellations: Vec<ClassCancellation>,
}

pub fn available_spots(capacity: u32, occupied: u32) -> u32 {
    capacity.saturating_sub(occupied)
}

/// Orders slots by weekday then start time. Unparseable weekdays sort last.
pub fn compare_slots(a: &ClassSlot, b: &ClassSlot) -> Ordering {
    let day = |s: &ClassSlot| s.weekday().map_or(7, |w| w.num_days_from_monday());
    day(a)
        .cmp(&day(b))
        .then(a.start_time.cmp(&b.start_time))
        .then_with(|| a.label.cmp(&b.label))
        .then(a.id.cmp(&b.id))
}

/// Keeps the active slots of `program_id` other than the absence's own slot.
///
/// Full slots stay in the list, flagged `is_full`. `available_dates` covers
/// `today ..= until`; callers pass the makeup deadline or an earlier horizon.
pub fn find_makeup_slots(
    absence: &Absence,
    program_id: Uuid,
    candidates: Vec<SlotLoad>,
    today: NaiveDate,
    until: NaiveDate,
) -> Vec<SlotAvailability> {
    let mut found: Vec<SlotAvailability> = candidates
        .into_iter()
        .filter(|c| c.slot.is_active)
        .filter(|c| c.slot.program_id == program_id)
        .filter(|c| c.slot.id != absence.slot_id)
        .map(|c| {
            let spots = available_spots(c.slot.capacity, c.active_members);
            let available_dates =
                open_dates_between(&c.slot, &c.cancellations, today, until);
            SlotAvailability {
                slot: c.slot,
                available_spots: spots,
                is_full: spots == 0,
                available_dates,
            }
        })
        .collect();

    found.sort_by(|a, b| compare_slots(&a.slot, &b.slot));
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(program_id: Uuid, day: &str, hour: u32, capacity: u32) -> ClassSlot {
        ClassSlot {
            id: Uuid::new_v4(),
            program_id,
            coach_id: None,
            day_of_week: day.to_string(),
            start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
            capacity,
            is_active: true,
            label: format!("{day} {hour}h"),
        }
    }

    fn load(slot: ClassSlot, active_members: u32) -> SlotLoad {
        SlotLoad {
            slot,
            active_members,
            cancellations: Vec::new(),
        }
    }

    #[test]
    fn filters_sorts_and_annotates() {
        let program = Uuid::new_v4();
        let origin = slot(program, "monday", 18, 10);
        let absence = Absence::report(
            Uuid::new_v4(),
            origin.id,
            date(2024, 6, 3),
            None,
            date(2024, 6, 1),
            Utc::now(),
            7,
        )
        .unwrap();

        let wed_late = slot(program, "Wednesday", 19, 10);
        let wed_early = slot(program, "wednesday", 17, 4);
        let tue = slot(program, "TUESDAY", 18, 8);
        let mut inactive = slot(program, "thursday", 18, 10);
        inactive.is_active = false;
        let other_program = slot(Uuid::new_v4(), "friday", 18, 10);

        let got = find_makeup_slots(
            &absence,
            program,
            vec![
                load(wed_late.clone(), 2),
                load(origin.clone(), 0),
                load(wed_early.clone(), 4),
                load(inactive, 0),
                load(other_program, 0),
                load(tue.clone(), 9),
            ],
            date(2024, 6, 3),
            absence.makeup_deadline(),
        );

        let ids: Vec<_> = got.iter().map(|a| a.slot.id).collect();
        assert_eq!(ids, vec![tue.id, wed_early.id, wed_late.id]);

        assert_eq!(got[0].available_spots, 0);
        assert!(got[0].is_full);
        assert_eq!(got[1].available_spots, 0);
        assert_eq!(got[2].available_spots, 8);
        assert!(!got[2].is_full);

        // Deadline is 2024-06-10, so one Tuesday and one Wednesday fit.
        assert_eq!(got[0].available_dates, vec![date(2024, 6, 4)]);
        assert_eq!(got[2].available_dates, vec![date(2024, 6, 5)]);
    }

    #[test]
    fn available_dates_end_at_the_given_limit() {
        let program = Uuid::new_v4();
        let origin = slot(program, "monday", 18, 10);
        let absence = Absence::report(
            Uuid::new_v4(),
            origin.id,
            date(2024, 6, 3),
            None,
            date(2024, 6, 1),
            Utc::now(),
            30,
        )
        .unwrap();
        let tue = slot(program, "tuesday", 18, 10);

        let got = find_makeup_slots(
            &absence,
            program,
            vec![load(tue, 0)],
            date(2024, 6, 1),
            date(2024, 6, 12),
        );
        assert_eq!(got[0].available_dates, vec![date(2024, 6, 4), date(2024, 6, 11)]);
    }

    #[test]
    fn spots_never_underflow() {
        assert_eq!(available_spots(5, 7), 0);
        assert_eq!(available_spots(5, 2), 3);
    }
}
