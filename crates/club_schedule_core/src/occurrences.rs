//! crates/club_schedule_core/src/occurrences.rs
//!
//! Projects a weekly slot onto concrete calendar dates.

use chrono::{Datelike, Days, NaiveDate};

use crate::domain::{ClassCancellation, ClassOccurrence, ClassSlot};

/// Lists the slot's occurrences over the `days` calendar dates starting at `today`.
///
/// The window covers `today ..= today + (days - 1)`, so a 14-day window starting
/// on a Monday yields that Monday and the next one. Dates listed in `cancellations`
/// for this slot are still returned, flagged as cancelled with the stored reason.
/// A slot whose day-of-week cannot be parsed has no occurrences.
pub fn upcoming_occurrences(
    slot: &ClassSlot,
    cancellations: &[ClassCancellation],
    today: NaiveDate,
    days: u32,
) -> Vec<ClassOccurrence> {
    let Some(weekday) = slot.weekday() else {
        return Vec::new();
    };

    let first_offset = (weekday.num_days_from_monday() + 7
        - today.weekday().num_days_from_monday())
        % 7;
    let tomorrow = today.succ_opt();

    (first_offset..days)
        .step_by(7)
        .filter_map(|offset| today.checked_add_days(Days::new(u64::from(offset))))
        .map(|date| {
            let cancellation = cancellations
                .iter()
                .find(|c| c.slot_id == slot.id && c.cancelled_date == date);

            ClassOccurrence {
                slot_id: slot.id,
                label: slot.label.clone(),
                date,
                start_time: slot.start_time,
                end_time: slot.end_time,
                weekday_short: date.format("%a").to_string(),
                weekday_long: date.format("%A").to_string(),
                display_date: date.format("%b %-d").to_string(),
                is_today: date == today,
                is_tomorrow: Some(date) == tomorrow,
                is_cancelled: cancellation.is_some(),
                cancellation_reason: cancellation.and_then(|c| c.reason.clone()),
            }
        })
        .collect()
}

/// The non-cancelled dates the slot runs on within `from ..= until`.
pub fn open_dates_between(
    slot: &ClassSlot,
    cancellations: &[ClassCancellation],
    from: NaiveDate,
    until: NaiveDate,
) -> Vec<NaiveDate> {
    if until < from {
        return Vec::new();
    }
    let days = (until - from).num_days() + 1;
    let days = u32::try_from(days).unwrap_or(u32::MAX);

    upcoming_occurrences(slot, cancellations, from, days)
        .into_iter()
        .filter(|occurrence| !occurrence.is_cancelled)
        .map(|occurrence| occurrence.date)
        .collect()
}
