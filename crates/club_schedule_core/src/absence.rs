//! crates/club_schedule_core/src/absence.rs
//!
//! The absence record and its lifecycle.
//!
//! ```text
//! pending ──approve──▶ approved ──select_makeup──▶ makeup_selected ──complete──▶ completed
//!    │                    │
//!    └──reject──▶ rejected └──expire──▶ expired
//! ```
//!
//! Every edge is a method on [`Absence`]; the state itself is private so no caller
//! can move an absence along an edge that is not drawn above.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Days, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::{ScheduleError, ScheduleResult};

//=========================================================================================
// Status
//=========================================================================================

/// The flat status name, as stored and displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbsenceStatus {
    Pending,
    Approved,
    Rejected,
    MakeupSelected,
    Completed,
    Expired,
}

impl AbsenceStatus {
    pub const ALL: [AbsenceStatus; 6] = [
        AbsenceStatus::Pending,
        AbsenceStatus::Approved,
        AbsenceStatus::Rejected,
        AbsenceStatus::MakeupSelected,
        AbsenceStatus::Completed,
        AbsenceStatus::Expired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AbsenceStatus::Pending => "pending",
            AbsenceStatus::Approved => "approved",
            AbsenceStatus::Rejected => "rejected",
            AbsenceStatus::MakeupSelected => "makeup_selected",
            AbsenceStatus::Completed => "completed",
            AbsenceStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AbsenceStatus::Rejected | AbsenceStatus::Completed | AbsenceStatus::Expired
        )
    }

    /// Whether an absence in this status counts toward the monthly makeup cap.
    pub fn uses_makeup(&self) -> bool {
        matches!(self, AbsenceStatus::MakeupSelected | AbsenceStatus::Completed)
    }
}

impl fmt::Display for AbsenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AbsenceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AbsenceStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown absence status '{}'", s))
    }
}

//=========================================================================================
// State
//=========================================================================================

/// The makeup occurrence a member booked in place of the missed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Makeup {
    pub slot_id: Uuid,
    pub date: NaiveDate,
}

/// The lifecycle state. A makeup exists exactly in the states that need one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbsenceState {
    Pending,
    Approved,
    Rejected,
    MakeupSelected(Makeup),
    Completed(Makeup),
    Expired,
}

impl AbsenceState {
    pub fn status(&self) -> AbsenceStatus {
        match self {
            AbsenceState::Pending => AbsenceStatus::Pending,
            AbsenceState::Approved => AbsenceStatus::Approved,
            AbsenceState::Rejected => AbsenceStatus::Rejected,
            AbsenceState::MakeupSelected(_) => AbsenceStatus::MakeupSelected,
            AbsenceState::Completed(_) => AbsenceStatus::Completed,
            AbsenceState::Expired => AbsenceStatus::Expired,
        }
    }

    pub fn makeup(&self) -> Option<Makeup> {
        match self {
            AbsenceState::MakeupSelected(m) | AbsenceState::Completed(m) => Some(*m),
            _ => None,
        }
    }

    /// Rebuilds the state from its stored columns.
    pub fn from_parts(status: AbsenceStatus, makeup: Option<Makeup>) -> Result<Self, String> {
        match (status, makeup) {
            (AbsenceStatus::Pending, None) => Ok(AbsenceState::Pending),
            (AbsenceStatus::Approved, None) => Ok(AbsenceState::Approved),
            (AbsenceStatus::Rejected, None) => Ok(AbsenceState::Rejected),
            (AbsenceStatus::Expired, None) => Ok(AbsenceState::Expired),
            (AbsenceStatus::MakeupSelected, Some(m)) => Ok(AbsenceState::MakeupSelected(m)),
            (AbsenceStatus::Completed, Some(m)) => Ok(AbsenceState::Completed(m)),
            (status, Some(_)) => Err(format!("a {} absence cannot carry a makeup", status)),
            (status, None) => Err(format!("a {} absence must carry a makeup", status)),
        }
    }
}

//=========================================================================================
// Absence
//=========================================================================================

/// A member's record of missing one class occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absence {
    pub id: Uuid,
    pub member_id: Uuid,
    pub slot_id: Uuid,
    pub absent_date: NaiveDate,
    pub reason: Option<String>,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    makeup_deadline: NaiveDate,
    state: AbsenceState,
}

impl Absence {
    /// Creates a new `pending` absence. The date may not lie in the past.
    ///
    /// The makeup deadline is fixed here, `window_days` after the absent date,
    /// and is never recomputed, not even on approval.
    pub fn report(
        member_id: Uuid,
        slot_id: Uuid,
        absent_date: NaiveDate,
        reason: Option<String>,
        today: NaiveDate,
        now: DateTime<Utc>,
        window_days: u32,
    ) -> ScheduleResult<Self> {
        if absent_date < today {
            return Err(ScheduleError::Validation(format!(
                "cannot report an absence for {} because it is in the past",
                absent_date
            )));
        }
        let makeup_deadline = absent_date
            .checked_add_days(Days::new(u64::from(window_days)))
            .ok_or_else(|| ScheduleError::Validation("absent date is out of range".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            member_id,
            slot_id,
            absent_date,
            reason,
            admin_notes: None,
            created_at: now,
            updated_at: now,
            makeup_deadline,
            state: AbsenceState::Pending,
        })
    }

    /// Rebuilds an absence from storage.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: Uuid,
        member_id: Uuid,
        slot_id: Uuid,
        absent_date: NaiveDate,
        reason: Option<String>,
        admin_notes: Option<String>,
        makeup_deadline: NaiveDate,
        state: AbsenceState,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            member_id,
            slot_id,
            absent_date,
            reason,
            admin_notes,
            created_at,
            updated_at,
            makeup_deadline,
            state,
        }
    }

    pub fn state(&self) -> AbsenceState {
        self.state
    }

    pub fn status(&self) -> AbsenceStatus {
        self.state.status()
    }

    pub fn makeup(&self) -> Option<Makeup> {
        self.state.makeup()
    }

    pub fn makeup_deadline(&self) -> NaiveDate {
        self.makeup_deadline
    }

    pub fn ensure_owned_by(&self, member_id: Uuid) -> ScheduleResult<()> {
        if self.member_id == member_id {
            Ok(())
        } else {
            Err(ScheduleError::NotAuthorized(
                "this absence belongs to another member".to_string(),
            ))
        }
    }

    /// True once the deadline has passed while the absence still awaits a makeup.
    pub fn is_deadline_expired(&self, today: NaiveDate) -> bool {
        today > self.makeup_deadline && self.state == AbsenceState::Approved
    }

    /// Whole days until the deadline, never negative. `None` in terminal states.
    pub fn days_left_for_makeup(&self, today: NaiveDate) -> Option<i64> {
        if self.status().is_terminal() {
            return None;
        }
        Some((self.makeup_deadline - today).num_days().max(0))
    }

    // --- Transitions ---

    pub fn approve(&mut self, notes: Option<String>, now: DateTime<Utc>) -> ScheduleResult<()> {
        self.review(AbsenceState::Approved, "approve", notes, now)
    }

    pub fn reject(&mut self, notes: Option<String>, now: DateTime<Utc>) -> ScheduleResult<()> {
        self.review(AbsenceState::Rejected, "reject", notes, now)
    }

    fn review(
        &mut self,
        next: AbsenceState,
        action: &'static str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> ScheduleResult<()> {
        if self.state != AbsenceState::Pending {
            return Err(self.invalid(action));
        }
        self.state = next;
        if notes.is_some() {
            self.admin_notes = notes;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Books the makeup. A passed deadline is reported before any status problem.
    pub fn select_makeup(
        &mut self,
        makeup: Makeup,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> ScheduleResult<()> {
        self.ensure_makeup_window_open(today)?;
        if self.state != AbsenceState::Approved {
            return Err(self.invalid("select a makeup for"));
        }
        self.state = AbsenceState::MakeupSelected(makeup);
        self.updated_at = now;
        Ok(())
    }

    /// Fails with `DeadlineExpired` once the window is closed, including after a sweep.
    pub fn ensure_makeup_window_open(&self, today: NaiveDate) -> ScheduleResult<()> {
        if today > self.makeup_deadline || self.state == AbsenceState::Expired {
            return Err(ScheduleError::DeadlineExpired {
                deadline: self.makeup_deadline,
            });
        }
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> ScheduleResult<()> {
        let AbsenceState::MakeupSelected(makeup) = self.state else {
            return Err(self.invalid("complete"));
        };
        self.state = AbsenceState::Completed(makeup);
        self.updated_at = now;
        Ok(())
    }

    pub fn expire(&mut self, today: NaiveDate, now: DateTime<Utc>) -> ScheduleResult<()> {
        if !self.is_deadline_expired(today) {
            return Err(self.invalid("expire"));
        }
        self.state = AbsenceState::Expired;
        self.updated_at = now;
        Ok(())
    }

    fn invalid(&self, action: &'static str) -> ScheduleError {
        ScheduleError::InvalidState {
            status: self.status(),
            action,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn reported(on: NaiveDate) -> Absence {
        Absence::report(Uuid::new_v4(), Uuid::new_v4(), on, None, on, Utc::now(), 7).unwrap()
    }

    fn makeup(on: NaiveDate) -> Makeup {
        Makeup {
            slot_id: Uuid::new_v4(),
            date: on,
        }
    }

    #[test]
    fn deadline_is_seven_days_after_absent_date() {
        let a = reported(date(2024, 6, 1));
        assert_eq!(a.status(), AbsenceStatus::Pending);
        assert_eq!(a.makeup_deadline(), date(2024, 6, 8));
    }

    #[test]
    fn past_dates_are_rejected_and_today_is_fine() {
        let today = date(2024, 6, 10);
        let past = Absence::report(
            Uuid::new_v4(),
            Uuid::new_v4(),
            date(2024, 6, 9),
            None,
            today,
            Utc::now(),
            7,
        );
        assert!(matches!(past, Err(ScheduleError::Validation(_))));

        let same_day =
            Absence::report(Uuid::new_v4(), Uuid::new_v4(), today, None, today, Utc::now(), 7);
        assert!(same_day.is_ok());
    }

    #[test]
    fn approve_then_select_then_complete() {
        let mut a = reported(date(2024, 6, 1));
        let original_deadline = a.makeup_deadline();
        a.approve(Some("ok".to_string()), Utc::now()).unwrap();
        assert_eq!(a.status(), AbsenceStatus::Approved);
        assert_eq!(a.admin_notes.as_deref(), Some("ok"));

        let m = makeup(date(2024, 6, 5));
        a.select_makeup(m, date(2024, 6, 7), Utc::now()).unwrap();
        assert_eq!(a.state(), AbsenceState::MakeupSelected(m));

        a.complete(Utc::now()).unwrap();
        assert_eq!(a.state(), AbsenceState::Completed(m));
        assert_eq!(a.makeup(), Some(m));
        assert_eq!(a.makeup_deadline(), original_deadline);
        assert_eq!(a.days_left_for_makeup(date(2024, 6, 7)), None);
    }

    #[test]
    fn rejected_is_final() {
        let mut a = reported(date(2024, 6, 1));
        a.reject(None, Utc::now()).unwrap();
        assert!(matches!(
            a.approve(None, Utc::now()),
            Err(ScheduleError::InvalidState {
                status: AbsenceStatus::Rejected,
                ..
            })
        ));
        assert!(a.complete(Utc::now()).is_err());
    }

    #[test]
    fn select_on_day_after_deadline_fails() {
        let mut a = reported(date(2024, 6, 1));
        a.approve(None, Utc::now()).unwrap();

        let err = a
            .select_makeup(makeup(date(2024, 6, 10)), date(2024, 6, 9), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DeadlineExpired { deadline } if deadline == date(2024, 6, 8)));
        assert_eq!(a.status(), AbsenceStatus::Approved);
    }

    #[test]
    fn passed_deadline_wins_over_status() {
        let mut a = reported(date(2024, 6, 1));
        let err = a
            .select_makeup(makeup(date(2024, 6, 10)), date(2024, 6, 9), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DeadlineExpired { .. }));

        let err = a
            .select_makeup(makeup(date(2024, 6, 3)), date(2024, 6, 2), Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            ScheduleError::InvalidState {
                status: AbsenceStatus::Pending,
                ..
            }
        ));
    }

    #[test]
    fn expire_only_from_approved_after_deadline() {
        let mut pending = reported(date(2024, 6, 1));
        assert!(pending.expire(date(2024, 6, 20), Utc::now()).is_err());

        let mut a = reported(date(2024, 6, 1));
        a.approve(None, Utc::now()).unwrap();
        assert!(!a.is_deadline_expired(date(2024, 6, 8)));
        assert!(a.expire(date(2024, 6, 8), Utc::now()).is_err());

        assert!(a.is_deadline_expired(date(2024, 6, 9)));
        a.expire(date(2024, 6, 9), Utc::now()).unwrap();
        assert_eq!(a.status(), AbsenceStatus::Expired);
        assert!(!a.is_deadline_expired(date(2024, 6, 9)));

        let err = a
            .select_makeup(makeup(date(2024, 6, 3)), date(2024, 6, 5), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ScheduleError::DeadlineExpired { .. }));
    }

    #[test]
    fn days_left_floors_at_zero() {
        let mut a = reported(date(2024, 6, 1));
        assert_eq!(a.days_left_for_makeup(date(2024, 6, 1)), Some(7));
        assert_eq!(a.days_left_for_makeup(date(2024, 6, 8)), Some(0));
        assert_eq!(a.days_left_for_makeup(date(2024, 6, 30)), Some(0));

        a.reject(None, Utc::now()).unwrap();
        assert_eq!(a.days_left_for_makeup(date(2024, 6, 1)), None);
    }

    #[test]
    fn status_names_round_trip_and_state_parts_are_checked() {
        for status in AbsenceStatus::ALL {
            assert_eq!(status.as_str().parse::<AbsenceStatus>().unwrap(), status);
        }
        assert!("archived".parse::<AbsenceStatus>().is_err());

        assert!(AbsenceState::from_parts(AbsenceStatus::Completed, None).is_err());
        assert!(
            AbsenceState::from_parts(AbsenceStatus::Approved, Some(makeup(date(2024, 6, 3))))
                .is_err()
        );
    }
}
