//! crates/club_schedule_core/src/service.rs
//!
//! The scheduling use cases, composed over the storage and clock ports.
//!
//! Each method runs one member- or admin-initiated operation end to end. Absence
//! writes go through `DatabaseService::update_absence`, which only succeeds if the
//! stored status is still the one this operation read. Whichever of two racing
//! writers lands first wins; the other observes the new status and fails cleanly.

use std::sync::Arc;

use chrono::{Datelike, Days, Months, NaiveDate};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::absence::{Absence, AbsenceStatus, Makeup};
use crate::clock::Clock;
use crate::domain::{
    Actor, AssignmentStatus, ClassCancellation, ClassOccurrence, ClassSlot, MemberClassAssignment,
    NewClassSlot, SlotAvailability,
};
use crate::error::{ScheduleError, ScheduleResult};
use crate::makeup::{available_spots, find_makeup_slots, SlotLoad};
use crate::occurrences::upcoming_occurrences;
use crate::policy::SchedulePolicy;
use crate::ports::DatabaseService;

#[derive(Clone)]
pub struct ScheduleService {
    db: Arc<dyn DatabaseService>,
    clock: Arc<dyn Clock>,
    policy: SchedulePolicy,
}

impl ScheduleService {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>, policy: SchedulePolicy) -> Self {
        Self { db, clock, policy }
    }

    pub fn policy(&self) -> &SchedulePolicy {
        &self.policy
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    //=====================================================================================
    // Calendar
    //=====================================================================================

    pub async fn list_upcoming_occurrences(
        &self,
        slot_id: Uuid,
        days: u32,
    ) -> ScheduleResult<Vec<ClassOccurrence>> {
        self.check_window(days)?;
        let slot = self.db.get_slot(slot_id).await?;
        let cancellations = self.db.list_cancellations(slot_id).await?;
        Ok(upcoming_occurrences(&slot, &cancellations, self.clock.today(), days))
    }

    /// Occurrences of every slot the member is actively assigned to, by date then start time.
    pub async fn member_calendar(
        &self,
        actor: &Actor,
        days: u32,
    ) -> ScheduleResult<Vec<ClassOccurrence>> {
        self.check_window(days)?;
        let today = self.clock.today();
        let mut calendar = Vec::new();

        for assignment in self.db.list_assignments_for_member(actor.member_id).await? {
            if !assignment.is_active() {
                continue;
            }
            let slot = self.db.get_slot(assignment.slot_id).await?;
            if !slot.is_active {
                continue;
            }
            let cancellations = self.db.list_cancellations(slot.id).await?;
            calendar.extend(upcoming_occurrences(&slot, &cancellations, today, days));
        }

        calendar.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then(a.start_time.cmp(&b.start_time))
                .then(a.slot_id.cmp(&b.slot_id))
        });
        Ok(calendar)
    }

    /// The last date anything is scheduled or listed for, counted from `today`.
    fn horizon(&self, today: NaiveDate) -> NaiveDate {
        today
            .checked_add_days(Days::new(u64::from(self.policy.max_occurrence_window_days)))
            .unwrap_or(NaiveDate::MAX)
    }

    fn check_window(&self, days: u32) -> ScheduleResult<()> {
        let max = self.policy.max_occurrence_window_days;
        if days == 0 || days > max {
            return Err(ScheduleError::Validation(format!(
                "days must be between 1 and {}",
                max
            )));
        }
        Ok(())
    }

    //=====================================================================================
    // Member Absence Flow
    //=====================================================================================

    pub async fn report_absence(
        &self,
        actor: &Actor,
        slot_id: Uuid,
        absent_date: NaiveDate,
        reason: Option<String>,
    ) -> ScheduleResult<Absence> {
        let today = self.clock.today();
        let reason = self.clean_reason(reason)?;

        let slot = self.db.get_slot(slot_id).await?;
        if !slot.is_active {
            return Err(ScheduleError::Validation(format!(
                "class '{}' is no longer running",
                slot.label
            )));
        }

        let enrolled = self
            .db
            .find_assignment(actor.member_id, slot_id)
            .await?
            .is_some_and(|a| a.is_active());
        if !enrolled {
            return Err(ScheduleError::Validation(format!(
                "you are not enrolled in '{}'",
                slot.label
            )));
        }

        let horizon = self.horizon(today);
        if absent_date > horizon {
            return Err(ScheduleError::Validation(format!(
                "absences can be reported at most {} days ahead (until {})",
                self.policy.max_occurrence_window_days, horizon
            )));
        }

        let absence = Absence::report(
            actor.member_id,
            slot_id,
            absent_date,
            reason,
            today,
            self.clock.now(),
            self.policy.makeup_window_days,
        )?;

        if !slot.runs_on(absent_date) {
            return Err(ScheduleError::Validation(format!(
                "'{}' does not run on {}",
                slot.label, absent_date
            )));
        }
        let cancellations = self.db.list_cancellations(slot_id).await?;
        if cancellations.iter().any(|c| c.cancelled_date == absent_date) {
            return Err(ScheduleError::Validation(format!(
                "'{}' is cancelled on {}",
                slot.label, absent_date
            )));
        }
        if self
            .db
            .find_absence_for_occurrence(actor.member_id, slot_id, absent_date)
            .await?
            .is_some()
        {
            return Err(ScheduleError::Validation(format!(
                "an absence for {} has already been reported",
                absent_date
            )));
        }

        self.db.insert_absence(&absence).await?;
        info!(
            absence_id = %absence.id,
            member_id = %actor.member_id,
            %slot_id,
            %absent_date,
            "Absence reported"
        );
        Ok(absence)
    }

    fn clean_reason(&self, reason: Option<String>) -> ScheduleResult<Option<String>> {
        let Some(reason) = reason else {
            return Ok(None);
        };
        let reason = reason.trim();
        if reason.is_empty() {
            return Ok(None);
        }
        if reason.chars().count() > self.policy.max_reason_len {
            return Err(ScheduleError::Validation(format!(
                "reason must be at most {} characters",
                self.policy.max_reason_len
            )));
        }
        Ok(Some(reason.to_string()))
    }

    pub async fn list_absences(&self, actor: &Actor) -> ScheduleResult<Vec<Absence>> {
        Ok(self.db.list_absences_for_member(actor.member_id).await?)
    }

    pub async fn list_makeup_slots(
        &self,
        actor: &Actor,
        absence_id: Uuid,
    ) -> ScheduleResult<Vec<SlotAvailability>> {
        let today = self.clock.today();
        let absence = self.db.get_absence(absence_id).await?;
        absence.ensure_owned_by(actor.member_id)?;
        absence.ensure_makeup_window_open(today)?;
        if absence.status() != AbsenceStatus::Approved {
            return Err(ScheduleError::InvalidState {
                status: absence.status(),
                action: "list makeup classes for",
            });
        }

        let origin = self.db.get_slot(absence.slot_id).await?;
        let mut candidates = Vec::new();
        for slot in self.db.list_active_slots_for_program(origin.program_id).await? {
            let active_members = self.db.count_active_assignments(slot.id).await?;
            let cancellations = self.db.list_cancellations(slot.id).await?;
            candidates.push(SlotLoad {
                slot,
                active_members,
                cancellations,
            });
        }

        let until = absence.makeup_deadline().min(self.horizon(today));
        let found = find_makeup_slots(&absence, origin.program_id, candidates, today, until);
        debug!(%absence_id, count = found.len(), "Makeup slots listed");
        Ok(found)
    }

    /// Books a makeup class for an approved absence.
    ///
    /// Checks, in order: ownership, the deadline, the status, the monthly cap, the
    /// chosen slot and date, and finally capacity on that date.
    pub async fn select_makeup(
        &self,
        actor: &Actor,
        absence_id: Uuid,
        makeup_slot_id: Uuid,
        makeup_date: NaiveDate,
    ) -> ScheduleResult<Absence> {
        let today = self.clock.today();
        let mut absence = self.db.get_absence(absence_id).await?;
        absence.ensure_owned_by(actor.member_id)?;
        absence.ensure_makeup_window_open(today)?;
        if absence.status() != AbsenceStatus::Approved {
            return Err(ScheduleError::InvalidState {
                status: absence.status(),
                action: "select a makeup for",
            });
        }

        let (month_start, next_month) = month_bounds(absence.absent_date)?;
        let used = self
            .db
            .count_used_makeups(actor.member_id, month_start, next_month)
            .await?;
        if used >= self.policy.max_makeups_per_month {
            warn!(%absence_id, member_id = %actor.member_id, used, "Monthly makeup cap reached");
            return Err(ScheduleError::MonthlyCapExceeded {
                limit: self.policy.max_makeups_per_month,
            });
        }

        let origin = self.db.get_slot(absence.slot_id).await?;
        let slot = self.db.get_slot(makeup_slot_id).await?;
        self.check_makeup_choice(&absence, &origin, &slot, makeup_date, today)
            .await?;

        let occupied = self.db.count_active_assignments(slot.id).await?
            + self.db.count_makeups_booked(slot.id, makeup_date).await?;
        if available_spots(slot.capacity, occupied) == 0 {
            warn!(%absence_id, slot_id = %slot.id, %makeup_date, "Makeup class is full");
            return Err(ScheduleError::CapacityExceeded {
                slot_id: slot.id,
                date: makeup_date,
            });
        }

        absence.select_makeup(
            Makeup {
                slot_id: slot.id,
                date: makeup_date,
            },
            today,
            self.clock.now(),
        )?;
        self.commit(&absence, AbsenceStatus::Approved, "select a makeup for")
            .await?;

        info!(%absence_id, slot_id = %slot.id, %makeup_date, "Makeup selected");
        Ok(absence)
    }

    async fn check_makeup_choice(
        &self,
        absence: &Absence,
        origin: &ClassSlot,
        slot: &ClassSlot,
        date: NaiveDate,
        today: NaiveDate,
    ) -> ScheduleResult<()> {
        if !slot.is_active || slot.program_id != origin.program_id {
            return Err(ScheduleError::Validation(format!(
                "'{}' is not available as a makeup for this class",
                slot.label
            )));
        }
        if slot.id == origin.id {
            return Err(ScheduleError::Validation(
                "a makeup must be a different class from the one missed".to_string(),
            ));
        }
        if !slot.runs_on(date) {
            return Err(ScheduleError::Validation(format!(
                "'{}' does not run on {}",
                slot.label, date
            )));
        }
        if date < today || date > absence.makeup_deadline() {
            return Err(ScheduleError::Validation(format!(
                "makeup date must be between {} and {}",
                today,
                absence.makeup_deadline()
            )));
        }
        let cancellations = self.db.list_cancellations(slot.id).await?;
        if cancellations.iter().any(|c| c.cancelled_date == date) {
            return Err(ScheduleError::Validation(format!(
                "'{}' is cancelled on {}",
                slot.label, date
            )));
        }
        Ok(())
    }

    /// Writes the absence, failing if its status moved since it was read.
    async fn commit(
        &self,
        absence: &Absence,
        expected: AbsenceStatus,
        action: &'static str,
    ) -> ScheduleResult<()> {
        if self.db.update_absence(absence, expected).await? {
            return Ok(());
        }

        let current = self.db.get_absence(absence.id).await?;
        warn!(
            absence_id = %absence.id,
            status = %current.status(),
            "Absence changed concurrently"
        );
        if current.status() == AbsenceStatus::Expired {
            return Err(ScheduleError::DeadlineExpired {
                deadline: current.makeup_deadline(),
            });
        }
        Err(ScheduleError::InvalidState {
            status: current.status(),
            action,
        })
    }

    //=====================================================================================
    // Admin Absence Flow
    //=====================================================================================

    pub async fn list_pending_absences(&self, actor: &Actor) -> ScheduleResult<Vec<Absence>> {
        actor.require_admin()?;
        Ok(self.db.list_absences_by_status(AbsenceStatus::Pending).await?)
    }

    pub async fn approve_absence(
        &self,
        actor: &Actor,
        absence_id: Uuid,
        notes: Option<String>,
    ) -> ScheduleResult<Absence> {
        actor.require_admin()?;
        let mut absence = self.db.get_absence(absence_id).await?;
        absence.approve(notes, self.clock.now())?;
        self.commit(&absence, AbsenceStatus::Pending, "approve").await?;
        info!(%absence_id, admin_id = %actor.member_id, "Absence approved");
        Ok(absence)
    }

    pub async fn reject_absence(
        &self,
        actor: &Actor,
        absence_id: Uuid,
        notes: Option<String>,
    ) -> ScheduleResult<Absence> {
        actor.require_admin()?;
        let mut absence = self.db.get_absence(absence_id).await?;
        absence.reject(notes, self.clock.now())?;
        self.commit(&absence, AbsenceStatus::Pending, "reject").await?;
        info!(%absence_id, admin_id = %actor.member_id, "Absence rejected");
        Ok(absence)
    }

    /// Called by attendance marking when the member checks into their makeup class.
    pub async fn complete_makeup(&self, absence_id: Uuid) -> ScheduleResult<Absence> {
        let mut absence = self.db.get_absence(absence_id).await?;
        absence.complete(self.clock.now())?;
        self.commit(&absence, AbsenceStatus::MakeupSelected, "complete")
            .await?;
        info!(%absence_id, "Makeup completed");
        Ok(absence)
    }

    //=====================================================================================
    // Deadline Expiry Sweeper
    //=====================================================================================

    /// Expires every approved absence whose makeup deadline has passed.
    ///
    /// Returns how many records changed. Running it again right away returns 0.
    /// A record whose write fails is logged and left for the next sweep.
    pub async fn sweep_expired_deadlines(&self) -> ScheduleResult<u64> {
        let today = self.clock.today();
        let now = self.clock.now();
        let mut expired = 0u64;
        let mut failed = 0u64;

        for mut absence in self.db.list_absences_by_status(AbsenceStatus::Approved).await? {
            if !absence.is_deadline_expired(today) {
                continue;
            }
            if let Err(e) = absence.expire(today, now) {
                warn!(absence_id = %absence.id, "Skipping absence that cannot expire: {}", e);
                failed += 1;
                continue;
            }
            match self.db.update_absence(&absence, AbsenceStatus::Approved).await {
                Ok(true) => expired += 1,
                Ok(false) => {
                    debug!(absence_id = %absence.id, "Absence left approved state before it could expire");
                }
                Err(e) => {
                    error!(absence_id = %absence.id, "Failed to expire absence: {}", e);
                    failed += 1;
                }
            }
        }

        info!(expired, failed, %today, "Makeup deadline sweep finished");
        Ok(expired)
    }

    //=====================================================================================
    // Admin Slot Management
    //=====================================================================================

    pub async fn create_slot(&self, actor: &Actor, new_slot: NewClassSlot) -> ScheduleResult<ClassSlot> {
        actor.require_admin()?;
        let slot = new_slot.into_slot();
        slot.validate()?;
        self.db.save_slot(&slot).await?;
        info!(slot_id = %slot.id, label = %slot.label, "Class slot created");
        Ok(slot)
    }

    /// Slots referenced by history are deactivated, never deleted.
    pub async fn deactivate_slot(&self, actor: &Actor, slot_id: Uuid) -> ScheduleResult<ClassSlot> {
        actor.require_admin()?;
        let mut slot = self.db.get_slot(slot_id).await?;
        slot.is_active = false;
        self.db.save_slot(&slot).await?;
        info!(%slot_id, "Class slot deactivated");
        Ok(slot)
    }

    pub async fn cancel_occurrence(
        &self,
        actor: &Actor,
        slot_id: Uuid,
        date: NaiveDate,
        reason: Option<String>,
    ) -> ScheduleResult<ClassCancellation> {
        actor.require_admin()?;
        let slot = self.db.get_slot(slot_id).await?;
        if !slot.runs_on(date) {
            return Err(ScheduleError::Validation(format!(
                "'{}' does not run on {}",
                slot.label, date
            )));
        }
        let existing = self.db.list_cancellations(slot_id).await?;
        if existing.iter().any(|c| c.cancelled_date == date) {
            return Err(ScheduleError::Validation(format!(
                "'{}' is already cancelled on {}",
                slot.label, date
            )));
        }

        let cancellation = ClassCancellation {
            id: Uuid::new_v4(),
            slot_id,
            cancelled_date: date,
            reason: reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
        };
        self.db.save_cancellation(&cancellation).await?;
        info!(%slot_id, %date, "Class occurrence cancelled");
        Ok(cancellation)
    }

    /// Enrols a member in a slot, reactivating an earlier assignment if one exists.
    pub async fn assign_member(
        &self,
        actor: &Actor,
        slot_id: Uuid,
        member_id: Uuid,
    ) -> ScheduleResult<MemberClassAssignment> {
        actor.require_admin()?;
        let slot = self.db.get_slot(slot_id).await?;
        if !slot.is_active {
            return Err(ScheduleError::Validation(format!(
                "class '{}' is no longer running",
                slot.label
            )));
        }

        let assignment = match self.db.find_assignment(member_id, slot_id).await? {
            Some(existing) => MemberClassAssignment {
                status: AssignmentStatus::Active,
                ..existing
            },
            None => MemberClassAssignment {
                id: Uuid::new_v4(),
                member_id,
                slot_id,
                status: AssignmentStatus::Active,
            },
        };
        self.db.save_assignment(&assignment).await?;
        info!(%slot_id, %member_id, "Member assigned to class");
        Ok(assignment)
    }

    pub async fn unassign_member(
        &self,
        actor: &Actor,
        slot_id: Uuid,
        member_id: Uuid,
    ) -> ScheduleResult<MemberClassAssignment> {
        actor.require_admin()?;
        let existing = self
            .db
            .find_assignment(member_id, slot_id)
            .await?
            .ok_or_else(|| {
                ScheduleError::NotFound(format!(
                    "member {} is not assigned to class {}",
                    member_id, slot_id
                ))
            })?;
        let assignment = MemberClassAssignment {
            status: AssignmentStatus::Inactive,
            ..existing
        };
        self.db.save_assignment(&assignment).await?;
        info!(%slot_id, %member_id, "Member unassigned from class");
        Ok(assignment)
    }
}

/// The first day of `date`'s month and the first day of the following month.
fn month_bounds(date: NaiveDate) -> ScheduleResult<(NaiveDate, NaiveDate)> {
    let start = date
        .with_day(1)
        .ok_or_else(|| ScheduleError::Validation(format!("invalid date {}", date)))?;
    let next = start
        .checked_add_months(Months::new(1))
        .ok_or_else(|| ScheduleError::Validation(format!("date {} is out of range", date)))?;
    Ok((start, next))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn month_bounds_cover_december() {
        let d = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
        let (start, next) = month_bounds(d).unwrap();
        assert_eq!(start, NaiveDate::from_ymd_opt(2024, 12, 1).unwrap());
        assert_eq!(next, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    }
}
