//! crates/club_schedule_core/src/memory.rs
//!
//! An in-process implementation of the `DatabaseService` port.
//! Used by the test suites and for running the service without PostgreSQL.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::absence::{Absence, AbsenceStatus};
use crate::domain::{ClassCancellation, ClassSlot, MemberClassAssignment};
use crate::ports::{DatabaseService, PortError, PortResult};

#[derive(Default)]
struct Tables {
    slots: HashMap<Uuid, ClassSlot>,
    cancellations: Vec<ClassCancellation>,
    assignments: HashMap<Uuid, MemberClassAssignment>,
    absences: HashMap<Uuid, Absence>,
}

#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> PortResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| PortError::Unexpected("in-memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl DatabaseService for InMemoryStore {
    async fn get_slot(&self, slot_id: Uuid) -> PortResult<ClassSlot> {
        self.tables()?
            .slots
            .get(&slot_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Class slot {} not found", slot_id)))
    }

    async fn list_active_slots_for_program(&self, program_id: Uuid) -> PortResult<Vec<ClassSlot>> {
        Ok(self
            .tables()?
            .slots
            .values()
            .filter(|s| s.program_id == program_id && s.is_active)
            .cloned()
            .collect())
    }

    async fn save_slot(&self, slot: &ClassSlot) -> PortResult<()> {
        self.tables()?.slots.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn list_cancellations(&self, slot_id: Uuid) -> PortResult<Vec<ClassCancellation>> {
        let mut found: Vec<_> = self
            .tables()?
            .cancellations
            .iter()
            .filter(|c| c.slot_id == slot_id)
            .cloned()
            .collect();
        found.sort_by_key(|c| c.cancelled_date);
        Ok(found)
    }

    async fn save_cancellation(&self, cancellation: &ClassCancellation) -> PortResult<()> {
        let mut tables = self.tables()?;
        let duplicate = tables.cancellations.iter().any(|c| {
            c.slot_id == cancellation.slot_id && c.cancelled_date == cancellation.cancelled_date
        });
        if duplicate {
            return Err(PortError::Conflict(format!(
                "slot {} is already cancelled on {}",
                cancellation.slot_id, cancellation.cancelled_date
            )));
        }
        tables.cancellations.push(cancellation.clone());
        Ok(())
    }

    async fn list_assignments_for_member(
        &self,
        member_id: Uuid,
    ) -> PortResult<Vec<MemberClassAssignment>> {
        Ok(self
            .tables()?
            .assignments
            .values()
            .filter(|a| a.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn find_assignment(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
    ) -> PortResult<Option<MemberClassAssignment>> {
        Ok(self
            .tables()?
            .assignments
            .values()
            .find(|a| a.member_id == member_id && a.slot_id == slot_id)
            .cloned())
    }

    async fn save_assignment(&self, assignment: &MemberClassAssignment) -> PortResult<()> {
        self.tables()?
            .assignments
            .insert(assignment.id, assignment.clone());
        Ok(())
    }

    async fn count_active_assignments(&self, slot_id: Uuid) -> PortResult<u32> {
        let count = self
            .tables()?
            .assignments
            .values()
            .filter(|a| a.slot_id == slot_id && a.is_active())
            .count();
        Ok(count as u32)
    }

    async fn insert_absence(&self, absence: &Absence) -> PortResult<()> {
        let mut tables = self.tables()?;
        let duplicate = tables.absences.values().any(|a| {
            a.member_id == absence.member_id
                && a.slot_id == absence.slot_id
                && a.absent_date == absence.absent_date
        });
        if duplicate {
            return Err(PortError::Conflict(format!(
                "an absence for {} has already been reported",
                absence.absent_date
            )));
        }
        tables.absences.insert(absence.id, absence.clone());
        Ok(())
    }

    async fn get_absence(&self, absence_id: Uuid) -> PortResult<Absence> {
        self.tables()?
            .absences
            .get(&absence_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("Absence {} not found", absence_id)))
    }

    async fn find_absence_for_occurrence(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
        absent_date: NaiveDate,
    ) -> PortResult<Option<Absence>> {
        Ok(self
            .tables()?
            .absences
            .values()
            .find(|a| a.member_id == member_id && a.slot_id == slot_id && a.absent_date == absent_date)
            .cloned())
    }

    async fn list_absences_for_member(&self, member_id: Uuid) -> PortResult<Vec<Absence>> {
        let mut found: Vec<_> = self
            .tables()?
            .absences
            .values()
            .filter(|a| a.member_id == member_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| {
            b.absent_date
                .cmp(&a.absent_date)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(found)
    }

    async fn list_absences_by_status(&self, status: AbsenceStatus) -> PortResult<Vec<Absence>> {
        let mut found: Vec<_> = self
            .tables()?
            .absences
            .values()
            .filter(|a| a.status() == status)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn count_used_makeups(
        &self,
        member_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> PortResult<u32> {
        let count = self
            .tables()?
            .absences
            .values()
            .filter(|a| a.member_id == member_id)
            .filter(|a| a.absent_date >= from && a.absent_date < until)
            .filter(|a| a.status().uses_makeup())
            .count();
        Ok(count as u32)
    }

    async fn count_makeups_booked(&self, slot_id: Uuid, date: NaiveDate) -> PortResult<u32> {
        let count = self
            .tables()?
            .absences
            .values()
            .filter_map(|a| a.makeup())
            .filter(|m| m.slot_id == slot_id && m.date == date)
            .count();
        Ok(count as u32)
    }

    async fn update_absence(&self, absence: &Absence, expected: AbsenceStatus) -> PortResult<bool> {
        let mut tables = self.tables()?;
        match tables.absences.get_mut(&absence.id) {
            Some(stored) if stored.status() == expected => {
                *stored = absence.clone();
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(PortError::NotFound(format!("Absence {} not found", absence.id))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScheduleError;
    use chrono::Utc;

    #[tokio::test]
    async fn second_absence_for_the_same_occurrence_conflicts() {
        let store = InMemoryStore::new();
        let day = NaiveDate::from_ymd_opt(2024, 6, 3).unwrap();
        let (member, slot) = (Uuid::new_v4(), Uuid::new_v4());
        let first = Absence::report(member, slot, day, None, day, Utc::now(), 7).unwrap();
        let second = Absence::report(member, slot, day, None, day, Utc::now(), 7).unwrap();

        store.insert_absence(&first).await.unwrap();
        let err = store.insert_absence(&second).await.unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
        assert!(matches!(ScheduleError::from(err), ScheduleError::Validation(_)));

        let other_day = NaiveDate::from_ymd_opt(2024, 6, 10).unwrap();
        let third = Absence::report(member, slot, other_day, None, day, Utc::now(), 7).unwrap();
        store.insert_absence(&third).await.unwrap();
    }
}
