//! Shared fixtures for the scheduling integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use club_schedule_core::{
    Absence, AbsenceStatus, Actor, ClassCancellation, ClassSlot, DatabaseService, FixedClock,
    InMemoryStore, MemberClassAssignment, NewClassSlot, PortError, PortResult, SchedulePolicy,
    ScheduleService,
};
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Club {
    pub service: ScheduleService,
    pub clock: Arc<FixedClock>,
    pub store: Arc<InMemoryStore>,
    pub admin: Actor,
    pub program_id: Uuid,
}

impl Club {
    pub fn opening_on(today: NaiveDate) -> Self {
        let clock = Arc::new(FixedClock::on(today));
        let store = Arc::new(InMemoryStore::new());
        let service = ScheduleService::new(store.clone(), clock.clone(), SchedulePolicy::default());
        Self {
            service,
            clock,
            store,
            admin: Actor::admin(Uuid::new_v4()),
            program_id: Uuid::new_v4(),
        }
    }

    pub async fn slot(&self, day: &str, hour: u32, capacity: u32) -> ClassSlot {
        self.service
            .create_slot(
                &self.admin,
                NewClassSlot {
                    program_id: self.program_id,
                    coach_id: None,
                    day_of_week: day.to_string(),
                    start_time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(hour + 1, 0, 0).unwrap(),
                    capacity,
                    label: format!("{day} {hour}:00"),
                },
            )
            .await
            .expect("slot should be created")
    }

    pub async fn member_in(&self, slot: &ClassSlot) -> Actor {
        let member = Actor::member(Uuid::new_v4());
        self.enrol(&member, slot).await;
        member
    }

    pub async fn enrol(&self, member: &Actor, slot: &ClassSlot) {
        self.service
            .assign_member(&self.admin, slot.id, member.member_id)
            .await
            .expect("member should be assigned");
    }
}

/// Delegates to an `InMemoryStore` but fails the next `failures` absence updates.
pub struct FailingUpdates {
    pub inner: Arc<InMemoryStore>,
    failures: AtomicU32,
}

impl FailingUpdates {
    pub fn new(inner: Arc<InMemoryStore>, failures: u32) -> Self {
        Self {
            inner,
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl DatabaseService for FailingUpdates {
    async fn get_slot(&self, slot_id: Uuid) -> PortResult<ClassSlot> {
        self.inner.get_slot(slot_id).await
    }

    async fn list_active_slots_for_program(&self, program_id: Uuid) -> PortResult<Vec<ClassSlot>> {
        self.inner.list_active_slots_for_program(program_id).await
    }

    async fn save_slot(&self, slot: &ClassSlot) -> PortResult<()> {
        self.inner.save_slot(slot).await
    }

    async fn list_cancellations(&self, slot_id: Uuid) -> PortResult<Vec<ClassCancellation>> {
        self.inner.list_cancellations(slot_id).await
    }

    async fn save_cancellation(&self, cancellation: &ClassCancellation) -> PortResult<()> {
        self.inner.save_cancellation(cancellation).await
    }

    async fn list_assignments_for_member(
        &self,
        member_id: Uuid,
    ) -> PortResult<Vec<MemberClassAssignment>> {
        self.inner.list_assignments_for_member(member_id).await
    }

    async fn find_assignment(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
    ) -> PortResult<Option<MemberClassAssignment>> {
        self.inner.find_assignment(member_id, slot_id).await
    }

    async fn save_assignment(&self, assignment: &MemberClassAssignment) -> PortResult<()> {
        self.inner.save_assignment(assignment).await
    }

    async fn count_active_assignments(&self, slot_id: Uuid) -> PortResult<u32> {
        self.inner.count_active_assignments(slot_id).await
    }

    async fn insert_absence(&self, absence: &Absence) -> PortResult<()> {
        self.inner.insert_absence(absence).await
    }

    async fn get_absence(&self, absence_id: Uuid) -> PortResult<Absence> {
        self.inner.get_absence(absence_id).await
    }

    async fn find_absence_for_occurrence(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
        absent_date: NaiveDate,
    ) -> PortResult<Option<Absence>> {
        self.inner
            .find_absence_for_occurrence(member_id, slot_id, absent_date)
            .await
    }

    async fn list_absences_for_member(&self, member_id: Uuid) -> PortResult<Vec<Absence>> {
        self.inner.list_absences_for_member(member_id).await
    }

    async fn list_absences_by_status(&self, status: AbsenceStatus) -> PortResult<Vec<Absence>> {
        self.inner.list_absences_by_status(status).await
    }

    async fn count_used_makeups(
        &self,
        member_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> PortResult<u32> {
        self.inner.count_used_makeups(member_id, from, until).await
    }

    async fn count_makeups_booked(&self, slot_id: Uuid, date: NaiveDate) -> PortResult<u32> {
        self.inner.count_makeups_booked(slot_id, date).await
    }

    async fn update_absence(&self, absence: &Absence, expected: AbsenceStatus) -> PortResult<bool> {
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(PortError::Unexpected("connection reset".to_string()));
        }
        self.inner.update_absence(absence, expected).await
    }
}
