//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use club_schedule_core::absence::{Absence, AbsenceState, AbsenceStatus, Makeup};
use club_schedule_core::domain::{
    AssignmentStatus, ClassCancellation, ClassSlot, MemberClassAssignment,
};
use club_schedule_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn not_found_or_unexpected(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| match e {
        sqlx::Error::RowNotFound => PortError::NotFound(what),
        _ => PortError::Unexpected(e.to_string()),
    }
}

const UNIQUE_VIOLATION: &str = "23505";

/// Maps a failed write, turning unique-constraint violations into `PortError::Conflict`.
fn write_error(what: String) -> impl FnOnce(sqlx::Error) -> PortError {
    move |e| {
        let code = e
            .as_database_error()
            .and_then(|db| db.code().map(|c| c.into_owned()));
        classify_write_error(code.as_deref(), what, e.to_string())
    }
}

fn classify_write_error(code: Option<&str>, what: String, detail: String) -> PortError {
    match code {
        Some(UNIQUE_VIOLATION) => PortError::Conflict(what),
        _ => PortError::Unexpected(detail),
    }
}

fn count(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

const SLOT_COLUMNS: &str =
    "id, program_id, coach_id, day_of_week, start_time, end_time, capacity, is_active, label";

#[derive(FromRow)]
struct SlotRecord {
    id: Uuid,
    program_id: Uuid,
    coach_id: Option<Uuid>,
    day_of_week: String,
    start_time: NaiveTime,
    end_time: NaiveTime,
    capacity: i32,
    is_active: bool,
    label: String,
}
impl SlotRecord {
    fn to_domain(self) -> ClassSlot {
        ClassSlot {
            id: self.id,
            program_id: self.program_id,
            coach_id: self.coach_id,
            day_of_week: self.day_of_week,
            start_time: self.start_time,
            end_time: self.end_time,
            capacity: u32::try_from(self.capacity).unwrap_or(0),
            is_active: self.is_active,
            label: self.label,
        }
    }
}

#[derive(FromRow)]
struct CancellationRecord {
    id: Uuid,
    slot_id: Uuid,
    cancelled_date: NaiveDate,
    reason: Option<String>,
}
impl CancellationRecord {
    fn to_domain(self) -> ClassCancellation {
        ClassCancellation {
            id: self.id,
            slot_id: self.slot_id,
            cancelled_date: self.cancelled_date,
            reason: self.reason,
        }
    }
}

#[derive(FromRow)]
struct AssignmentRecord {
    id: Uuid,
    member_id: Uuid,
    slot_id: Uuid,
    status: String,
}
impl AssignmentRecord {
    fn to_domain(self) -> PortResult<MemberClassAssignment> {
        let status = AssignmentStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!(
                "assignment {} has unknown status '{}'",
                self.id, self.status
            ))
        })?;
        Ok(MemberClassAssignment {
            id: self.id,
            member_id: self.member_id,
            slot_id: self.slot_id,
            status,
        })
    }
}

const ABSENCE_COLUMNS: &str = "id, member_id, slot_id, absent_date, reason, status, admin_notes, \
     makeup_deadline, makeup_slot_id, makeup_date, created_at, updated_at";

#[derive(FromRow)]
struct AbsenceRecord {
    id: Uuid,
    member_id: Uuid,
    slot_id: Uuid,
    absent_date: NaiveDate,
    reason: Option<String>,
    status: String,
    admin_notes: Option<String>,
    makeup_deadline: NaiveDate,
    makeup_slot_id: Option<Uuid>,
    makeup_date: Option<NaiveDate>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl AbsenceRecord {
    fn to_domain(self) -> PortResult<Absence> {
        let status = self
            .status
            .parse::<AbsenceStatus>()
            .map_err(PortError::Unexpected)?;
        let makeup = match (self.makeup_slot_id, self.makeup_date) {
            (Some(slot_id), Some(date)) => Some(Makeup { slot_id, date }),
            _ => None,
        };
        let state = AbsenceState::from_parts(status, makeup)
            .map_err(|e| PortError::Unexpected(format!("absence {}: {}", self.id, e)))?;

        Ok(Absence::restore(
            self.id,
            self.member_id,
            self.slot_id,
            self.absent_date,
            self.reason,
            self.admin_notes,
            self.makeup_deadline,
            state,
            self.created_at,
            self.updated_at,
        ))
    }
}

fn absences_to_domain(records: Vec<AbsenceRecord>) -> PortResult<Vec<Absence>> {
    records.into_iter().map(AbsenceRecord::to_domain).collect()
}

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn get_slot(&self, slot_id: Uuid) -> PortResult<ClassSlot> {
        let record = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM class_slots WHERE id = $1"
        ))
        .bind(slot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Class slot {} not found", slot_id)))?;
        Ok(record.to_domain())
    }

    async fn list_active_slots_for_program(&self, program_id: Uuid) -> PortResult<Vec<ClassSlot>> {
        let records = sqlx::query_as::<_, SlotRecord>(&format!(
            "SELECT {SLOT_COLUMNS} FROM class_slots WHERE program_id = $1 AND is_active"
        ))
        .bind(program_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_slot(&self, slot: &ClassSlot) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO class_slots \
                 (id, program_id, coach_id, day_of_week, start_time, end_time, capacity, is_active, label) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (id) DO UPDATE SET \
                 program_id = EXCLUDED.program_id, coach_id = EXCLUDED.coach_id, \
                 day_of_week = EXCLUDED.day_of_week, start_time = EXCLUDED.start_time, \
                 end_time = EXCLUDED.end_time, capacity = EXCLUDED.capacity, \
                 is_active = EXCLUDED.is_active, label = EXCLUDED.label",
        )
        .bind(slot.id)
        .bind(slot.program_id)
        .bind(slot.coach_id)
        .bind(&slot.day_of_week)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(i32::try_from(slot.capacity).unwrap_or(i32::MAX))
        .bind(slot.is_active)
        .bind(&slot.label)
        .execute(&self.pool)
        .await
        .map_err(write_error(format!("Class slot {} conflicts with an existing slot", slot.id)))?;
        Ok(())
    }

    async fn list_cancellations(&self, slot_id: Uuid) -> PortResult<Vec<ClassCancellation>> {
        let records = sqlx::query_as::<_, CancellationRecord>(
            "SELECT id, slot_id, cancelled_date, reason FROM class_cancellations \
             WHERE slot_id = $1 ORDER BY cancelled_date ASC",
        )
        .bind(slot_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }

    async fn save_cancellation(&self, cancellation: &ClassCancellation) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO class_cancellations (id, slot_id, cancelled_date, reason) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(cancellation.id)
        .bind(cancellation.slot_id)
        .bind(cancellation.cancelled_date)
        .bind(&cancellation.reason)
        .execute(&self.pool)
        .await
        .map_err(write_error(format!(
            "slot {} is already cancelled on {}",
            cancellation.slot_id, cancellation.cancelled_date
        )))?;
        Ok(())
    }

    async fn list_assignments_for_member(
        &self,
        member_id: Uuid,
    ) -> PortResult<Vec<MemberClassAssignment>> {
        let records = sqlx::query_as::<_, AssignmentRecord>(
            "SELECT id, member_id, slot_id, status FROM member_class_assignments WHERE member_id = $1",
        )
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        records.into_iter().map(|r| r.to_domain()).collect()
    }

    async fn find_assignment(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
    ) -> PortResult<Option<MemberClassAssignment>> {
        let record = sqlx::query_as::<_, AssignmentRecord>(
            "SELECT id, member_id, slot_id, status FROM member_class_assignments \
             WHERE member_id = $1 AND slot_id = $2",
        )
        .bind(member_id)
        .bind(slot_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn save_assignment(&self, assignment: &MemberClassAssignment) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO member_class_assignments (id, member_id, slot_id, status) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET status = EXCLUDED.status",
        )
        .bind(assignment.id)
        .bind(assignment.member_id)
        .bind(assignment.slot_id)
        .bind(assignment.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(write_error(format!(
            "member {} is already assigned to class {}",
            assignment.member_id, assignment.slot_id
        )))?;
        Ok(())
    }

    async fn count_active_assignments(&self, slot_id: Uuid) -> PortResult<u32> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM member_class_assignments WHERE slot_id = $1 AND status = 'active'",
        )
        .bind(slot_id)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count(total))
    }

    async fn insert_absence(&self, absence: &Absence) -> PortResult<()> {
        let makeup = absence.makeup();
        sqlx::query(&format!(
            "INSERT INTO absences ({ABSENCE_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(absence.id)
        .bind(absence.member_id)
        .bind(absence.slot_id)
        .bind(absence.absent_date)
        .bind(&absence.reason)
        .bind(absence.status().as_str())
        .bind(&absence.admin_notes)
        .bind(absence.makeup_deadline())
        .bind(makeup.map(|m| m.slot_id))
        .bind(makeup.map(|m| m.date))
        .bind(absence.created_at)
        .bind(absence.updated_at)
        .execute(&self.pool)
        .await
        .map_err(write_error(format!(
            "an absence for {} has already been reported",
            absence.absent_date
        )))?;
        Ok(())
    }

    async fn get_absence(&self, absence_id: Uuid) -> PortResult<Absence> {
        let record = sqlx::query_as::<_, AbsenceRecord>(&format!(
            "SELECT {ABSENCE_COLUMNS} FROM absences WHERE id = $1"
        ))
        .bind(absence_id)
        .fetch_one(&self.pool)
        .await
        .map_err(not_found_or_unexpected(format!("Absence {} not found", absence_id)))?;
        record.to_domain()
    }

    async fn find_absence_for_occurrence(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
        absent_date: NaiveDate,
    ) -> PortResult<Option<Absence>> {
        let record = sqlx::query_as::<_, AbsenceRecord>(&format!(
            "SELECT {ABSENCE_COLUMNS} FROM absences \
             WHERE member_id = $1 AND slot_id = $2 AND absent_date = $3"
        ))
        .bind(member_id)
        .bind(slot_id)
        .bind(absent_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(|r| r.to_domain()).transpose()
    }

    async fn list_absences_for_member(&self, member_id: Uuid) -> PortResult<Vec<Absence>> {
        let records = sqlx::query_as::<_, AbsenceRecord>(&format!(
            "SELECT {ABSENCE_COLUMNS} FROM absences WHERE member_id = $1 \
             ORDER BY absent_date DESC, created_at DESC"
        ))
        .bind(member_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        absences_to_domain(records)
    }

    async fn list_absences_by_status(&self, status: AbsenceStatus) -> PortResult<Vec<Absence>> {
        let records = sqlx::query_as::<_, AbsenceRecord>(&format!(
            "SELECT {ABSENCE_COLUMNS} FROM absences WHERE status = $1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        absences_to_domain(records)
    }

    async fn count_used_makeups(
        &self,
        member_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> PortResult<u32> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM absences \
             WHERE member_id = $1 AND absent_date >= $2 AND absent_date < $3 \
               AND status IN ('makeup_selected', 'completed')",
        )
        .bind(member_id)
        .bind(from)
        .bind(until)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count(total))
    }

    async fn count_makeups_booked(&self, slot_id: Uuid, date: NaiveDate) -> PortResult<u32> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM absences \
             WHERE makeup_slot_id = $1 AND makeup_date = $2 \
               AND status IN ('makeup_selected', 'completed')",
        )
        .bind(slot_id)
        .bind(date)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(count(total))
    }

    async fn update_absence(&self, absence: &Absence, expected: AbsenceStatus) -> PortResult<bool> {
        let makeup = absence.makeup();
        let result = sqlx::query(
            "UPDATE absences SET \
                 status = $3, admin_notes = $4, makeup_slot_id = $5, makeup_date = $6, updated_at = $7 \
             WHERE id = $1 AND status = $2",
        )
        .bind(absence.id)
        .bind(expected.as_str())
        .bind(absence.status().as_str())
        .bind(&absence.admin_notes)
        .bind(makeup.map(|m| m.slot_id))
        .bind(makeup.map(|m| m.date))
        .bind(absence.updated_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM absences WHERE id = $1)")
            .bind(absence.id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        if exists {
            Ok(false)
        } else {
            Err(PortError::NotFound(format!("Absence {} not found", absence.id)))
        }
    }
}
