//! crates/club_schedule_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the scheduling core.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to stay independent of the concrete store behind it.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::absence::{Absence, AbsenceStatus};
use crate::domain::{ClassCancellation, ClassSlot, MemberClassAssignment};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A write collided with an existing row, e.g. a unique constraint.
    #[error("Conflicting write: {0}")]
    Conflict(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- Class Slots ---
    async fn get_slot(&self, slot_id: Uuid) -> PortResult<ClassSlot>;

    async fn list_active_slots_for_program(&self, program_id: Uuid) -> PortResult<Vec<ClassSlot>>;

    /// Inserts the slot, or overwrites the existing row with the same id.
    async fn save_slot(&self, slot: &ClassSlot) -> PortResult<()>;

    // --- Cancellations ---
    async fn list_cancellations(&self, slot_id: Uuid) -> PortResult<Vec<ClassCancellation>>;

    async fn save_cancellation(&self, cancellation: &ClassCancellation) -> PortResult<()>;

    // --- Member Assignments ---
    async fn list_assignments_for_member(
        &self,
        member_id: Uuid,
    ) -> PortResult<Vec<MemberClassAssignment>>;

    async fn find_assignment(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
    ) -> PortResult<Option<MemberClassAssignment>>;

    /// Inserts the assignment, or overwrites the existing row with the same id.
    async fn save_assignment(&self, assignment: &MemberClassAssignment) -> PortResult<()>;

    async fn count_active_assignments(&self, slot_id: Uuid) -> PortResult<u32>;

    // --- Absences ---
    async fn insert_absence(&self, absence: &Absence) -> PortResult<()>;

    async fn get_absence(&self, absence_id: Uuid) -> PortResult<Absence>;

    async fn find_absence_for_occurrence(
        &self,
        member_id: Uuid,
        slot_id: Uuid,
        absent_date: NaiveDate,
    ) -> PortResult<Option<Absence>>;

    /// Most recent absent date first.
    async fn list_absences_for_member(&self, member_id: Uuid) -> PortResult<Vec<Absence>>;

    /// Oldest report first.
    async fn list_absences_by_status(&self, status: AbsenceStatus) -> PortResult<Vec<Absence>>;

    /// Counts the member's absences dated in `[from, until)` whose makeup is selected or done.
    async fn count_used_makeups(
        &self,
        member_id: Uuid,
        from: NaiveDate,
        until: NaiveDate,
    ) -> PortResult<u32>;

    /// Counts makeups booked into a slot on a given date that still hold a spot.
    async fn count_makeups_booked(&self, slot_id: Uuid, date: NaiveDate) -> PortResult<u32>;

    /// Writes the absence only if its stored status still equals `expected`.
    ///
    /// Returns `false` when another writer changed the status first.
    async fn update_absence(&self, absence: &Absence, expected: AbsenceStatus) -> PortResult<bool>;
}
