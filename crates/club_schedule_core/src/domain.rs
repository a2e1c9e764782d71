//! crates/club_schedule_core/src/domain.rs
//!
//! Defines the pure, core data structures for class scheduling.
//! These structs are independent of any database or serialization format.

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;

use crate::error::{ScheduleError, ScheduleResult};

//=========================================================================================
// Identity
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Member,
    Admin,
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub member_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn member(member_id: Uuid) -> Self {
        Self {
            member_id,
            role: Role::Member,
        }
    }

    pub fn admin(member_id: Uuid) -> Self {
        Self {
            member_id,
            role: Role::Admin,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn require_admin(&self) -> ScheduleResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ScheduleError::NotAuthorized(
                "this action requires the admin role".to_string(),
            ))
        }
    }
}

//=========================================================================================
// Class Slots
//=========================================================================================

/// A recurring weekly time block for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassSlot {
    pub id: Uuid,
    pub program_id: Uuid,
    pub coach_id: Option<Uuid>,
    /// The day-of-week exactly as it was entered ("Monday", "mon", "MONDAY", ...).
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub is_active: bool,
    pub label: String,
}

impl ClassSlot {
    /// The slot's weekday, parsed case-insensitively from either the short or long name.
    /// Unrecognised values yield `None`.
    pub fn weekday(&self) -> Option<Weekday> {
        self.day_of_week.trim().parse::<Weekday>().ok()
    }

    pub fn runs_on(&self, date: NaiveDate) -> bool {
        self.weekday() == Some(date.weekday())
    }

    pub fn validate(&self) -> ScheduleResult<()> {
        if self.weekday().is_none() {
            return Err(ScheduleError::Validation(format!(
                "'{}' is not a day of the week",
                self.day_of_week
            )));
        }
        if self.start_time >= self.end_time {
            return Err(ScheduleError::Validation(
                "start time must be before end time".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(ScheduleError::Validation(
                "capacity must be at least 1".to_string(),
            ));
        }
        if self.label.trim().is_empty() {
            return Err(ScheduleError::Validation("label must not be empty".to_string()));
        }
        Ok(())
    }
}

/// The admin-supplied fields for a new class slot.
#[derive(Debug, Clone)]
pub struct NewClassSlot {
    pub program_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub label: String,
}

impl NewClassSlot {
    pub fn into_slot(self) -> ClassSlot {
        ClassSlot {
            id: Uuid::new_v4(),
            program_id: self.program_id,
            coach_id: self.coach_id,
            day_of_week: self.day_of_week.trim().to_string(),
            start_time: self.start_time,
            end_time: self.end_time,
            capacity: self.capacity,
            is_active: true,
            label: self.label.trim().to_string(),
        }
    }
}

/// A single calendar-date exception for a slot, e.g. a public holiday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassCancellation {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub cancelled_date: NaiveDate,
    pub reason: Option<String>,
}

/// One concrete calendar-date instance of a slot. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassOccurrence {
    pub slot_id: Uuid,
    pub label: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub weekday_short: String,
    pub weekday_long: String,
    /// Human display form, e.g. "Feb 24".
    pub display_date: String,
    pub is_today: bool,
    pub is_tomorrow: bool,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
}

//=========================================================================================
// Member Assignments
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStatus {
    Active,
    Inactive,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Inactive => "inactive",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "active" => Some(AssignmentStatus::Active),
            "inactive" => Some(AssignmentStatus::Inactive),
            _ => None,
        }
    }
}

/// Links a member to a slot they regularly attend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberClassAssignment {
    pub id: Uuid,
    pub member_id: Uuid,
    pub slot_id: Uuid,
    pub status: AssignmentStatus,
}

impl MemberClassAssignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

//=========================================================================================
// Makeup Availability
//=========================================================================================

/// A slot offered as a makeup, annotated with its current load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAvailability {
    pub slot: ClassSlot,
    pub available_spots: u32,
    /// Full slots are still listed for display but cannot be selected.
    pub is_full: bool,
    /// Non-cancelled occurrence dates between today and the makeup deadline.
    pub available_dates: Vec<NaiveDate>,
}
