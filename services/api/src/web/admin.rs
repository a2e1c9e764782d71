//! services/api/src/web/admin.rs
//!
//! Handlers for the staff-only endpoints: reviewing absences, running the deadline
//! sweep and maintaining the class timetable. Every route here sits behind
//! `require_admin`; the core re-checks the role as well.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::NaiveTime;
use club_schedule_core::{Actor, ClassCancellation, MemberClassAssignment, NewClassSlot};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::rest::{parse_date, AbsenceResponse, SlotResponse};
use crate::web::extract::{AppJson, AppPath};
use crate::web::state::AppState;

//=========================================================================================
// Payloads
//=========================================================================================

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SweepResponse {
    /// How many approved absences were moved to `expired`.
    pub expired: u64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateSlotRequest {
    pub program_id: Uuid,
    pub coach_id: Option<Uuid>,
    /// Full English weekday name, e.g. `Monday`.
    pub day_of_week: String,
    /// `HH:MM` or `HH:MM:SS`
    pub start_time: String,
    /// `HH:MM` or `HH:MM:SS`
    pub end_time: String,
    pub capacity: u32,
    pub label: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancelOccurrenceRequest {
    /// `YYYY-MM-DD`
    pub date: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CancellationResponse {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub cancelled_date: chrono::NaiveDate,
    pub reason: Option<String>,
}

impl From<ClassCancellation> for CancellationResponse {
    fn from(c: ClassCancellation) -> Self {
        Self {
            id: c.id,
            slot_id: c.slot_id,
            cancelled_date: c.cancelled_date,
            reason: c.reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignMemberRequest {
    pub member_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentResponse {
    pub id: Uuid,
    pub member_id: Uuid,
    pub slot_id: Uuid,
    /// `active` or `inactive`
    pub status: String,
}

impl From<MemberClassAssignment> for AssignmentResponse {
    fn from(a: MemberClassAssignment) -> Self {
        Self {
            id: a.id,
            member_id: a.member_id,
            slot_id: a.slot_id,
            status: a.status.as_str().to_string(),
        }
    }
}

fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, ApiError> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| ApiError::BadRequest(format!("{} must be a time in HH:MM form", field)))
}

//=========================================================================================
// Absence Review
//=========================================================================================

/// List absences waiting for review, oldest first.
#[utoipa::path(
    get,
    path = "/admin/absences/pending",
    responses(
        (status = 200, description = "Pending absences", body = [AbsenceResponse]),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn list_pending_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let pending = app_state.schedule.list_pending_absences(&actor).await?;
    let today = app_state.schedule.today();
    let body: Vec<AbsenceResponse> = pending
        .into_iter()
        .map(|a| AbsenceResponse::new(a, today))
        .collect();
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/admin/absences/{absence_id}/approve",
    params(("absence_id" = Uuid, Path, description = "A pending absence.")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Absence approved", body = AbsenceResponse),
        (status = 404, description = "Unknown absence", body = ErrorBody),
        (status = 409, description = "Absence is not pending", body = ErrorBody)
    )
)]
pub async fn approve_absence_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(absence_id): AppPath<Uuid>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let absence = app_state
        .schedule
        .approve_absence(&actor, absence_id, req.notes)
        .await?;
    let today = app_state.schedule.today();
    Ok(Json(AbsenceResponse::new(absence, today)))
}

#[utoipa::path(
    post,
    path = "/admin/absences/{absence_id}/reject",
    params(("absence_id" = Uuid, Path, description = "A pending absence.")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Absence rejected", body = AbsenceResponse),
        (status = 404, description = "Unknown absence", body = ErrorBody),
        (status = 409, description = "Absence is not pending", body = ErrorBody)
    )
)]
pub async fn reject_absence_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(absence_id): AppPath<Uuid>,
    AppJson(req): AppJson<ReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let absence = app_state
        .schedule
        .reject_absence(&actor, absence_id, req.notes)
        .await?;
    let today = app_state.schedule.today();
    Ok(Json(AbsenceResponse::new(absence, today)))
}

/// Mark a booked makeup as attended.
#[utoipa::path(
    post,
    path = "/admin/absences/{absence_id}/complete",
    params(("absence_id" = Uuid, Path, description = "An absence with a booked makeup.")),
    responses(
        (status = 200, description = "Makeup completed", body = AbsenceResponse),
        (status = 404, description = "Unknown absence", body = ErrorBody),
        (status = 409, description = "No makeup booked", body = ErrorBody)
    )
)]
pub async fn complete_makeup_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(absence_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let absence = app_state.schedule.complete_makeup(absence_id).await?;
    info!(%absence_id, admin_id = %actor.member_id, "Makeup attendance recorded");
    let today = app_state.schedule.today();
    Ok(Json(AbsenceResponse::new(absence, today)))
}

/// Run the makeup deadline sweep immediately.
#[utoipa::path(
    post,
    path = "/admin/sweep",
    responses(
        (status = 200, description = "Sweep finished", body = SweepResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorBody)
    )
)]
pub async fn sweep_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    actor.require_admin()?;
    let expired = app_state.schedule.sweep_expired_deadlines().await?;
    Ok(Json(SweepResponse { expired }))
}

//=========================================================================================
// Timetable Management
//=========================================================================================

#[utoipa::path(
    post,
    path = "/admin/slots",
    request_body = CreateSlotRequest,
    responses(
        (status = 201, description = "Slot created", body = SlotResponse),
        (status = 400, description = "Invalid weekday, times, capacity or label", body = ErrorBody)
    )
)]
pub async fn create_slot_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppJson(req): AppJson<CreateSlotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_slot = NewClassSlot {
        program_id: req.program_id,
        coach_id: req.coach_id,
        day_of_week: req.day_of_week,
        start_time: parse_time("start_time", &req.start_time)?,
        end_time: parse_time("end_time", &req.end_time)?,
        capacity: req.capacity,
        label: req.label,
    };
    let slot = app_state.schedule.create_slot(&actor, new_slot).await?;
    Ok((StatusCode::CREATED, Json(SlotResponse::from(slot))))
}

#[utoipa::path(
    post,
    path = "/admin/slots/{slot_id}/deactivate",
    params(("slot_id" = Uuid, Path, description = "The class slot.")),
    responses(
        (status = 200, description = "Slot deactivated", body = SlotResponse),
        (status = 404, description = "Unknown slot", body = ErrorBody)
    )
)]
pub async fn deactivate_slot_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(slot_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let slot = app_state.schedule.deactivate_slot(&actor, slot_id).await?;
    Ok(Json(SlotResponse::from(slot)))
}

/// Cancel a single date of a slot, e.g. for a public holiday.
#[utoipa::path(
    post,
    path = "/admin/slots/{slot_id}/cancellations",
    params(("slot_id" = Uuid, Path, description = "The class slot.")),
    request_body = CancelOccurrenceRequest,
    responses(
        (status = 201, description = "Occurrence cancelled", body = CancellationResponse),
        (status = 400, description = "Slot does not run that day, or already cancelled", body = ErrorBody),
        (status = 404, description = "Unknown slot", body = ErrorBody)
    )
)]
pub async fn cancel_occurrence_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(slot_id): AppPath<Uuid>,
    AppJson(req): AppJson<CancelOccurrenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let date = parse_date("date", &req.date)?;
    let cancellation = app_state
        .schedule
        .cancel_occurrence(&actor, slot_id, date, req.reason)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(CancellationResponse::from(cancellation)),
    ))
}

#[utoipa::path(
    post,
    path = "/admin/slots/{slot_id}/members",
    params(("slot_id" = Uuid, Path, description = "The class slot.")),
    request_body = AssignMemberRequest,
    responses(
        (status = 200, description = "Member assigned", body = AssignmentResponse),
        (status = 400, description = "Slot is inactive", body = ErrorBody),
        (status = 404, description = "Unknown slot", body = ErrorBody)
    )
)]
pub async fn assign_member_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(slot_id): AppPath<Uuid>,
    AppJson(req): AppJson<AssignMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = app_state
        .schedule
        .assign_member(&actor, slot_id, req.member_id)
        .await?;
    Ok(Json(AssignmentResponse::from(assignment)))
}

#[utoipa::path(
    delete,
    path = "/admin/slots/{slot_id}/members/{member_id}",
    params(
        ("slot_id" = Uuid, Path, description = "The class slot."),
        ("member_id" = Uuid, Path, description = "The member to remove.")
    ),
    responses(
        (status = 200, description = "Assignment deactivated", body = AssignmentResponse),
        (status = 404, description = "Member is not assigned to the slot", body = ErrorBody)
    )
)]
pub async fn unassign_member_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath((slot_id, member_id)): AppPath<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, ApiError> {
    let assignment = app_state
        .schedule
        .unassign_member(&actor, slot_id, member_id)
        .await?;
    Ok(Json(AssignmentResponse::from(assignment)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_accept_minutes_or_seconds() {
        assert_eq!(
            parse_time("start_time", "18:30").unwrap(),
            NaiveTime::from_hms_opt(18, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time("start_time", " 07:05:30 ").unwrap(),
            NaiveTime::from_hms_opt(7, 5, 30).unwrap()
        );
        assert!(matches!(
            parse_time("end_time", "half past six"),
            Err(ApiError::BadRequest(msg)) if msg.contains("end_time")
        ));
    }
}
