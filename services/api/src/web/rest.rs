//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the member-facing REST endpoints and the master
//! definition for the OpenAPI specification.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use club_schedule_core::{Absence, Actor, ClassOccurrence, ClassSlot, SlotAvailability};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::{ApiError, ErrorBody};
use crate::web::admin;
use crate::web::extract::{AppJson, AppPath, AppQuery};
use crate::web::state::AppState;

pub const DEFAULT_WINDOW_DAYS: u32 = 14;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_occurrences_handler,
        member_calendar_handler,
        report_absence_handler,
        list_absences_handler,
        list_makeup_slots_handler,
        select_makeup_handler,
        admin::create_slot_handler,
        admin::deactivate_slot_handler,
        admin::cancel_occurrence_handler,
        admin::assign_member_handler,
        admin::unassign_member_handler,
        admin::list_pending_handler,
        admin::approve_absence_handler,
        admin::reject_absence_handler,
        admin::complete_makeup_handler,
        admin::sweep_handler,
    ),
    components(
        schemas(
            OccurrenceResponse,
            SlotResponse,
            AbsenceResponse,
            SlotAvailabilityResponse,
            ReportAbsenceRequest,
            SelectMakeupRequest,
            ErrorBody,
            admin::CreateSlotRequest,
            admin::CancelOccurrenceRequest,
            admin::CancellationResponse,
            admin::AssignMemberRequest,
            admin::AssignmentResponse,
            admin::ReviewRequest,
            admin::SweepResponse,
        )
    ),
    tags(
        (name = "Club Schedule API", description = "Class calendar, absences and makeup bookings.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OccurrenceResponse {
    pub slot_id: Uuid,
    pub label: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub day_short: String,
    pub day_long: String,
    pub display_date: String,
    pub is_today: bool,
    pub is_tomorrow: bool,
    pub is_cancelled: bool,
    pub cancellation_reason: Option<String>,
}

impl From<ClassOccurrence> for OccurrenceResponse {
    fn from(o: ClassOccurrence) -> Self {
        Self {
            slot_id: o.slot_id,
            label: o.label,
            date: o.date,
            start_time: o.start_time,
            end_time: o.end_time,
            day_short: o.weekday_short,
            day_long: o.weekday_long,
            display_date: o.display_date,
            is_today: o.is_today,
            is_tomorrow: o.is_tomorrow,
            is_cancelled: o.is_cancelled,
            cancellation_reason: o.cancellation_reason,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotResponse {
    pub id: Uuid,
    pub program_id: Uuid,
    pub coach_id: Option<Uuid>,
    pub day_of_week: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub capacity: u32,
    pub is_active: bool,
    pub label: String,
}

impl From<ClassSlot> for SlotResponse {
    fn from(s: ClassSlot) -> Self {
        Self {
            id: s.id,
            program_id: s.program_id,
            coach_id: s.coach_id,
            day_of_week: s.day_of_week,
            start_time: s.start_time,
            end_time: s.end_time,
            capacity: s.capacity,
            is_active: s.is_active,
            label: s.label,
        }
    }
}

/// An absence as shown to members and admins, with deadline annotations.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AbsenceResponse {
    pub id: Uuid,
    pub member_id: Uuid,
    pub slot_id: Uuid,
    pub absent_date: NaiveDate,
    pub reason: Option<String>,
    /// One of `pending`, `approved`, `rejected`, `makeup_selected`, `completed`, `expired`.
    pub status: String,
    pub admin_notes: Option<String>,
    pub makeup_deadline: NaiveDate,
    pub makeup_slot_id: Option<Uuid>,
    pub makeup_date: Option<NaiveDate>,
    pub is_deadline_expired: bool,
    /// Absent once the absence has reached a final state.
    pub days_left_for_makeup: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl AbsenceResponse {
    pub fn new(absence: Absence, today: NaiveDate) -> Self {
        let makeup = absence.makeup();
        Self {
            is_deadline_expired: absence.is_deadline_expired(today),
            days_left_for_makeup: absence.days_left_for_makeup(today),
            status: absence.status().to_string(),
            makeup_deadline: absence.makeup_deadline(),
            makeup_slot_id: makeup.map(|m| m.slot_id),
            makeup_date: makeup.map(|m| m.date),
            id: absence.id,
            member_id: absence.member_id,
            slot_id: absence.slot_id,
            absent_date: absence.absent_date,
            reason: absence.reason,
            admin_notes: absence.admin_notes,
            created_at: absence.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SlotAvailabilityResponse {
    pub slot: SlotResponse,
    pub available_spots: u32,
    pub is_full: bool,
    pub available_dates: Vec<NaiveDate>,
}

impl From<SlotAvailability> for SlotAvailabilityResponse {
    fn from(a: SlotAvailability) -> Self {
        Self {
            slot: a.slot.into(),
            available_spots: a.available_spots,
            is_full: a.is_full,
            available_dates: a.available_dates,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct WindowQuery {
    /// Number of days to look ahead, 1 to 90. Defaults to 14.
    pub days: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportAbsenceRequest {
    pub slot_id: Uuid,
    /// `YYYY-MM-DD`
    pub absent_date: String,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectMakeupRequest {
    pub slot_id: Uuid,
    /// `YYYY-MM-DD`
    pub makeup_date: String,
}

/// Parses an ISO `YYYY-MM-DD` date from a request body field.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("{} must be a date in YYYY-MM-DD form", field)))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the upcoming occurrences of one class slot.
#[utoipa::path(
    get,
    path = "/slots/{slot_id}/occurrences",
    params(
        ("slot_id" = Uuid, Path, description = "The class slot."),
        WindowQuery
    ),
    responses(
        (status = 200, description = "Occurrences in date order", body = [OccurrenceResponse]),
        (status = 400, description = "Window out of range", body = ErrorBody),
        (status = 404, description = "Unknown slot", body = ErrorBody)
    )
)]
pub async fn list_occurrences_handler(
    State(app_state): State<Arc<AppState>>,
    AppPath(slot_id): AppPath<Uuid>,
    AppQuery(window): AppQuery<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let days = window.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let occurrences = app_state
        .schedule
        .list_upcoming_occurrences(slot_id, days)
        .await?;
    let body: Vec<OccurrenceResponse> = occurrences.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// The caller's own class calendar across every slot they attend.
#[utoipa::path(
    get,
    path = "/me/calendar",
    params(WindowQuery),
    responses(
        (status = 200, description = "Occurrences in date order", body = [OccurrenceResponse]),
        (status = 400, description = "Window out of range", body = ErrorBody)
    )
)]
pub async fn member_calendar_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppQuery(window): AppQuery<WindowQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let days = window.days.unwrap_or(DEFAULT_WINDOW_DAYS);
    let calendar = app_state.schedule.member_calendar(&actor, days).await?;
    let body: Vec<OccurrenceResponse> = calendar.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Report an upcoming absence from one of the caller's classes.
#[utoipa::path(
    post,
    path = "/absences",
    request_body = ReportAbsenceRequest,
    responses(
        (status = 201, description = "Absence recorded as pending", body = AbsenceResponse),
        (status = 400, description = "Date in the past, not a class day, or similar", body = ErrorBody),
        (status = 404, description = "Unknown slot", body = ErrorBody)
    )
)]
pub async fn report_absence_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppJson(req): AppJson<ReportAbsenceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let absent_date = parse_date("absent_date", &req.absent_date)?;
    let absence = app_state
        .schedule
        .report_absence(&actor, req.slot_id, absent_date, req.reason)
        .await?;
    let today = app_state.schedule.today();
    Ok((StatusCode::CREATED, Json(AbsenceResponse::new(absence, today))))
}

/// List the caller's absences, most recent first.
#[utoipa::path(
    get,
    path = "/absences",
    responses(
        (status = 200, description = "The caller's absences", body = [AbsenceResponse])
    )
)]
pub async fn list_absences_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
) -> Result<impl IntoResponse, ApiError> {
    let absences = app_state.schedule.list_absences(&actor).await?;
    let today = app_state.schedule.today();
    let body: Vec<AbsenceResponse> = absences
        .into_iter()
        .map(|a| AbsenceResponse::new(a, today))
        .collect();
    Ok(Json(body))
}

/// List the classes that can be booked as a makeup for an approved absence.
#[utoipa::path(
    get,
    path = "/absences/{absence_id}/makeup-slots",
    params(("absence_id" = Uuid, Path, description = "The approved absence.")),
    responses(
        (status = 200, description = "Candidate slots by weekday and start time", body = [SlotAvailabilityResponse]),
        (status = 403, description = "Absence belongs to someone else", body = ErrorBody),
        (status = 409, description = "Absence is not approved", body = ErrorBody),
        (status = 410, description = "Makeup deadline has passed", body = ErrorBody)
    )
)]
pub async fn list_makeup_slots_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(absence_id): AppPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let slots = app_state
        .schedule
        .list_makeup_slots(&actor, absence_id)
        .await?;
    let body: Vec<SlotAvailabilityResponse> = slots.into_iter().map(Into::into).collect();
    Ok(Json(body))
}

/// Book a makeup class for an approved absence.
#[utoipa::path(
    post,
    path = "/absences/{absence_id}/makeup",
    params(("absence_id" = Uuid, Path, description = "The approved absence.")),
    request_body = SelectMakeupRequest,
    responses(
        (status = 200, description = "Makeup booked", body = AbsenceResponse),
        (status = 400, description = "Invalid slot or date", body = ErrorBody),
        (status = 403, description = "Absence belongs to someone else", body = ErrorBody),
        (status = 409, description = "Absence not approved, or class full", body = ErrorBody),
        (status = 410, description = "Makeup deadline has passed", body = ErrorBody),
        (status = 422, description = "Monthly makeup limit reached", body = ErrorBody)
    )
)]
pub async fn select_makeup_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(actor): Extension<Actor>,
    AppPath(absence_id): AppPath<Uuid>,
    AppJson(req): AppJson<SelectMakeupRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let makeup_date = parse_date("makeup_date", &req.makeup_date)?;
    let absence = app_state
        .schedule
        .select_makeup(&actor, absence_id, req.slot_id, makeup_date)
        .await?;
    let today = app_state.schedule.today();
    Ok(Json(AbsenceResponse::new(absence, today)))
}
