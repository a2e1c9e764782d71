pub mod admin;
pub mod extract;
pub mod middleware;
pub mod rest;
pub mod state;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};

use middleware::{require_admin, require_identity};
use state::AppState;

/// Builds the API router. CORS and the Swagger UI are layered on by the binary.
pub fn router(app_state: Arc<AppState>) -> Router {
    let member_routes = Router::new()
        .route("/slots/{slot_id}/occurrences", get(rest::list_occurrences_handler))
        .route("/me/calendar", get(rest::member_calendar_handler))
        .route(
            "/absences",
            get(rest::list_absences_handler).post(rest::report_absence_handler),
        )
        .route(
            "/absences/{absence_id}/makeup-slots",
            get(rest::list_makeup_slots_handler),
        )
        .route(
            "/absences/{absence_id}/makeup",
            post(rest::select_makeup_handler),
        );

    // Layers run bottom-up, so identity is resolved before the admin check.
    let admin_routes = Router::new()
        .route("/admin/absences/pending", get(admin::list_pending_handler))
        .route(
            "/admin/absences/{absence_id}/approve",
            post(admin::approve_absence_handler),
        )
        .route(
            "/admin/absences/{absence_id}/reject",
            post(admin::reject_absence_handler),
        )
        .route(
            "/admin/absences/{absence_id}/complete",
            post(admin::complete_makeup_handler),
        )
        .route("/admin/sweep", post(admin::sweep_handler))
        .route("/admin/slots", post(admin::create_slot_handler))
        .route(
            "/admin/slots/{slot_id}/deactivate",
            post(admin::deactivate_slot_handler),
        )
        .route(
            "/admin/slots/{slot_id}/cancellations",
            post(admin::cancel_occurrence_handler),
        )
        .route("/admin/slots/{slot_id}/members", post(admin::assign_member_handler))
        .route(
            "/admin/slots/{slot_id}/members/{member_id}",
            delete(admin::unassign_member_handler),
        )
        .layer(axum_middleware::from_fn(require_admin));

    Router::new()
        .merge(member_routes)
        .merge(admin_routes)
        .layer(axum_middleware::from_fn(require_identity))
        .with_state(app_state)
}
