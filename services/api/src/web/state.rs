//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use std::sync::Arc;

use club_schedule_core::{Clock, DatabaseService, SchedulePolicy, ScheduleService};

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub schedule: Arc<ScheduleService>,
}

impl AppState {
    pub fn new(db: Arc<dyn DatabaseService>, clock: Arc<dyn Clock>, policy: SchedulePolicy) -> Self {
        Self {
            schedule: Arc::new(ScheduleService::new(db, clock, policy)),
        }
    }
}
