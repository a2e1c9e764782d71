//! Shared fixtures for the REST handler tests.

use std::sync::Arc;

use axum::{
    body::to_bytes,
    response::{IntoResponse, Response},
};
use api_lib::web::state::AppState;
use chrono::{NaiveDate, NaiveTime};
use club_schedule_core::{
    Actor, ClassSlot, FixedClock, InMemoryStore, NewClassSlot, SchedulePolicy,
};
use serde_json::Value;
use uuid::Uuid;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub clock: Arc<FixedClock>,
    pub admin: Actor,
    pub program_id: Uuid,
}

impl TestApp {
    pub fn opening_on(today: NaiveDate) -> Self {
        let clock = Arc::new(FixedClock::on(today));
        let store = Arc::new(InMemoryStore::new());
        let state = Arc::new(AppState::new(store, clock.clone(), SchedulePolicy::default()));
        Self {
            state,
            clock,
            admin: Actor::admin(Uuid::new_v4()),
            program_id: Uuid::new_v4(),
        }
    }

    pub async fn slot(&self, day: &str, hour: u32, capacity: u32) -> ClassSlot {
        self.state
            .schedule
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
        self.state
            .schedule
            .assign_member(&self.admin, slot.id, member.member_id)
            .await
            .expect("member should be assigned");
        member
    }
}

/// Resolves a handler result into its status and JSON body.
pub async fn respond<R, E>(result: Result<R, E>) -> (u16, Value)
where
    R: IntoResponse,
    E: IntoResponse,
{
    let response: Response = match result {
        Ok(ok) => ok.into_response(),
        Err(err) => err.into_response(),
    };
    let status = response.status().as_u16();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be JSON")
    };
    (status, body)
}
