//! services/api/src/sweeper.rs
//!
//! The background worker that expires approved absences whose makeup deadline
//! has passed.

use std::sync::Arc;
use std::time::Duration;

use club_schedule_core::ScheduleService;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Runs the deadline sweep every `every` until `cancellation_token` fires.
///
/// The first sweep runs immediately. A failed sweep is logged and retried on the
/// next tick.
pub async fn run_sweeper(
    schedule: Arc<ScheduleService>,
    every: Duration,
    cancellation_token: CancellationToken,
) {
    info!(interval_secs = every.as_secs(), "Deadline sweeper started.");
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancellation_token.cancelled() => {
                info!("Deadline sweeper stopped.");
                return;
            }
            _ = ticker.tick() => {
                match schedule.sweep_expired_deadlines().await {
                    Ok(0) => debug!("No makeup deadlines expired."),
                    Ok(expired) => info!(expired, "Expired overdue absences."),
                    Err(e) => error!("Deadline sweep failed: {}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use club_schedule_core::{
        Actor, AbsenceStatus, FixedClock, InMemoryStore, NewClassSlot, SchedulePolicy,
    };
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn sweeper_expires_overdue_absences_until_cancelled() {
        let clock = Arc::new(FixedClock::on(date(2024, 6, 1)));
        let schedule = Arc::new(ScheduleService::new(
            Arc::new(InMemoryStore::new()),
            clock.clone(),
            SchedulePolicy::default(),
        ));
        let admin = Actor::admin(Uuid::new_v4());
        let member = Actor::member(Uuid::new_v4());

        // 2024-06-03 is a Monday.
        let slot = schedule
            .create_slot(
                &admin,
                NewClassSlot {
                    program_id: Uuid::new_v4(),
                    coach_id: None,
                    day_of_week: "Monday".to_string(),
                    start_time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap(),
                    capacity: 10,
                    label: "Monday Juniors".to_string(),
                },
            )
            .await
            .unwrap();
        schedule
            .assign_member(&admin, slot.id, member.member_id)
            .await
            .unwrap();
        let absence = schedule
            .report_absence(&member, slot.id, date(2024, 6, 3), None)
            .await
            .unwrap();
        schedule
            .approve_absence(&admin, absence.id, None)
            .await
            .unwrap();

        clock.set_date(date(2024, 6, 11));

        let token = CancellationToken::new();
        let handle = tokio::spawn(run_sweeper(
            schedule.clone(),
            Duration::from_millis(10),
            token.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap();

        let absences = schedule.list_absences(&member).await.unwrap();
        assert_eq!(absences[0].status(), AbsenceStatus::Expired);
    }

    #[tokio::test]
    async fn sweeper_stops_promptly_when_cancelled() {
        let schedule = Arc::new(ScheduleService::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(FixedClock::on(date(2024, 6, 1))),
            SchedulePolicy::default(),
        ));
        let token = CancellationToken::new();
        token.cancel();
        tokio::time::timeout(
            Duration::from_secs(1),
            run_sweeper(schedule, Duration::from_secs(3600), token),
        )
        .await
        .expect("sweeper should exit once cancelled");
    }
}
