//! crates/club_schedule_core/src/policy.rs

/// Tunable club rules for the absence and makeup workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulePolicy {
    /// Days after the absent date during which a makeup may be chosen.
    pub makeup_window_days: u32,
    /// Makeups (selected or completed) allowed per member per calendar month.
    pub max_makeups_per_month: u32,
    pub max_occurrence_window_days: u32,
    pub max_reason_len: usize,
}

impl Default for SchedulePolicy {
    fn default() -> Self {
        Self {
            makeup_window_days: 7,
            max_makeups_per_month: 2,
            max_occurrence_window_days: 90,
            max_reason_len: 500,
        }
    }
}
