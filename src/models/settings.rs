use serde::{Deserialize, Serialize};

pub const DEFAULT_WORKDAY_START: &str = "09:00";
pub const DEFAULT_WORKDAY_END: &str = "17:00";
pub const DEFAULT_SHUTDOWN_TIME: &str = "17:00";
pub const DEFAULT_TIME_ZONE: &str = "UTC";
pub const DEFAULT_TASK_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub workday_start: String,
    pub workday_end: String,
    /// Only drives over-capacity warnings, never placement.
    pub shutdown_time: String,
    pub time_zone: String,
    /// Estimate used for tasks that were never given a duration.
    pub default_task_minutes: i64,
    pub updated_at: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            workday_start: DEFAULT_WORKDAY_START.to_string(),
            workday_end: DEFAULT_WORKDAY_END.to_string(),
            shutdown_time: DEFAULT_SHUTDOWN_TIME.to_string(),
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            default_task_minutes: DEFAULT_TASK_MINUTES,
            updated_at: String::new(),
        }
    }
}
