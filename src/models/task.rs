use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// Rank given to tasks without a priority; sorts after every named level.
pub const NO_PRIORITY_RANK: i64 = 4;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskPriority {
    Urgent,
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub fn rank(self) -> i64 {
        match self {
            TaskPriority::Urgent => 0,
            TaskPriority::High => 1,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskPriority::Urgent => "urgent",
            TaskPriority::High => "high",
            TaskPriority::Medium => "medium",
            TaskPriority::Low => "low",
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskPriority {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "urgent" => Ok(TaskPriority::Urgent),
            "high" => Ok(TaskPriority::High),
            "medium" => Ok(TaskPriority::Medium),
            "low" => Ok(TaskPriority::Low),
            other => Err(AppError::validation(format!("unknown priority: {other}"))),
        }
    }
}

/// Provenance of a task's current placement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SchedulingMethod {
    #[serde(rename = "manual")]
    Manual,
    #[serde(rename = "auto-suggested")]
    AutoSuggested,
}

impl SchedulingMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SchedulingMethod::Manual => "manual",
            SchedulingMethod::AutoSuggested => "auto-suggested",
        }
    }
}

impl FromStr for SchedulingMethod {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "manual" => Ok(SchedulingMethod::Manual),
            "auto-suggested" => Ok(SchedulingMethod::AutoSuggested),
            other => Err(AppError::validation(format!(
                "unknown scheduling method: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub due_at: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub plan_date: Option<NaiveDate>,
    #[serde(default)]
    pub scheduled_start: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub scheduled_end: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub scheduling_method: Option<SchedulingMethod>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRecord {
    pub fn priority_rank(&self) -> i64 {
        self.priority
            .map(TaskPriority::rank)
            .unwrap_or(NO_PRIORITY_RANK)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled_start.is_some()
    }

    /// Both ends of the placement, when the task is fully placed.
    pub fn placement(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        match (self.scheduled_start, self.scheduled_end) {
            (Some(start), Some(end)) => Some((start, end)),
            _ => None,
        }
    }

    pub fn clear_placement(&mut self) {
        self.scheduled_start = None;
        self.scheduled_end = None;
        self.scheduling_method = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskCreateInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub plan_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdateInput {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub duration_minutes: Option<Option<i64>>,
    #[serde(default)]
    pub priority: Option<Option<String>>,
    #[serde(default)]
    pub due_at: Option<Option<String>>,
    #[serde(default)]
    pub plan_date: Option<Option<NaiveDate>>,
}

pub fn parse_priority_opt(value: Option<&str>) -> AppResult<Option<TaskPriority>> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw.parse().map(Some),
    }
}
