use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::OverlapError;
use crate::models::task::{SchedulingMethod, TaskRecord};

/// Outer bound for automatic placement on one plan date, in local wall-clock time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkWindow {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub task_id: String,
    pub task_name: String,
    pub duration_minutes: i64,
    pub suggested_start: DateTime<FixedOffset>,
    pub suggested_end: DateTime<FixedOffset>,
    pub reasoning: String,
    pub score: f64,
    #[serde(default)]
    pub over_capacity_minutes: Option<i64>,
}

impl Suggestion {
    pub fn selection(&self) -> SuggestionSelection {
        SuggestionSelection {
            task_id: self.task_id.clone(),
            scheduled_start: self.suggested_start,
            scheduled_end: self.suggested_end,
        }
    }
}

/// The part of a suggestion the caller sends back when accepting it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionSelection {
    pub task_id: String,
    pub scheduled_start: DateTime<FixedOffset>,
    pub scheduled_end: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommittedPlacement {
    pub task_id: String,
    pub scheduled_start: DateTime<FixedOffset>,
    pub scheduled_end: DateTime<FixedOffset>,
    pub scheduling_method: SchedulingMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum ApplyOutcome {
    Committed {
        placement: CommittedPlacement,
    },
    #[serde(rename_all = "camelCase")]
    Skipped {
        task_id: String,
        error: OverlapError,
    },
}

impl ApplyOutcome {
    pub fn task_id(&self) -> &str {
        match self {
            ApplyOutcome::Committed { placement } => &placement.task_id,
            ApplyOutcome::Skipped { task_id, .. } => task_id,
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, ApplyOutcome::Committed { .. })
    }
}

/// Per-selection result of an apply batch, in submission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplyReport {
    pub outcomes: Vec<ApplyOutcome>,
}

impl ApplyReport {
    pub fn committed(&self) -> impl Iterator<Item = &CommittedPlacement> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ApplyOutcome::Committed { placement } => Some(placement),
            ApplyOutcome::Skipped { .. } => None,
        })
    }

    pub fn committed_count(&self) -> usize {
        self.committed().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.outcomes.len() - self.committed_count()
    }

    /// Human-readable outcome, e.g. "3 of 5 suggestions applied; 2 conflicted with existing events".
    pub fn summary(&self) -> String {
        let total = self.outcomes.len();
        let applied = self.committed_count();
        let skipped = total - applied;
        let noun = if total == 1 { "suggestion" } else { "suggestions" };
        if skipped == 0 {
            format!("{applied} of {total} {noun} applied")
        } else {
            format!(
                "{applied} of {total} {noun} applied; {skipped} conflicted with existing events"
            )
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DisplayBucket {
    #[serde(rename = "today")]
    Today,
    #[serde(rename = "tomorrow")]
    Tomorrow,
    #[serde(rename = "next-week")]
    NextWeek,
}

/// Tasks grouped the way the day view lists them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct TaskBuckets {
    pub today: Vec<TaskRecord>,
    pub tomorrow: Vec<TaskRecord>,
    pub next_week: Vec<TaskRecord>,
}

impl TaskBuckets {
    pub fn push(&mut self, bucket: DisplayBucket, task: TaskRecord) {
        match bucket {
            DisplayBucket::Today => self.today.push(task),
            DisplayBucket::Tomorrow => self.tomorrow.push(task),
            DisplayBucket::NextWeek => self.next_week.push(task),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlanRecord {
    pub id: String,
    pub plan_date: NaiveDate,
    pub work_hours_start: String,
    pub work_hours_end: String,
    pub shutdown_time: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DailyPlanRecord {
    pub fn work_window(&self) -> WorkWindow {
        WorkWindow {
            date: self.plan_date,
            start_time: self.work_hours_start.clone(),
            end_time: self.work_hours_end.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlanCreateInput {
    pub plan_date: Option<NaiveDate>,
    #[serde(default)]
    pub work_hours_start: Option<String>,
    #[serde(default)]
    pub work_hours_end: Option<String>,
    #[serde(default)]
    pub shutdown_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlanSuggestions {
    pub suggestions: Vec<Suggestion>,
    pub calendar_connected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ApplySuggestionsInput {
    pub suggestions: Vec<SuggestionSelection>,
}
