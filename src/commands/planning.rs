use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::planning::{
    ApplyReport, ApplySuggestionsInput, DailyPlanCreateInput, DailyPlanRecord,
    DailyPlanSuggestions, TaskBuckets,
};
use crate::models::task::TaskRecord;
use crate::services::schedule_utils;

use super::{run_blocking, AppState, CommandResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualPlacementPayload {
    pub task_id: String,
    pub scheduled_start: String,
    pub scheduled_end: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeferTaskPayload {
    pub task_id: String,
    pub target_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplySuggestionsResponse {
    #[serde(flatten)]
    pub report: ApplyReport,
    pub summary: String,
}

pub async fn daily_plan_create(
    state: &AppState,
    payload: DailyPlanCreateInput,
) -> CommandResult<DailyPlanRecord> {
    let state = state.clone();
    run_blocking(move || state.planning().create_daily_plan(payload)).await
}

pub async fn daily_plan_get(state: &AppState, plan_id: String) -> CommandResult<DailyPlanRecord> {
    let state = state.clone();
    run_blocking(move || state.planning().get_daily_plan(&plan_id)).await
}

pub async fn get_suggestions_for_daily_plan(
    state: &AppState,
    daily_plan_id: String,
) -> CommandResult<DailyPlanSuggestions> {
    let now = Utc::now().fixed_offset();
    debug!(target: "app::command", plan_id = %daily_plan_id, "suggestions requested");
    Ok(state
        .planning()
        .get_suggestions_for_daily_plan(&daily_plan_id, now)
        .await?)
}

pub async fn apply_suggestions(
    state: &AppState,
    payload: ApplySuggestionsInput,
) -> CommandResult<ApplySuggestionsResponse> {
    let report = state.planning().apply_suggestions(payload).await?;
    let summary = report.summary();
    Ok(ApplySuggestionsResponse { report, summary })
}

pub async fn task_schedule_manual(
    state: &AppState,
    payload: ManualPlacementPayload,
) -> CommandResult<TaskRecord> {
    let start = schedule_utils::parse_datetime(&payload.scheduled_start)?;
    let end = schedule_utils::parse_datetime(&payload.scheduled_end)?;
    Ok(state
        .planning()
        .schedule_task_manually(&payload.task_id, start, end)
        .await?)
}

pub async fn task_defer(state: &AppState, payload: DeferTaskPayload) -> CommandResult<TaskRecord> {
    Ok(state
        .planning()
        .defer_task(&payload.task_id, payload.target_date)
        .await?)
}

/// Groups all tasks for display; `today` defaults to the current date in the configured zone.
pub async fn tasks_by_bucket(
    state: &AppState,
    today: Option<NaiveDate>,
) -> CommandResult<TaskBuckets> {
    let state = state.clone();
    run_blocking(move || {
        let today = match today {
            Some(date) => date,
            None => {
                let settings = state.settings().get()?;
                let tz = schedule_utils::parse_time_zone(&settings.time_zone)?;
                schedule_utils::local_date_of(Utc::now().fixed_offset(), tz)
            }
        };
        state.planning().tasks_by_bucket(today)
    })
    .await
}
