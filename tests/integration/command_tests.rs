use std::sync::Arc;

use chrono::NaiveDate;
use dayplan::commands::planning::{
    apply_suggestions, daily_plan_create, daily_plan_get, get_suggestions_for_daily_plan,
    task_defer, task_schedule_manual, tasks_by_bucket, DeferTaskPayload, ManualPlacementPayload,
};
use dayplan::commands::settings::{settings_get, settings_update};
use dayplan::commands::task::{tasks_create, tasks_delete, tasks_get, tasks_list, tasks_update};
use dayplan::commands::AppState;
use dayplan::db::DbPool;
use dayplan::models::calendar::BusyInterval;
use dayplan::models::planning::{ApplySuggestionsInput, DailyPlanCreateInput, SuggestionSelection};
use dayplan::models::task::{TaskCreateInput, TaskUpdateInput};
use dayplan::services::calendar_service::StaticCalendarProvider;
use dayplan::services::schedule_utils::parse_datetime;
use dayplan::services::settings_service::SettingsUpdateInput;
use tempfile::tempdir;

fn state_with(events: Vec<BusyInterval>) -> (tempfile::TempDir, AppState) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("commands.sqlite")).expect("db pool");
    let state = AppState::with_calendar(pool, Arc::new(StaticCalendarProvider::new(events)))
        .expect("app state");
    (dir, state)
}

fn far_future_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2099, 3, 2).expect("valid date")
}

#[tokio::test]
async fn task_crud_round_trip() {
    let (_dir, state) = state_with(Vec::new());

    let created = tasks_create(
        &state,
        TaskCreateInput {
            name: "Prepare slides".into(),
            duration_minutes: Some(90),
            priority: Some("medium".into()),
            ..Default::default()
        },
    )
    .await
    .expect("create");

    let updated = tasks_update(
        &state,
        created.id.clone(),
        TaskUpdateInput {
            description: Some(Some("for the quarterly review".into())),
            ..Default::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.description.as_deref(), Some("for the quarterly review"));

    assert_eq!(tasks_list(&state).await.expect("list").len(), 1);
    tasks_delete(&state, created.id.clone()).await.expect("delete");

    let err = tasks_get(&state, created.id).await.unwrap_err();
    assert_eq!(err.code, "NOT_FOUND");
}

#[tokio::test]
async fn suggestions_and_apply_through_commands() {
    let (_dir, state) = state_with(vec![BusyInterval::timed(
        "kickoff",
        parse_datetime("2099-03-02T09:00:00+00:00").expect("start"),
        parse_datetime("2099-03-02T10:00:00+00:00").expect("end"),
    )]);

    let task = tasks_create(
        &state,
        TaskCreateInput {
            name: "Draft proposal".into(),
            duration_minutes: Some(120),
            priority: Some("urgent".into()),
            plan_date: Some(far_future_date()),
            ..Default::default()
        },
    )
    .await
    .expect("create task");

    let plan = daily_plan_create(
        &state,
        DailyPlanCreateInput {
            plan_date: Some(far_future_date()),
            work_hours_start: Some("08:00".into()),
            ..Default::default()
        },
    )
    .await
    .expect("create plan");
    assert_eq!(plan.work_hours_start, "08:00");
    assert_eq!(plan.work_hours_end, "17:00");
    assert_eq!(daily_plan_get(&state, plan.id.clone()).await.expect("get plan"), plan);

    let duplicate = daily_plan_create(
        &state,
        DailyPlanCreateInput {
            plan_date: Some(far_future_date()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(duplicate.code, "CONFLICT");

    let result = get_suggestions_for_daily_plan(&state, plan.id.clone())
        .await
        .expect("suggestions");
    assert!(result.calendar_connected);
    assert_eq!(result.suggestions.len(), 1);
    let suggestion = &result.suggestions[0];
    assert_eq!(suggestion.task_id, task.id);
    assert_eq!(
        suggestion.suggested_start,
        parse_datetime("2099-03-02T10:00:00+00:00").expect("start")
    );

    let response = apply_suggestions(
        &state,
        ApplySuggestionsInput {
            suggestions: vec![suggestion.selection()],
        },
    )
    .await
    .expect("apply");
    assert_eq!(response.summary, "1 of 1 suggestion applied");

    let json = serde_json::to_value(&response).expect("serialize");
    assert_eq!(json["outcomes"][0]["status"], "committed");
    assert_eq!(
        json["outcomes"][0]["placement"]["schedulingMethod"],
        "auto-suggested"
    );
}

#[tokio::test]
async fn command_errors_carry_codes() {
    let (_dir, state) = state_with(Vec::new());
    let task = tasks_create(
        &state,
        TaskCreateInput {
            name: "Anchor".into(),
            duration_minutes: Some(60),
            ..Default::default()
        },
    )
    .await
    .expect("create");
    let other = tasks_create(
        &state,
        TaskCreateInput {
            name: "Other".into(),
            duration_minutes: Some(60),
            ..Default::default()
        },
    )
    .await
    .expect("create");

    task_schedule_manual(
        &state,
        ManualPlacementPayload {
            task_id: task.id.clone(),
            scheduled_start: "2099-03-02T09:00:00+00:00".into(),
            scheduled_end: "2099-03-02T10:00:00+00:00".into(),
        },
    )
    .await
    .expect("placement");

    let overlap = task_schedule_manual(
        &state,
        ManualPlacementPayload {
            task_id: other.id.clone(),
            scheduled_start: "2099-03-02T09:30:00+00:00".into(),
            scheduled_end: "2099-03-02T10:30:00+00:00".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(overlap.code, "OVERLAP");
    let details = overlap.details.expect("overlap details");
    assert_eq!(details["conflicts"][0]["sourceId"], task.id.as_str());
    assert_eq!(details["conflicts"][0]["source"], "scheduledTask");

    let invalid = task_schedule_manual(
        &state,
        ManualPlacementPayload {
            task_id: other.id.clone(),
            scheduled_start: "next tuesday".into(),
            scheduled_end: "2099-03-02T10:30:00+00:00".into(),
        },
    )
    .await
    .unwrap_err();
    assert_eq!(invalid.code, "VALIDATION_ERROR");

    let bad_selection = apply_suggestions(
        &state,
        ApplySuggestionsInput {
            suggestions: vec![SuggestionSelection {
                task_id: other.id.clone(),
                scheduled_start: parse_datetime("2099-03-02T12:00:00+00:00").expect("start"),
                scheduled_end: parse_datetime("2099-03-02T11:00:00+00:00").expect("end"),
            }],
        },
    )
    .await
    .unwrap_err();
    assert_eq!(bad_selection.code, "VALIDATION_ERROR");

    let missing = get_suggestions_for_daily_plan(&state, "nope".into())
        .await
        .unwrap_err();
    assert_eq!(missing.code, "NOT_FOUND");
}

#[tokio::test]
async fn defer_and_bucket_through_commands() {
    let (_dir, state) = state_with(Vec::new());
    let task = tasks_create(
        &state,
        TaskCreateInput {
            name: "Later".into(),
            duration_minutes: Some(30),
            plan_date: NaiveDate::from_ymd_opt(2099, 3, 2),
            ..Default::default()
        },
    )
    .await
    .expect("create");

    let deferred = task_defer(
        &state,
        DeferTaskPayload {
            task_id: task.id.clone(),
            target_date: NaiveDate::from_ymd_opt(2099, 3, 9).expect("date"),
        },
    )
    .await
    .expect("defer");
    assert_eq!(deferred.plan_date, NaiveDate::from_ymd_opt(2099, 3, 9));

    let buckets = tasks_by_bucket(&state, NaiveDate::from_ymd_opt(2099, 3, 2))
        .await
        .expect("buckets");
    assert_eq!(buckets.today.len(), 1);
    assert!(buckets.tomorrow.is_empty());
}

#[tokio::test]
async fn settings_commands_validate_and_persist() {
    let (_dir, state) = state_with(Vec::new());

    let updated = settings_update(
        &state,
        SettingsUpdateInput {
            workday_end: Some("18:30".into()),
            default_task_minutes: Some(25),
            ..Default::default()
        },
    )
    .await
    .expect("update");
    assert_eq!(updated.workday_end, "18:30");

    let fetched = settings_get(&state).await.expect("get");
    assert_eq!(fetched.default_task_minutes, 25);

    let err = settings_update(
        &state,
        SettingsUpdateInput {
            time_zone: Some("Nowhere/Special".into()),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert_eq!(err.code, "VALIDATION_ERROR");
}
