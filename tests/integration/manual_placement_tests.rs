use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use dayplan::db::DbPool;
use dayplan::error::{AppError, OccupiedSource};
use dayplan::models::calendar::BusyInterval;
use dayplan::models::task::{SchedulingMethod, TaskCreateInput, TaskRecord};
use dayplan::services::calendar_service::{CalendarProvider, StaticCalendarProvider};
use dayplan::services::planning_service::PlanningService;
use dayplan::services::settings_service::{SettingsService, SettingsUpdateInput};
use dayplan::services::task_service::TaskService;
use tempfile::tempdir;

fn setup(events: Vec<BusyInterval>) -> (tempfile::TempDir, Arc<TaskService>, Arc<SettingsService>, PlanningService) {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("manual.sqlite")).expect("db pool");
    let tasks = Arc::new(TaskService::new(pool.clone()));
    let settings = Arc::new(SettingsService::new(pool.clone()));
    let calendar: Arc<dyn CalendarProvider> = Arc::new(StaticCalendarProvider::new(events));
    let planning = PlanningService::new(pool, Arc::clone(&tasks), Arc::clone(&settings), calendar);
    (dir, tasks, settings, planning)
}

fn ts(value: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(value).expect("valid datetime")
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, day).expect("valid date")
}

fn new_task(tasks: &TaskService, name: &str) -> TaskRecord {
    tasks
        .create_task(TaskCreateInput {
            name: name.into(),
            duration_minutes: Some(60),
            plan_date: Some(date(1)),
            ..Default::default()
        })
        .expect("create task")
}

#[tokio::test]
async fn manual_placement_outside_work_hours_is_accepted() {
    let (_dir, tasks, _settings, planning) = setup(Vec::new());
    let task = new_task(&tasks, "Evening reading");

    let placed = planning
        .schedule_task_manually(&task.id, ts("2025-05-01T20:00:00+00:00"), ts("2025-05-01T21:00:00+00:00"))
        .await
        .expect("manual placement");

    assert_eq!(placed.scheduling_method, Some(SchedulingMethod::Manual));
    assert_eq!(placed.plan_date, Some(date(1)));
    let stored = tasks.get_task(&task.id).expect("task");
    assert_eq!(stored.scheduled_start, Some(ts("2025-05-01T20:00:00+00:00")));
}

#[tokio::test]
async fn manual_placement_rejects_overlaps_with_tasks_and_events() {
    let (_dir, tasks, _settings, planning) = setup(vec![BusyInterval::timed(
        "dentist",
        ts("2025-05-01T14:00:00+00:00"),
        ts("2025-05-01T15:00:00+00:00"),
    )]);
    let first = new_task(&tasks, "First");
    let second = new_task(&tasks, "Second");

    planning
        .schedule_task_manually(&first.id, ts("2025-05-01T09:00:00+00:00"), ts("2025-05-01T10:00:00+00:00"))
        .await
        .expect("first placement");

    let err = planning
        .schedule_task_manually(&second.id, ts("2025-05-01T09:30:00+00:00"), ts("2025-05-01T10:30:00+00:00"))
        .await
        .unwrap_err();
    let overlap = err.overlap_details().expect("overlap error");
    assert_eq!(overlap.conflicts[0].source, OccupiedSource::ScheduledTask);
    assert_eq!(overlap.conflicts[0].source_id.as_deref(), Some(first.id.as_str()));

    let err = planning
        .schedule_task_manually(&second.id, ts("2025-05-01T14:30:00+00:00"), ts("2025-05-01T15:30:00+00:00"))
        .await
        .unwrap_err();
    assert!(err.overlap_details().expect("overlap").conflicts_with_calendar());

    // moving a task over its own slot is fine
    planning
        .schedule_task_manually(&first.id, ts("2025-05-01T09:30:00+00:00"), ts("2025-05-01T10:30:00+00:00"))
        .await
        .expect("move within own slot");
    assert!(!tasks.get_task(&second.id).expect("task").is_scheduled());
}

#[tokio::test]
async fn manual_placement_validates_input() {
    let (_dir, tasks, _settings, planning) = setup(Vec::new());
    let task = new_task(&tasks, "Task");

    let inverted = planning
        .schedule_task_manually(&task.id, ts("2025-05-01T11:00:00+00:00"), ts("2025-05-01T10:00:00+00:00"))
        .await;
    assert!(inverted.unwrap_err().is_validation());

    let missing = planning
        .schedule_task_manually("missing", ts("2025-05-01T10:00:00+00:00"), ts("2025-05-01T11:00:00+00:00"))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound)));
}

#[tokio::test]
async fn placement_follows_local_date_of_configured_zone() {
    let (_dir, tasks, settings, planning) = setup(Vec::new());
    settings
        .update(SettingsUpdateInput {
            time_zone: Some("America/Los_Angeles".into()),
            ..Default::default()
        })
        .expect("update settings");
    let task = new_task(&tasks, "Late night");

    // 02:00 UTC on May 2 is still May 1 in Los Angeles
    let placed = planning
        .schedule_task_manually(&task.id, ts("2025-05-02T02:00:00+00:00"), ts("2025-05-02T03:00:00+00:00"))
        .await
        .expect("placement");
    assert_eq!(placed.plan_date, Some(date(1)));
}

#[tokio::test]
async fn defer_clears_placement_and_moves_plan_date() {
    let (_dir, tasks, _settings, planning) = setup(Vec::new());
    let task = new_task(&tasks, "Movable");
    planning
        .schedule_task_manually(&task.id, ts("2025-05-01T09:00:00+00:00"), ts("2025-05-01T10:00:00+00:00"))
        .await
        .expect("placement");

    let deferred = planning.defer_task(&task.id, date(6)).await.expect("defer");
    assert_eq!(deferred.plan_date, Some(date(6)));
    assert!(!deferred.is_scheduled());
    assert_eq!(deferred.scheduling_method, None);

    let stored = tasks.get_task(&task.id).expect("task");
    assert_eq!(stored, deferred);
    assert!(tasks.list_for_plan_date(date(1)).expect("list").is_empty());
    assert_eq!(tasks.list_for_plan_date(date(6)).expect("list").len(), 1);
}

#[tokio::test]
async fn tasks_are_bucketed_by_start_day() {
    let (_dir, tasks, _settings, planning) = setup(Vec::new());
    let unscheduled = new_task(&tasks, "Unscheduled");
    let today = new_task(&tasks, "Today");
    let tomorrow = new_task(&tasks, "Tomorrow");
    let monday = new_task(&tasks, "Monday");
    let saturday = new_task(&tasks, "Saturday");

    for (task, start, end) in [
        (&today, "2025-05-01T09:00:00+00:00", "2025-05-01T10:00:00+00:00"),
        (&tomorrow, "2025-05-02T09:00:00+00:00", "2025-05-02T10:00:00+00:00"),
        (&monday, "2025-05-05T09:00:00+00:00", "2025-05-05T10:00:00+00:00"),
        (&saturday, "2025-05-03T09:00:00+00:00", "2025-05-03T10:00:00+00:00"),
    ] {
        planning
            .schedule_task_manually(&task.id, ts(start), ts(end))
            .await
            .expect("placement");
    }

    // 2025-05-01 is a Thursday
    let buckets = planning.tasks_by_bucket(date(1)).expect("buckets");
    let names = |list: &[TaskRecord]| {
        let mut names: Vec<String> = list.iter().map(|task| task.name.clone()).collect();
        names.sort();
        names
    };
    assert_eq!(names(&buckets.today), vec!["Saturday", "Today", "Unscheduled"]);
    assert_eq!(names(&buckets.tomorrow), vec!["Tomorrow"]);
    assert_eq!(names(&buckets.next_week), vec!["Monday"]);
    assert!(buckets.today.iter().any(|task| task.id == unscheduled.id));
}
