use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate};
use dayplan::db::DbPool;
use dayplan::error::{AppError, OccupiedSource};
use dayplan::models::calendar::BusyInterval;
use dayplan::models::planning::{
    ApplyOutcome, ApplySuggestionsInput, DailyPlanCreateInput, SuggestionSelection,
};
use dayplan::models::task::{SchedulingMethod, TaskCreateInput, TaskRecord};
use dayplan::services::calendar_service::{CalendarProvider, StaticCalendarProvider};
use dayplan::services::planning_service::PlanningService;
use dayplan::services::settings_service::SettingsService;
use dayplan::services::task_service::TaskService;
use tempfile::tempdir;

struct Harness {
    _dir: tempfile::TempDir,
    tasks: Arc<TaskService>,
    calendar: Arc<StaticCalendarProvider>,
    planning: PlanningService,
}

fn harness(events: Vec<BusyInterval>) -> Harness {
    let dir = tempdir().expect("temp dir");
    let pool = DbPool::new(dir.path().join("planning.sqlite")).expect("db pool");
    let tasks = Arc::new(TaskService::new(pool.clone()));
    let settings = Arc::new(SettingsService::new(pool.clone()));
    let calendar = Arc::new(StaticCalendarProvider::new(events));
    let provider: Arc<dyn CalendarProvider> = calendar.clone();
    let planning = PlanningService::new(pool, Arc::clone(&tasks), settings, provider);
    Harness {
        _dir: dir,
        tasks,
        calendar,
        planning,
    }
}

fn plan_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 1).expect("plan date")
}

fn at(hour: u32, minute: u32) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(&format!("2025-05-01T{hour:02}:{minute:02}:00+00:00"))
        .expect("valid datetime")
}

fn day_before() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2025-04-30T12:00:00+00:00").expect("valid datetime")
}

fn create_task(
    service: &TaskService,
    name: &str,
    minutes: Option<i64>,
    priority: Option<&str>,
) -> TaskRecord {
    service
        .create_task(TaskCreateInput {
            name: name.into(),
            duration_minutes: minutes,
            priority: priority.map(str::to_string),
            plan_date: Some(plan_date()),
            ..Default::default()
        })
        .expect("create task")
}

fn create_plan(planning: &PlanningService) -> String {
    planning
        .create_daily_plan(DailyPlanCreateInput {
            plan_date: Some(plan_date()),
            ..Default::default()
        })
        .expect("create plan")
        .id
}

#[tokio::test]
async fn suggest_then_apply_places_tasks_around_calendar() {
    let h = harness(vec![BusyInterval::timed("standup", at(9, 30), at(10, 30))]);
    let review = create_task(&h.tasks, "Review PR", Some(60), Some("high"));
    let inbox = create_task(&h.tasks, "Inbox zero", None, None);
    let hotfix = create_task(&h.tasks, "Hotfix", Some(30), Some("urgent"));
    let plan_id = create_plan(&h.planning);

    let result = h
        .planning
        .get_suggestions_for_daily_plan(&plan_id, day_before())
        .await
        .expect("suggestions");

    assert!(result.calendar_connected);
    let placed: Vec<(&str, DateTime<FixedOffset>, DateTime<FixedOffset>)> = result
        .suggestions
        .iter()
        .map(|s| (s.task_id.as_str(), s.suggested_start, s.suggested_end))
        .collect();
    assert_eq!(
        placed,
        vec![
            (hotfix.id.as_str(), at(9, 0), at(9, 30)),
            (review.id.as_str(), at(10, 30), at(11, 30)),
            (inbox.id.as_str(), at(11, 30), at(12, 30)),
        ]
    );
    assert_eq!(result.suggestions[2].duration_minutes, 60);

    let report = h
        .planning
        .apply_suggestions(ApplySuggestionsInput {
            suggestions: result.suggestions.iter().map(|s| s.selection()).collect(),
        })
        .await
        .expect("apply");
    assert_eq!(report.committed_count(), 3);
    assert_eq!(report.summary(), "3 of 3 suggestions applied");

    let stored = h.tasks.get_task(&review.id).expect("task");
    assert_eq!(stored.placement(), Some((at(10, 30), at(11, 30))));
    assert_eq!(stored.scheduling_method, Some(SchedulingMethod::AutoSuggested));

    let again = h
        .planning
        .get_suggestions_for_daily_plan(&plan_id, day_before())
        .await
        .expect("suggestions");
    assert!(again.suggestions.is_empty());
}

#[tokio::test]
async fn apply_skips_selections_that_became_busy() {
    let h = harness(Vec::new());
    create_task(&h.tasks, "Write doc", Some(60), Some("high"));
    create_task(&h.tasks, "Email", Some(30), Some("medium"));
    create_task(&h.tasks, "Plan sprint", Some(60), Some("low"));
    let plan_id = create_plan(&h.planning);

    let result = h
        .planning
        .get_suggestions_for_daily_plan(&plan_id, day_before())
        .await
        .expect("suggestions");
    assert_eq!(result.suggestions.len(), 3);

    // an invite lands on the second suggestion between suggest and apply
    h.calendar
        .replace_events(vec![BusyInterval::timed("invite", at(10, 0), at(10, 15))])
        .await;

    let report = h
        .planning
        .apply_suggestions(ApplySuggestionsInput {
            suggestions: result.suggestions.iter().map(|s| s.selection()).collect(),
        })
        .await
        .expect("apply");

    assert_eq!(
        report.summary(),
        "2 of 3 suggestions applied; 1 conflicted with existing events"
    );
    match &report.outcomes[1] {
        ApplyOutcome::Skipped { error, .. } => {
            assert!(error.conflicts_with_calendar());
            assert_eq!(error.conflicts[0].source, OccupiedSource::CalendarEvent);
        }
        other => panic!("expected skipped outcome, got {other:?}"),
    }
    let skipped = h.tasks.get_task(report.outcomes[1].task_id()).expect("task");
    assert!(!skipped.is_scheduled());
}

#[tokio::test]
async fn stale_suggestion_does_not_replace_manual_move() {
    let h = harness(Vec::new());
    let report_task = create_task(&h.tasks, "Quarterly report", Some(60), Some("high"));
    let email = create_task(&h.tasks, "Email", Some(30), Some("low"));
    let plan_id = create_plan(&h.planning);

    let result = h
        .planning
        .get_suggestions_for_daily_plan(&plan_id, day_before())
        .await
        .expect("suggestions");
    assert_eq!(result.suggestions[0].task_id, report_task.id);
    assert_eq!(result.suggestions[0].suggested_start, at(9, 0));

    // the user drags the report elsewhere before accepting the suggestions
    h.planning
        .schedule_task_manually(&report_task.id, at(14, 0), at(15, 0))
        .await
        .expect("manual move");

    let report = h
        .planning
        .apply_suggestions(ApplySuggestionsInput {
            suggestions: result.suggestions.iter().map(|s| s.selection()).collect(),
        })
        .await
        .expect("apply");

    assert_eq!(
        report.summary(),
        "1 of 2 suggestions applied; 1 conflicted with existing events"
    );
    match &report.outcomes[0] {
        ApplyOutcome::Skipped { task_id, error } => {
            assert_eq!(task_id, &report_task.id);
            assert_eq!(error.conflicts[0].source, OccupiedSource::ScheduledTask);
            assert_eq!(error.conflicts[0].start, at(14, 0));
        }
        other => panic!("expected skipped outcome, got {other:?}"),
    }

    let stored = h.tasks.get_task(&report_task.id).expect("task");
    assert_eq!(stored.placement(), Some((at(14, 0), at(15, 0))));
    assert_eq!(stored.scheduling_method, Some(SchedulingMethod::Manual));
    assert!(h.tasks.get_task(&email.id).expect("task").is_scheduled());
}

#[tokio::test]
async fn calendar_failure_falls_back_to_tasks_only() {
    let h = harness(vec![BusyInterval::timed("standup", at(9, 0), at(10, 0))]);
    create_task(&h.tasks, "Deep work", Some(60), None);
    let plan_id = create_plan(&h.planning);
    h.calendar.set_failure(Some("token revoked".into())).await;

    let result = h
        .planning
        .get_suggestions_for_daily_plan(&plan_id, day_before())
        .await
        .expect("suggestions");

    assert!(!result.calendar_connected);
    assert_eq!(result.suggestions[0].suggested_start, at(9, 0));
}

#[tokio::test]
async fn elapsed_part_of_today_is_skipped() {
    let h = harness(Vec::new());
    create_task(&h.tasks, "Afternoon task", Some(45), None);
    let plan_id = create_plan(&h.planning);

    let now = DateTime::parse_from_rfc3339("2025-05-01T13:09:10+00:00").expect("now");
    let result = h
        .planning
        .get_suggestions_for_daily_plan(&plan_id, now)
        .await
        .expect("suggestions");

    assert_eq!(result.suggestions[0].suggested_start, at(13, 10));
    assert_eq!(result.suggestions[0].suggested_end, at(13, 55));
}

#[tokio::test]
async fn unknown_plan_or_task_is_not_found() {
    let h = harness(Vec::new());
    let task = create_task(&h.tasks, "Real", Some(30), None);

    let missing_plan = h
        .planning
        .get_suggestions_for_daily_plan("no-such-plan", day_before())
        .await;
    assert!(matches!(missing_plan, Err(AppError::NotFound)));

    let result = h
        .planning
        .apply_suggestions(ApplySuggestionsInput {
            suggestions: vec![
                SuggestionSelection {
                    task_id: task.id.clone(),
                    scheduled_start: at(9, 0),
                    scheduled_end: at(9, 30),
                },
                SuggestionSelection {
                    task_id: "ghost".into(),
                    scheduled_start: at(10, 0),
                    scheduled_end: at(10, 30),
                },
            ],
        })
        .await;
    assert!(matches!(result, Err(AppError::NotFound)));
    assert!(!h.tasks.get_task(&task.id).expect("task").is_scheduled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_applies_never_double_book() {
    let h = harness(Vec::new());
    let first = create_task(&h.tasks, "First", Some(60), None);
    let second = create_task(&h.tasks, "Second", Some(60), None);

    let selection = |task: &TaskRecord| ApplySuggestionsInput {
        suggestions: vec![SuggestionSelection {
            task_id: task.id.clone(),
            scheduled_start: at(9, 0),
            scheduled_end: at(10, 0),
        }],
    };

    let planning_a = h.planning.clone();
    let planning_b = h.planning.clone();
    let input_a = selection(&first);
    let input_b = selection(&second);
    let (a, b) = tokio::join!(
        tokio::spawn(async move { planning_a.apply_suggestions(input_a).await }),
        tokio::spawn(async move { planning_b.apply_suggestions(input_b).await }),
    );
    let a = a.expect("join").expect("apply a");
    let b = b.expect("join").expect("apply b");

    assert_eq!(a.committed_count() + b.committed_count(), 1);
    let scheduled = h.tasks.list_scheduled().expect("scheduled");
    assert_eq!(scheduled.len(), 1);
}
