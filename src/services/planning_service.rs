use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use chrono_tz::Tz;
use serde_json::json;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::repositories::daily_plan_repository::{DailyPlanRepository, DailyPlanRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::calendar::BusyInterval;
use crate::models::planning::{
    ApplyReport, ApplySuggestionsInput, DailyPlanCreateInput, DailyPlanRecord,
    DailyPlanSuggestions, TaskBuckets,
};
use crate::models::settings::AppSettings;
use crate::models::task::TaskRecord;
use crate::services::calendar_service::CalendarProvider;
use crate::services::schedule_utils;
use crate::services::settings_service::SettingsService;
use crate::services::slot_scheduler::{PlacementContext, SchedulingInput, SlotScheduler};
use crate::services::task_service::TaskService;

/// One async mutex per plan date.
///
/// Callers that need several dates lock them in ascending order.
#[derive(Default)]
struct DateLocks {
    locks: StdMutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

impl DateLocks {
    async fn acquire(&self, dates: &BTreeSet<NaiveDate>) -> AppResult<Vec<OwnedMutexGuard<()>>> {
        let handles: Vec<Arc<Mutex<()>>> = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| AppError::other("plan date lock table poisoned"))?;
            dates
                .iter()
                .map(|date| locks.entry(*date).or_default().clone())
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }
        debug!(target: "app::planning", dates = ?dates, "plan dates locked");
        Ok(guards)
    }
}

/// Busy time fetched from the calendar, with the provider's reachability.
struct CalendarSnapshot {
    busy_intervals: Vec<BusyInterval>,
    connected: bool,
}

#[derive(Clone)]
pub struct PlanningService {
    db: DbPool,
    task_service: Arc<TaskService>,
    settings_service: Arc<SettingsService>,
    calendar: Arc<dyn CalendarProvider>,
    scheduler: SlotScheduler,
    date_locks: Arc<DateLocks>,
}

impl PlanningService {
    pub fn new(
        db: DbPool,
        task_service: Arc<TaskService>,
        settings_service: Arc<SettingsService>,
        calendar: Arc<dyn CalendarProvider>,
    ) -> Self {
        Self {
            db,
            task_service,
            settings_service,
            calendar,
            scheduler: SlotScheduler::new(),
            date_locks: Arc::new(DateLocks::default()),
        }
    }

    /// Creates the plan for a date, filling unset hours from the saved settings.
    pub fn create_daily_plan(&self, input: DailyPlanCreateInput) -> AppResult<DailyPlanRecord> {
        let plan_date = input
            .plan_date
            .ok_or_else(|| AppError::validation("plan date is required"))?;
        let settings = self.settings_service.get()?;

        let work_hours_start =
            normalize_clock_or(input.work_hours_start.as_deref(), &settings.workday_start)?;
        let work_hours_end =
            normalize_clock_or(input.work_hours_end.as_deref(), &settings.workday_end)?;
        let shutdown_time =
            normalize_clock_or(input.shutdown_time.as_deref(), &settings.shutdown_time)?;

        if work_hours_start >= work_hours_end {
            return Err(AppError::validation_with_details(
                "work hours must start before they end",
                json!({"workHoursStart": work_hours_start, "workHoursEnd": work_hours_end}),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let record = DailyPlanRecord {
            id: Uuid::new_v4().to_string(),
            plan_date,
            work_hours_start,
            work_hours_end,
            shutdown_time,
            created_at: now.clone(),
            updated_at: now,
        };

        let row = DailyPlanRow::from_record(&record);
        self.db.with_connection(|conn| {
            if DailyPlanRepository::find_by_date(conn, plan_date)?.is_some() {
                return Err(AppError::conflict(format!(
                    "a daily plan already exists for {plan_date}"
                )));
            }
            DailyPlanRepository::insert(conn, &row)
        })?;

        info!(target: "app::planning", plan_id = %record.id, date = %plan_date, "daily plan created");
        Ok(record)
    }

    pub fn get_daily_plan(&self, plan_id: &str) -> AppResult<DailyPlanRecord> {
        self.db
            .with_connection(|conn| DailyPlanRepository::find_by_id(conn, plan_id))?
            .ok_or_else(AppError::not_found)?
            .into_record()
    }

    /// Read-only suggestion pass over one daily plan; nothing is persisted.
    pub async fn get_suggestions_for_daily_plan(
        &self,
        plan_id: &str,
        now: DateTime<FixedOffset>,
    ) -> AppResult<DailyPlanSuggestions> {
        let plan = self.get_daily_plan(plan_id)?;
        let settings = self.settings_service.get()?;
        let tz = schedule_utils::parse_time_zone(&settings.time_zone)?;
        let (day_start, day_end) = schedule_utils::plan_day_bounds(plan.plan_date, tz)?;

        let tasks: Vec<TaskRecord> = self
            .task_service
            .list_for_plan_date(plan.plan_date)?
            .into_iter()
            .filter(|task| !task.is_scheduled())
            .map(|task| with_default_duration(task, &settings))
            .collect();
        let already_placed = self.scheduled_between(day_start, day_end)?;

        let calendar = self.fetch_busy_intervals(day_start, day_end).await;

        let input = SchedulingInput {
            tasks,
            work_window: plan.work_window(),
            preferred_shutdown_time: plan.shutdown_time.clone(),
            busy_intervals: calendar.busy_intervals,
            already_placed,
            current_instant: now,
            time_zone: tz,
        };
        let suggestions = self.scheduler.compute_suggestions(&input)?;

        info!(
            target: "app::planning",
            plan_id = %plan.id,
            suggestions = suggestions.len(),
            calendar_connected = calendar.connected,
            "daily plan suggestions ready"
        );

        Ok(DailyPlanSuggestions {
            suggestions,
            calendar_connected: calendar.connected,
        })
    }

    /// Commits the accepted suggestions; conflicting ones are reported, not applied.
    pub async fn apply_suggestions(&self, input: ApplySuggestionsInput) -> AppResult<ApplyReport> {
        if input.suggestions.is_empty() {
            return Ok(ApplyReport::default());
        }

        let settings = self.settings_service.get()?;
        let tz = schedule_utils::parse_time_zone(&settings.time_zone)?;

        let ids: Vec<String> = input
            .suggestions
            .iter()
            .map(|selection| selection.task_id.clone())
            .collect();
        let tasks = self.task_service.get_tasks(&ids)?;

        let mut dates: BTreeSet<NaiveDate> = tasks.iter().filter_map(|task| task.plan_date).collect();
        for selection in &input.suggestions {
            dates.insert(schedule_utils::local_date_of(selection.scheduled_start, tz));
            dates.insert(schedule_utils::local_date_of(selection.scheduled_end, tz));
        }

        let _guards = self.date_locks.acquire(&dates).await?;
        let context = self.placement_context(&dates, tz).await?;
        let report = self
            .scheduler
            .apply_suggestions(&input.suggestions, &context)?;

        let committed: Vec<_> = report.committed().cloned().collect();
        self.task_service.commit_placements(&committed, tz)?;

        info!(target: "app::planning", summary = %report.summary(), "suggestions applied");
        Ok(report)
    }

    /// Places a task exactly where the user dropped it, outside work hours too.
    pub async fn schedule_task_manually(
        &self,
        task_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> AppResult<TaskRecord> {
        let settings = self.settings_service.get()?;
        let tz = schedule_utils::parse_time_zone(&settings.time_zone)?;
        let task = self.task_service.get_task(task_id)?;

        let mut dates: BTreeSet<NaiveDate> = task.plan_date.into_iter().collect();
        dates.insert(schedule_utils::local_date_of(start, tz));
        dates.insert(schedule_utils::local_date_of(end, tz));

        let _guards = self.date_locks.acquire(&dates).await?;
        let context = self.placement_context(&dates, tz).await?;
        let placement = self
            .scheduler
            .validate_manual_placement(task_id, start, end, &context)?;

        let mut updated = self.task_service.commit_placements(&[placement], tz)?;
        updated.pop().ok_or_else(AppError::not_found)
    }

    /// Moves a task to `target_date` and clears its placement.
    pub async fn defer_task(&self, task_id: &str, target_date: NaiveDate) -> AppResult<TaskRecord> {
        let settings = self.settings_service.get()?;
        let tz = schedule_utils::parse_time_zone(&settings.time_zone)?;
        let task = self.task_service.get_task(task_id)?;

        let mut dates: BTreeSet<NaiveDate> = task.plan_date.into_iter().collect();
        dates.insert(target_date);
        if let Some(start) = task.scheduled_start {
            dates.insert(schedule_utils::local_date_of(start, tz));
        }

        let _guards = self.date_locks.acquire(&dates).await?;
        let deferred = self.scheduler.compute_deferral(&task, target_date);
        let saved = self.task_service.save_placement(&deferred)?;
        info!(target: "app::planning", task_id = %task_id, date = %target_date, "task deferred");
        Ok(saved)
    }

    pub fn tasks_by_bucket(&self, today: NaiveDate) -> AppResult<TaskBuckets> {
        let settings = self.settings_service.get()?;
        let tz = schedule_utils::parse_time_zone(&settings.time_zone)?;

        let mut buckets = TaskBuckets::default();
        for task in self.task_service.list_tasks()? {
            let bucket = self.scheduler.display_bucket(&task, today, tz);
            buckets.push(bucket, task);
        }
        Ok(buckets)
    }

    fn scheduled_between(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<TaskRecord>> {
        Ok(self
            .task_service
            .list_scheduled()?
            .into_iter()
            .filter(|task| match task.placement() {
                Some((task_start, task_end)) => task_start < end && start < task_end,
                None => task.scheduled_start.is_some_and(|s| start <= s && s < end),
            })
            .collect())
    }

    async fn placement_context(
        &self,
        dates: &BTreeSet<NaiveDate>,
        tz: Tz,
    ) -> AppResult<PlacementContext> {
        let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
            return Ok(PlacementContext::default());
        };
        let (range_start, _) = schedule_utils::plan_day_bounds(*first, tz)?;
        let (_, range_end) = schedule_utils::plan_day_bounds(*last, tz)?;

        let calendar = self.fetch_busy_intervals(range_start, range_end).await;
        Ok(PlacementContext {
            busy_intervals: calendar.busy_intervals,
            scheduled_tasks: self.task_service.list_scheduled()?,
        })
    }

    async fn fetch_busy_intervals(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> CalendarSnapshot {
        if !self.calendar.is_connected().await {
            return CalendarSnapshot {
                busy_intervals: Vec::new(),
                connected: false,
            };
        }

        match self.calendar.busy_intervals(start, end).await {
            Ok(busy_intervals) => CalendarSnapshot {
                busy_intervals,
                connected: true,
            },
            Err(err) => {
                warn!(
                    target: "app::calendar",
                    error = %err,
                    "calendar unavailable, scheduling against tasks only"
                );
                CalendarSnapshot {
                    busy_intervals: Vec::new(),
                    connected: false,
                }
            }
        }
    }
}

fn normalize_clock_or(value: Option<&str>, fallback: &str) -> AppResult<String> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(fallback);
    schedule_utils::parse_clock_time(raw).map(|time| time.format("%H:%M").to_string())
}

fn with_default_duration(mut task: TaskRecord, settings: &AppSettings) -> TaskRecord {
    if task.duration_minutes.is_none() {
        debug!(
            target: "app::planning",
            task_id = %task.id,
            minutes = settings.default_task_minutes,
            "using default task duration"
        );
        task.duration_minutes = Some(settings.default_task_minutes);
    }
    task
}
