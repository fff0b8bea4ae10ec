use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, info};

use crate::db::repositories::task_repository::{TaskRepository, TaskRow};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::planning::CommittedPlacement;
use crate::models::task::{parse_priority_opt, TaskCreateInput, TaskRecord, TaskUpdateInput};
use crate::services::schedule_utils::{local_date_of, parse_optional_datetime};

const MAX_NAME_CHARS: usize = 160;
const MAX_DURATION_MINUTES: i64 = 24 * 60;

#[derive(Clone)]
pub struct TaskService {
    db: DbPool,
}

impl TaskService {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    pub fn create_task(&self, input: TaskCreateInput) -> AppResult<TaskRecord> {
        let mut record = build_record_from_create(input)?;
        let now = Utc::now().to_rfc3339();
        record.id = uuid::Uuid::new_v4().to_string();
        record.created_at = now.clone();
        record.updated_at = now;

        let row = TaskRow::from_record(&record);
        self.db
            .with_connection(|conn| TaskRepository::insert(conn, &row))?;
        info!(target: "app::tasks", task_id = %record.id, "task created");
        Ok(record)
    }

    /// Edits descriptive fields; placement only changes through the planning flow.
    pub fn update_task(&self, id: &str, update: TaskUpdateInput) -> AppResult<TaskRecord> {
        let mut existing = self.get_task(id)?;
        apply_update(&mut existing, update)?;
        existing.updated_at = Utc::now().to_rfc3339();

        let row = TaskRow::from_record(&existing);
        self.db
            .with_connection(|conn| TaskRepository::update(conn, &row))?;
        info!(target: "app::tasks", task_id = %existing.id, "task updated");
        Ok(existing)
    }

    pub fn delete_task(&self, id: &str) -> AppResult<()> {
        self.db
            .with_connection(|conn| TaskRepository::delete(conn, id))?;
        info!(target: "app::tasks", task_id = %id, "task deleted");
        Ok(())
    }

    pub fn get_task(&self, id: &str) -> AppResult<TaskRecord> {
        let row = self
            .db
            .with_connection(|conn| TaskRepository::find_by_id(conn, id))?
            .ok_or_else(AppError::not_found)?;
        let record = row.into_record()?;
        debug!(target: "app::tasks", task_id = %record.id, "task fetched");
        Ok(record)
    }

    /// Fetches every id or fails with `NotFound` on the first unknown one.
    pub fn get_tasks(&self, ids: &[String]) -> AppResult<Vec<TaskRecord>> {
        let rows = self.db.with_connection(|conn| {
            ids.iter()
                .map(|id| {
                    TaskRepository::find_by_id(conn, id)?.ok_or_else(|| {
                        debug!(target: "app::tasks", task_id = %id, "unknown task id");
                        AppError::not_found()
                    })
                })
                .collect::<AppResult<Vec<_>>>()
        })?;
        rows.into_iter().map(TaskRow::into_record).collect()
    }

    pub fn list_tasks(&self) -> AppResult<Vec<TaskRecord>> {
        let rows = self
            .db
            .with_connection(|conn| TaskRepository::list_all(conn))?;
        let tasks = rows
            .into_iter()
            .map(|row| row.into_record())
            .collect::<AppResult<Vec<_>>>()?;
        debug!(target: "app::tasks", count = tasks.len(), "tasks listed");
        Ok(tasks)
    }

    pub fn list_for_plan_date(&self, date: NaiveDate) -> AppResult<Vec<TaskRecord>> {
        let rows = self
            .db
            .with_connection(|conn| TaskRepository::list_for_plan_date(conn, date))?;
        rows.into_iter().map(TaskRow::into_record).collect()
    }

    pub fn list_scheduled(&self) -> AppResult<Vec<TaskRecord>> {
        let rows = self
            .db
            .with_connection(|conn| TaskRepository::list_scheduled(conn))?;
        rows.into_iter().map(TaskRow::into_record).collect()
    }

    /// Persists placements atomically. Each task's plan date follows the local
    /// date of its new start.
    pub fn commit_placements(
        &self,
        placements: &[CommittedPlacement],
        tz: Tz,
    ) -> AppResult<Vec<TaskRecord>> {
        if placements.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now().to_rfc3339();
        let updated = self.db.with_transaction(|conn| {
            placements
                .iter()
                .map(|placement| {
                    let row = TaskRepository::find_by_id(conn, &placement.task_id)?
                        .ok_or_else(AppError::not_found)?;
                    let mut record = row.into_record()?;
                    record.scheduled_start = Some(placement.scheduled_start);
                    record.scheduled_end = Some(placement.scheduled_end);
                    record.scheduling_method = Some(placement.scheduling_method);
                    record.plan_date = Some(local_date_of(placement.scheduled_start, tz));
                    record.updated_at = now.clone();
                    TaskRepository::update_placement(conn, &TaskRow::from_record(&record))?;
                    Ok(record)
                })
                .collect::<AppResult<Vec<_>>>()
        })?;

        info!(target: "app::tasks", count = updated.len(), "placements committed");
        Ok(updated)
    }

    /// Stores the placement columns and plan date of `record` as they are.
    pub fn save_placement(&self, record: &TaskRecord) -> AppResult<TaskRecord> {
        let mut record = record.clone();
        record.updated_at = Utc::now().to_rfc3339();
        let row = TaskRow::from_record(&record);
        self.db
            .with_connection(|conn| TaskRepository::update_placement(conn, &row))?;
        debug!(target: "app::tasks", task_id = %record.id, "placement saved");
        Ok(record)
    }
}

fn build_record_from_create(mut input: TaskCreateInput) -> AppResult<TaskRecord> {
    Ok(TaskRecord {
        id: String::new(),
        name: normalize_name(&input.name)?,
        description: normalize_optional_string(input.description.take()),
        duration_minutes: normalize_duration(input.duration_minutes)?,
        priority: parse_priority_opt(input.priority.as_deref())?,
        due_at: parse_optional_datetime(input.due_at.as_deref())?,
        plan_date: input.plan_date,
        scheduled_start: None,
        scheduled_end: None,
        scheduling_method: None,
        created_at: String::new(),
        updated_at: String::new(),
    })
}

fn apply_update(record: &mut TaskRecord, update: TaskUpdateInput) -> AppResult<()> {
    if let Some(name) = update.name {
        record.name = normalize_name(&name)?;
    }

    if let Some(description) = update.description {
        record.description = normalize_optional_string(description);
    }

    if let Some(duration) = update.duration_minutes {
        record.duration_minutes = normalize_duration(duration)?;
    }

    if let Some(priority) = update.priority {
        record.priority = parse_priority_opt(priority.as_deref())?;
    }

    if let Some(due_at) = update.due_at {
        record.due_at = parse_optional_datetime(due_at.as_deref())?;
    }

    if let Some(plan_date) = update.plan_date {
        record.plan_date = plan_date;
    }

    Ok(())
}

fn normalize_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("task name must not be empty"));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(AppError::validation("task name must be at most 160 characters"));
    }
    Ok(trimmed.to_string())
}

fn normalize_optional_string(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let trimmed = val.trim().to_string();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

fn normalize_duration(value: Option<i64>) -> AppResult<Option<i64>> {
    match value {
        Some(minutes) if minutes <= 0 => {
            Err(AppError::validation("task duration must be greater than 0"))
        }
        Some(minutes) if minutes > MAX_DURATION_MINUTES => {
            Err(AppError::validation("task duration must not exceed one day"))
        }
        other => Ok(other),
    }
}
