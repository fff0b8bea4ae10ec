use std::convert::TryFrom;

use chrono::NaiveDate;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::error::{AppError, AppResult};
use crate::models::task::{SchedulingMethod, TaskPriority, TaskRecord};
use crate::services::schedule_utils::{format_datetime, parse_datetime};

const BASE_SELECT: &str = r#"
    SELECT
        id,
        name,
        description,
        duration_minutes,
        priority,
        due_at,
        plan_date,
        scheduled_start,
        scheduled_end,
        scheduling_method,
        created_at,
        updated_at
    FROM tasks
"#;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct TaskRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: Option<i64>,
    pub priority: Option<String>,
    pub due_at: Option<String>,
    pub plan_date: Option<String>,
    pub scheduled_start: Option<String>,
    pub scheduled_end: Option<String>,
    pub scheduling_method: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskRow {
    pub fn from_record(record: &TaskRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            description: record.description.clone(),
            duration_minutes: record.duration_minutes,
            priority: record.priority.map(|p| p.as_str().to_string()),
            due_at: record.due_at.map(format_datetime),
            plan_date: record.plan_date.map(format_date),
            scheduled_start: record.scheduled_start.map(format_datetime),
            scheduled_end: record.scheduled_end.map(format_datetime),
            scheduling_method: record.scheduling_method.map(|m| m.as_str().to_string()),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<TaskRecord> {
        Ok(TaskRecord {
            id: self.id,
            name: self.name,
            description: self.description,
            duration_minutes: self.duration_minutes,
            priority: self
                .priority
                .as_deref()
                .map(str::parse::<TaskPriority>)
                .transpose()?,
            due_at: self.due_at.as_deref().map(parse_datetime).transpose()?,
            plan_date: self.plan_date.as_deref().map(parse_date).transpose()?,
            scheduled_start: self.scheduled_start.as_deref().map(parse_datetime).transpose()?,
            scheduled_end: self.scheduled_end.as_deref().map(parse_datetime).transpose()?,
            scheduling_method: self
                .scheduling_method
                .as_deref()
                .map(str::parse::<SchedulingMethod>)
                .transpose()?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for TaskRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(TaskRow {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            duration_minutes: row.get("duration_minutes")?,
            priority: row.get("priority")?,
            due_at: row.get("due_at")?,
            plan_date: row.get("plan_date")?,
            scheduled_start: row.get("scheduled_start")?,
            scheduled_end: row.get("scheduled_end")?,
            scheduling_method: row.get("scheduling_method")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct TaskRepository;

impl TaskRepository {
    pub fn insert(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO tasks (
                    id,
                    name,
                    description,
                    duration_minutes,
                    priority,
                    due_at,
                    plan_date,
                    scheduled_start,
                    scheduled_end,
                    scheduling_method,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :name,
                    :description,
                    :duration_minutes,
                    :priority,
                    :due_at,
                    :plan_date,
                    :scheduled_start,
                    :scheduled_end,
                    :scheduling_method,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":name": &row.name,
                ":description": &row.description,
                ":duration_minutes": &row.duration_minutes,
                ":priority": &row.priority,
                ":due_at": &row.due_at,
                ":plan_date": &row.plan_date,
                ":scheduled_start": &row.scheduled_start,
                ":scheduled_end": &row.scheduled_end,
                ":scheduling_method": &row.scheduling_method,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;

        Ok(())
    }

    pub fn update(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    name = :name,
                    description = :description,
                    duration_minutes = :duration_minutes,
                    priority = :priority,
                    due_at = :due_at,
                    plan_date = :plan_date,
                    scheduled_start = :scheduled_start,
                    scheduled_end = :scheduled_end,
                    scheduling_method = :scheduling_method,
                    updated_at = :updated_at
                WHERE id = :id
            "#,
            named_params! {
                ":id": &row.id,
                ":name": &row.name,
                ":description": &row.description,
                ":duration_minutes": &row.duration_minutes,
                ":priority": &row.priority,
                ":due_at": &row.due_at,
                ":plan_date": &row.plan_date,
                ":scheduled_start": &row.scheduled_start,
                ":scheduled_end": &row.scheduled_end,
                ":scheduling_method": &row.scheduling_method,
                ":updated_at": &row.updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    /// Writes only the placement columns and the plan date.
    pub fn update_placement(conn: &Connection, row: &TaskRow) -> AppResult<()> {
        let affected = conn.execute(
            r#"
                UPDATE tasks SET
                    plan_date = :plan_date,
                    scheduled_start = :scheduled_start,
                    scheduled_end = :scheduled_end,
                    scheduling_method = :scheduling_method,
                    updated_at = :updated_at
                WHERE id = :id
            "#,
            named_params! {
                ":id": &row.id,
                ":plan_date": &row.plan_date,
                ":scheduled_start": &row.scheduled_start,
                ":scheduled_end": &row.scheduled_end,
                ":scheduling_method": &row.scheduling_method,
                ":updated_at": &row.updated_at,
            },
        )?;

        if affected == 0 {
            return Err(AppError::not_found());
        }

        Ok(())
    }

    pub fn delete(conn: &Connection, id: &str) -> AppResult<()> {
        let affected = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
        if affected == 0 {
            return Err(AppError::not_found());
        }
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<TaskRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| TaskRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn list_all(conn: &Connection) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!("{} ORDER BY created_at ASC, rowid ASC", BASE_SELECT))?;
        let rows = stmt
            .query_map([], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Tasks planned for `date`, in creation order.
    pub fn list_for_plan_date(conn: &Connection, date: NaiveDate) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE plan_date = :plan_date ORDER BY created_at ASC, rowid ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map(named_params! {":plan_date": format_date(date)}, |row| {
                TaskRow::try_from(row)
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Every task with a placement, regardless of plan date.
    pub fn list_scheduled(conn: &Connection) -> AppResult<Vec<TaskRow>> {
        let mut stmt = conn.prepare(&format!(
            "{} WHERE scheduled_start IS NOT NULL ORDER BY scheduled_start ASC",
            BASE_SELECT
        ))?;
        let rows = stmt
            .query_map([], |row| TaskRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|err| AppError::database(format!("invalid stored date {raw}: {err}")))
}
