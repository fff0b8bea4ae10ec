use std::convert::TryFrom;

use chrono::NaiveDate;
use rusqlite::{named_params, Connection, OptionalExtension, Row};

use crate::db::repositories::task_repository::{format_date, parse_date};
use crate::error::AppResult;
use crate::models::planning::DailyPlanRecord;

const BASE_SELECT: &str = r#"
    SELECT
        id,
        plan_date,
        work_hours_start,
        work_hours_end,
        shutdown_time,
        created_at,
        updated_at
    FROM daily_plans
"#;

#[derive(Debug, Clone)]
pub struct DailyPlanRow {
    pub id: String,
    pub plan_date: String,
    pub work_hours_start: String,
    pub work_hours_end: String,
    pub shutdown_time: String,
    pub created_at: String,
    pub updated_at: String,
}

impl DailyPlanRow {
    pub fn from_record(record: &DailyPlanRecord) -> Self {
        Self {
            id: record.id.clone(),
            plan_date: format_date(record.plan_date),
            work_hours_start: record.work_hours_start.clone(),
            work_hours_end: record.work_hours_end.clone(),
            shutdown_time: record.shutdown_time.clone(),
            created_at: record.created_at.clone(),
            updated_at: record.updated_at.clone(),
        }
    }

    pub fn into_record(self) -> AppResult<DailyPlanRecord> {
        Ok(DailyPlanRecord {
            id: self.id,
            plan_date: parse_date(&self.plan_date)?,
            work_hours_start: self.work_hours_start,
            work_hours_end: self.work_hours_end,
            shutdown_time: self.shutdown_time,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

impl TryFrom<&Row<'_>> for DailyPlanRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.get("id")?,
            plan_date: row.get("plan_date")?,
            work_hours_start: row.get("work_hours_start")?,
            work_hours_end: row.get("work_hours_end")?,
            shutdown_time: row.get("shutdown_time")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub struct DailyPlanRepository;

impl DailyPlanRepository {
    pub fn insert(conn: &Connection, row: &DailyPlanRow) -> AppResult<()> {
        conn.execute(
            r#"
                INSERT INTO daily_plans (
                    id,
                    plan_date,
                    work_hours_start,
                    work_hours_end,
                    shutdown_time,
                    created_at,
                    updated_at
                ) VALUES (
                    :id,
                    :plan_date,
                    :work_hours_start,
                    :work_hours_end,
                    :shutdown_time,
                    :created_at,
                    :updated_at
                )
            "#,
            named_params! {
                ":id": &row.id,
                ":plan_date": &row.plan_date,
                ":work_hours_start": &row.work_hours_start,
                ":work_hours_end": &row.work_hours_end,
                ":shutdown_time": &row.shutdown_time,
                ":created_at": &row.created_at,
                ":updated_at": &row.updated_at,
            },
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: &str) -> AppResult<Option<DailyPlanRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([id], |row| DailyPlanRow::try_from(row))
            .optional()?;
        Ok(row)
    }

    pub fn find_by_date(conn: &Connection, date: NaiveDate) -> AppResult<Option<DailyPlanRow>> {
        let mut stmt = conn.prepare(&format!("{} WHERE plan_date = ?1", BASE_SELECT))?;
        let row = stmt
            .query_row([format_date(date)], |row| DailyPlanRow::try_from(row))
            .optional()?;
        Ok(row)
    }
}
