use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::db::repositories::settings_repository::{AppSettingRow, SettingsRepository};
use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::settings::{
    AppSettings, DEFAULT_SHUTDOWN_TIME, DEFAULT_TASK_MINUTES, DEFAULT_TIME_ZONE,
    DEFAULT_WORKDAY_END, DEFAULT_WORKDAY_START,
};
use crate::services::schedule_utils::{parse_clock_time, parse_time_zone};

const KEY_WORKDAY_START: &str = "workday_start";
const KEY_WORKDAY_END: &str = "workday_end";
const KEY_SHUTDOWN_TIME: &str = "shutdown_time";
const KEY_TIME_ZONE: &str = "time_zone";
const KEY_DEFAULT_TASK_MINUTES: &str = "default_task_minutes";

const MAX_DEFAULT_TASK_MINUTES: i64 = 24 * 60;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdateInput {
    #[serde(default)]
    pub workday_start: Option<String>,
    #[serde(default)]
    pub workday_end: Option<String>,
    #[serde(default)]
    pub shutdown_time: Option<String>,
    #[serde(default)]
    pub time_zone: Option<String>,
    #[serde(default)]
    pub default_task_minutes: Option<i64>,
}

pub struct SettingsService {
    db: DbPool,
    cache: RwLock<Option<AppSettings>>,
}

impl SettingsService {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            cache: RwLock::new(None),
        }
    }

    pub fn get(&self) -> AppResult<AppSettings> {
        if let Ok(guard) = self.cache.read() {
            if let Some(settings) = guard.as_ref() {
                return Ok(settings.clone());
            }
        }

        let settings = self.load_settings_from_db()?;
        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(settings.clone());
        }
        Ok(settings)
    }

    pub fn update(&self, input: SettingsUpdateInput) -> AppResult<AppSettings> {
        let mut current = self.get()?;
        let mut changes: Vec<(&str, String)> = Vec::new();

        if let Some(value) = input.workday_start.as_deref() {
            current.workday_start = normalize_clock(value)?;
            changes.push((KEY_WORKDAY_START, current.workday_start.clone()));
        }

        if let Some(value) = input.workday_end.as_deref() {
            current.workday_end = normalize_clock(value)?;
            changes.push((KEY_WORKDAY_END, current.workday_end.clone()));
        }

        if let Some(value) = input.shutdown_time.as_deref() {
            current.shutdown_time = normalize_clock(value)?;
            changes.push((KEY_SHUTDOWN_TIME, current.shutdown_time.clone()));
        }

        if let Some(value) = input.time_zone.as_deref() {
            current.time_zone = parse_time_zone(value)?.name().to_string();
            changes.push((KEY_TIME_ZONE, current.time_zone.clone()));
        }

        if let Some(minutes) = input.default_task_minutes {
            ensure_default_minutes(minutes)?;
            current.default_task_minutes = minutes;
            changes.push((KEY_DEFAULT_TASK_MINUTES, minutes.to_string()));
        }

        if parse_clock_time(&current.workday_start)? >= parse_clock_time(&current.workday_end)? {
            return Err(AppError::validation_with_details(
                "workday must start before it ends",
                json!({"workdayStart": current.workday_start, "workdayEnd": current.workday_end}),
            ));
        }

        if changes.is_empty() {
            return Ok(current);
        }

        self.db
            .with_connection(|conn| SettingsRepository::upsert_all(conn, &changes))?;
        current.updated_at = Utc::now().to_rfc3339();
        info!(target: "app::settings", keys = changes.len(), "settings updated");

        if let Ok(mut guard) = self.cache.write() {
            *guard = Some(current.clone());
        }

        Ok(current)
    }

    fn load_settings_from_db(&self) -> AppResult<AppSettings> {
        self.db.with_connection(|conn| {
            let mut map = SettingsRepository::load_map(conn)?;
            let updated_at = map
                .values()
                .map(|row| row.updated_at.clone())
                .max()
                .unwrap_or_default();

            Ok(AppSettings {
                workday_start: stored_clock(&mut map, KEY_WORKDAY_START, DEFAULT_WORKDAY_START),
                workday_end: stored_clock(&mut map, KEY_WORKDAY_END, DEFAULT_WORKDAY_END),
                shutdown_time: stored_clock(&mut map, KEY_SHUTDOWN_TIME, DEFAULT_SHUTDOWN_TIME),
                time_zone: stored_time_zone(&mut map),
                default_task_minutes: stored_default_minutes(&mut map),
                updated_at,
            })
        })
    }
}

fn normalize_clock(value: &str) -> AppResult<String> {
    parse_clock_time(value).map(|time| time.format("%H:%M").to_string())
}

fn ensure_default_minutes(minutes: i64) -> AppResult<()> {
    if (1..=MAX_DEFAULT_TASK_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(AppError::validation_with_details(
            "default task duration must be between 1 and 1440 minutes",
            json!({"defaultTaskMinutes": minutes}),
        ))
    }
}

fn stored_clock(map: &mut HashMap<String, AppSettingRow>, key: &str, default: &str) -> String {
    match map.remove(key) {
        Some(row) => match normalize_clock(&row.value) {
            Ok(value) => value,
            Err(_) => {
                warn!(target: "app::settings", key, value = %row.value, "ignoring invalid stored time");
                default.to_string()
            }
        },
        None => default.to_string(),
    }
}

fn stored_time_zone(map: &mut HashMap<String, AppSettingRow>) -> String {
    match map.remove(KEY_TIME_ZONE) {
        Some(row) => match parse_time_zone(&row.value) {
            Ok(tz) => tz.name().to_string(),
            Err(_) => {
                warn!(target: "app::settings", value = %row.value, "ignoring invalid stored time zone");
                DEFAULT_TIME_ZONE.to_string()
            }
        },
        None => DEFAULT_TIME_ZONE.to_string(),
    }
}

fn stored_default_minutes(map: &mut HashMap<String, AppSettingRow>) -> i64 {
    map.remove(KEY_DEFAULT_TASK_MINUTES)
        .and_then(|row| row.value.trim().parse::<i64>().ok())
        .filter(|minutes| ensure_default_minutes(*minutes).is_ok())
        .unwrap_or(DEFAULT_TASK_MINUTES)
}
