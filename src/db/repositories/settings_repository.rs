use std::collections::HashMap;
use std::convert::TryFrom;

use rusqlite::{named_params, Connection, Row};

use crate::error::AppResult;

#[derive(Debug, Clone)]
pub struct AppSettingRow {
    pub key: String,
    pub value: String,
    pub updated_at: String,
}

impl TryFrom<&Row<'_>> for AppSettingRow {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'_>) -> Result<Self, Self::Error> {
        Ok(Self {
            key: row.get("key")?,
            value: row.get("value")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Key/value store behind the scheduling preferences.
pub struct SettingsRepository;

impl SettingsRepository {
    pub fn load_map(conn: &Connection) -> AppResult<HashMap<String, AppSettingRow>> {
        let mut stmt = conn.prepare("SELECT key, value, updated_at FROM app_settings")?;
        let rows = stmt
            .query_map([], |row| AppSettingRow::try_from(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows.into_iter().map(|row| (row.key.clone(), row)).collect())
    }

    pub fn upsert_all(conn: &Connection, entries: &[(&str, String)]) -> AppResult<()> {
        let mut stmt = conn.prepare(
            r#"
                INSERT INTO app_settings (key, value)
                VALUES (:key, :value)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = CURRENT_TIMESTAMP
            "#,
        )?;
        for (key, value) in entries {
            stmt.execute(named_params! {":key": key, ":value": value})?;
        }
        Ok(())
    }
}
