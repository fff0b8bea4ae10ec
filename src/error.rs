use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

/// Where an occupied interval comes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OccupiedSource {
    CalendarEvent,
    ScheduledTask,
    /// Placed earlier in the same apply batch.
    PendingPlacement,
}

impl OccupiedSource {
    pub fn as_str(self) -> &'static str {
        match self {
            OccupiedSource::CalendarEvent => "calendar event",
            OccupiedSource::ScheduledTask => "scheduled task",
            OccupiedSource::PendingPlacement => "placement in the same batch",
        }
    }
}

impl fmt::Display for OccupiedSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OccupiedSlot {
    pub source: OccupiedSource,
    #[serde(default)]
    pub source_id: Option<String>,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

/// A requested placement collides with time that is already taken.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Error)]
#[serde(rename_all = "camelCase")]
#[error("placement of task {task_id} at [{start} - {end}) overlaps {} occupied interval(s)", .conflicts.len())]
pub struct OverlapError {
    pub task_id: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub conflicts: Vec<OccupiedSlot>,
}

impl OverlapError {
    pub fn conflicts_with_calendar(&self) -> bool {
        self.conflicts
            .iter()
            .any(|slot| slot.source == OccupiedSource::CalendarEvent)
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {message}")]
    Database { message: String },

    #[error("record not found")]
    NotFound,

    #[error("record conflict: {message}")]
    Conflict { message: String },

    #[error("validation failed: {message}")]
    Validation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        details: Option<JsonValue>,
    },

    #[error(transparent)]
    Overlap(OverlapError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, "validation error");
        AppError::Validation {
            message,
            source: None,
            details: None,
        }
    }

    pub fn validation_with_details(message: impl Into<String>, details: JsonValue) -> Self {
        let message = message.into();
        warn!(target: "app::validation", %message, details = %details, "validation error with details");
        AppError::Validation {
            message,
            source: None,
            details: Some(details),
        }
    }

    pub fn overlap(error: OverlapError) -> Self {
        warn!(
            target: "app::scheduler",
            task_id = %error.task_id,
            start = %error.start,
            end = %error.end,
            conflicts = error.conflicts.len(),
            "placement overlaps occupied time"
        );
        AppError::Overlap(error)
    }

    pub fn overlap_details(&self) -> Option<&OverlapError> {
        match self {
            AppError::Overlap(details) => Some(details),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation { .. })
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        let message = message.into();
        warn!(target: "app::conflict", %message, "conflict error");
        AppError::Conflict { message }
    }

    pub fn not_found() -> Self {
        warn!(target: "app::database", "resource not found");
        AppError::NotFound
    }

    pub fn database(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::database", %message, "database error");
        AppError::Database { message }
    }

    pub fn other(message: impl Into<String>) -> Self {
        let message = message.into();
        error!(target: "app::other", %message, "other error");
        AppError::Other(message)
    }
}

impl From<OverlapError> for AppError {
    fn from(error: OverlapError) -> Self {
        AppError::overlap(error)
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(error: rusqlite::Error) -> Self {
        use rusqlite::Error::{QueryReturnedNoRows, SqliteFailure};
        use rusqlite::ErrorCode;

        match &error {
            QueryReturnedNoRows => AppError::not_found(),
            SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation => {
                AppError::conflict("unique or check constraint violated")
            }
            _ => {
                error!(target: "app::database", error = ?error, "sqlite error");
                AppError::database(error.to_string())
            }
        }
    }
}
