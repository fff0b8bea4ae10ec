use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::calendar::BusyInterval;

/// Source of external calendar commitments.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn is_connected(&self) -> bool;

    /// Busy intervals that intersect `[start, end)`.
    async fn busy_intervals(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<BusyInterval>>;
}

/// Used when no calendar account is linked; scheduling sees tasks only.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisconnectedCalendar;

#[async_trait]
impl CalendarProvider for DisconnectedCalendar {
    async fn is_connected(&self) -> bool {
        false
    }

    async fn busy_intervals(
        &self,
        _start: DateTime<FixedOffset>,
        _end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<BusyInterval>> {
        Ok(Vec::new())
    }
}

/// In-memory provider backed by a fixed list of events.
#[derive(Debug, Default)]
pub struct StaticCalendarProvider {
    events: RwLock<Vec<BusyInterval>>,
    failure: RwLock<Option<String>>,
}

impl StaticCalendarProvider {
    pub fn new(events: Vec<BusyInterval>) -> Self {
        Self {
            events: RwLock::new(events),
            failure: RwLock::new(None),
        }
    }

    pub async fn replace_events(&self, events: Vec<BusyInterval>) {
        *self.events.write().await = events;
    }

    /// Makes every later fetch fail with `message` until cleared with `None`.
    pub async fn set_failure(&self, message: Option<String>) {
        *self.failure.write().await = message;
    }
}

#[async_trait]
impl CalendarProvider for StaticCalendarProvider {
    async fn is_connected(&self) -> bool {
        true
    }

    async fn busy_intervals(
        &self,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> AppResult<Vec<BusyInterval>> {
        if let Some(message) = self.failure.read().await.as_ref() {
            return Err(AppError::other(format!("calendar provider unavailable: {message}")));
        }

        let events = self.events.read().await;
        let matching: Vec<BusyInterval> = events
            .iter()
            .filter(|event| match (event.start, event.end) {
                (Some(event_start), Some(event_end)) => event_start < end && start < event_end,
                // entries without a concrete range are passed through for the caller to judge
                _ => true,
            })
            .cloned()
            .collect();

        debug!(
            target: "app::calendar",
            total = events.len(),
            matching = matching.len(),
            "busy intervals fetched"
        );
        Ok(matching)
    }
}
