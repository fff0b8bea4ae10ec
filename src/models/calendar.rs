use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A calendar commitment owned by an external provider.
///
/// Providers may hand back all-day entries or entries without concrete
/// instants; those never occupy the intraday grid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BusyInterval {
    #[serde(default)]
    pub source_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub start: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub end: Option<DateTime<FixedOffset>>,
    #[serde(default)]
    pub is_all_day: bool,
}

impl BusyInterval {
    pub fn timed(
        source_id: impl Into<String>,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            source_id: Some(source_id.into()),
            title: None,
            start: Some(start),
            end: Some(end),
            is_all_day: false,
        }
    }

    /// Concrete `[start, end)` if this entry blocks intraday time.
    pub fn concrete_range(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        if self.is_all_day {
            return None;
        }
        match (self.start, self.end) {
            (Some(start), Some(end)) if end > start => Some((start, end)),
            _ => None,
        }
    }
}
