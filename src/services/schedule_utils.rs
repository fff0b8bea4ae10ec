use chrono::{
    offset::LocalResult, DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone,
    Timelike,
};
use chrono_tz::Tz;
use serde_json::json;

use crate::error::{AppError, AppResult};

pub fn parse_datetime(value: &str) -> AppResult<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).map_err(|err| {
        AppError::validation_with_details(
            "invalid datetime",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn parse_optional_datetime(value: Option<&str>) -> AppResult<Option<DateTime<FixedOffset>>> {
    match value.map(str::trim) {
        Some(raw) if !raw.is_empty() => Ok(Some(parse_datetime(raw)?)),
        _ => Ok(None),
    }
}

pub fn format_datetime(dt: DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

/// Parses a local wall-clock "HH:MM".
pub fn parse_clock_time(value: &str) -> AppResult<NaiveTime> {
    let trimmed = value.trim();
    let well_formed = trimmed.len() == 5
        && trimmed.as_bytes()[2] == b':'
        && trimmed
            .bytes()
            .enumerate()
            .all(|(idx, byte)| idx == 2 || byte.is_ascii_digit());
    if !well_formed {
        return Err(AppError::validation_with_details(
            "time must be formatted as HH:MM",
            json!({"value": value}),
        ));
    }
    NaiveTime::parse_from_str(trimmed, "%H:%M").map_err(|err| {
        AppError::validation_with_details(
            "time must be formatted as HH:MM",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

pub fn format_clock(dt: DateTime<FixedOffset>) -> String {
    dt.format("%H:%M").to_string()
}

pub fn parse_time_zone(value: &str) -> AppResult<Tz> {
    value.trim().parse::<Tz>().map_err(|err| {
        AppError::validation_with_details(
            "unknown time zone",
            json!({"value": value, "error": err.to_string()}),
        )
    })
}

/// Resolves a local date and wall-clock time in `tz` to a concrete instant.
///
/// Ambiguous local times (DST fall-back) resolve to the earlier instant; local
/// times skipped by a DST jump are rejected.
pub fn resolve_local(date: NaiveDate, time: NaiveTime, tz: Tz) -> AppResult<DateTime<FixedOffset>> {
    let naive = date.and_time(time);
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.fixed_offset()),
        LocalResult::Ambiguous(first, _) => Ok(first.fixed_offset()),
        LocalResult::None => Err(AppError::validation_with_details(
            "local time does not exist in the configured time zone",
            json!({"date": date.to_string(), "time": time.to_string(), "timeZone": tz.name()}),
        )),
    }
}

/// The 00:00 instant of `date` in `tz`.
pub fn plan_day_start(date: NaiveDate, tz: Tz) -> AppResult<DateTime<FixedOffset>> {
    let midnight = NaiveTime::from_hms_opt(0, 0, 0)
        .ok_or_else(|| AppError::other("00:00 must be a valid time"))?;
    resolve_local(date, midnight, tz)
}

/// `[00:00 of date, 00:00 of the next day)` in `tz`.
pub fn plan_day_bounds(
    date: NaiveDate,
    tz: Tz,
) -> AppResult<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    let next = date
        .succ_opt()
        .ok_or_else(|| AppError::validation("date out of range"))?;
    Ok((plan_day_start(date, tz)?, plan_day_start(next, tz)?))
}

/// Re-expresses `dt` with the UTC offset `tz` uses at that instant.
pub fn to_local(dt: DateTime<FixedOffset>, tz: Tz) -> DateTime<FixedOffset> {
    dt.with_timezone(&tz).fixed_offset()
}

/// Rounds up to the next whole minute; whole minutes are returned unchanged.
pub fn ceil_to_minute(dt: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    let truncated = dt
        .with_second(0)
        .and_then(|value| value.with_nanosecond(0))
        .unwrap_or(dt);
    if truncated < dt {
        truncated + Duration::minutes(1)
    } else {
        truncated
    }
}

pub fn local_date_of(dt: DateTime<FixedOffset>, tz: Tz) -> NaiveDate {
    dt.with_timezone(&tz).date_naive()
}

pub fn add_minutes(dt: DateTime<FixedOffset>, minutes: i64) -> AppResult<DateTime<FixedOffset>> {
    Duration::try_minutes(minutes)
        .and_then(|delta| dt.checked_add_signed(delta))
        .ok_or_else(|| AppError::validation("time calculation out of range"))
}

pub fn ensure_window(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> AppResult<()> {
    if end <= start {
        Err(AppError::validation_with_details(
            "time range end must be later than its start",
            json!({"start": format_datetime(start), "end": format_datetime(end)}),
        ))
    } else {
        Ok(())
    }
}
