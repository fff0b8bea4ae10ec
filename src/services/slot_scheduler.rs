use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use serde_json::json;
use tracing::{debug, info};

use crate::error::{AppError, AppResult, OccupiedSlot, OccupiedSource, OverlapError};
use crate::models::calendar::BusyInterval;
use crate::models::planning::{
    ApplyOutcome, ApplyReport, CommittedPlacement, DisplayBucket, Suggestion,
    SuggestionSelection, WorkWindow,
};
use crate::models::task::{SchedulingMethod, TaskRecord, NO_PRIORITY_RANK};
use crate::services::intervals::{merge_intervals, subtract_intervals, TimeInterval};
use crate::services::schedule_utils;

/// Marker that opens every warning segment of a suggestion's reasoning.
pub const WARNING_MARKER: &str = "⚠️";

/// Snapshot of one plan date handed to [`SlotScheduler::compute_suggestions`].
#[derive(Debug, Clone)]
pub struct SchedulingInput {
    pub tasks: Vec<TaskRecord>,
    pub work_window: WorkWindow,
    pub preferred_shutdown_time: String,
    pub busy_intervals: Vec<BusyInterval>,
    pub already_placed: Vec<TaskRecord>,
    pub current_instant: DateTime<FixedOffset>,
    pub time_zone: Tz,
}

/// Everything that currently occupies time around a placement request.
#[derive(Debug, Clone, Default)]
pub struct PlacementContext {
    pub busy_intervals: Vec<BusyInterval>,
    pub scheduled_tasks: Vec<TaskRecord>,
}

impl PlacementContext {
    pub fn occupied_slots(&self) -> Vec<OccupiedSlot> {
        let mut slots: Vec<OccupiedSlot> = self
            .busy_intervals
            .iter()
            .filter_map(busy_slot)
            .collect();
        slots.extend(self.scheduled_tasks.iter().filter_map(task_slot));
        slots
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SlotScheduler;

struct PendingTask<'a> {
    task: &'a TaskRecord,
    duration: i64,
}

impl SlotScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Greedy, priority-first, earliest-fit placement of unscheduled tasks.
    ///
    /// Suggestions come back in placement order (priority rank, then input
    /// order). Tasks that fit no free gap are left out.
    pub fn compute_suggestions(&self, input: &SchedulingInput) -> AppResult<Vec<Suggestion>> {
        let tz = input.time_zone;
        let window = resolve_work_window(&input.work_window, tz)?;
        let shutdown_time = schedule_utils::parse_clock_time(&input.preferred_shutdown_time)?;
        let shutdown = schedule_utils::resolve_local(input.work_window.date, shutdown_time, tz)?;

        let mut pending = Vec::new();
        let mut placed_from_input = Vec::new();
        let mut seen = HashSet::new();
        for task in &input.tasks {
            if task.is_scheduled() {
                placed_from_input.push(task);
                continue;
            }
            let duration = validated_duration(task)?;
            if !seen.insert(task.id.as_str()) {
                debug!(target: "app::scheduler", task_id = %task.id, "duplicate task ignored");
                continue;
            }
            pending.push(PendingTask { task, duration });
        }

        let placed_slots: Vec<OccupiedSlot> = input
            .already_placed
            .iter()
            .chain(placed_from_input.iter().copied())
            .filter_map(task_slot)
            .collect();

        let mut occupied: Vec<TimeInterval> = input
            .busy_intervals
            .iter()
            .filter_map(busy_slot)
            .chain(placed_slots.iter().cloned())
            .map(|slot| TimeInterval {
                start: slot.start,
                end: slot.end,
            })
            .collect();

        let now = schedule_utils::ceil_to_minute(input.current_instant);
        if now > window.start {
            occupied.push(TimeInterval {
                start: window.start,
                end: now.min(window.end),
            });
        }

        let occupied: Vec<TimeInterval> = merge_intervals(occupied)
            .iter()
            .filter_map(|interval| interval.clip_to(&window))
            .collect();
        let mut gaps = subtract_intervals(&window, &occupied);

        // stable: equal ranks keep their input order
        pending.sort_by_key(|entry| entry.task.priority_rank());

        let already_scheduled_minutes = sum_unique_minutes(&placed_slots);
        let projection_base = if schedule_utils::local_date_of(now, tz) == input.work_window.date
            && now > window.start
        {
            now
        } else {
            window.start
        };

        let total = pending.len();
        let mut cumulative_minutes = already_scheduled_minutes;
        let mut suggestions = Vec::with_capacity(total);

        for (position, entry) in pending.iter().enumerate() {
            let Some(gap_index) = gaps
                .iter()
                .position(|gap| gap.duration_minutes() >= entry.duration)
            else {
                debug!(
                    target: "app::scheduler",
                    task_id = %entry.task.id,
                    duration = entry.duration,
                    "no free gap fits task"
                );
                continue;
            };

            let gap = gaps[gap_index];
            let start = gap.start;
            let end = schedule_utils::add_minutes(start, entry.duration)?;
            let exact_fit = end == gap.end;
            if exact_fit {
                gaps.remove(gap_index);
            } else {
                gaps[gap_index].start = end;
            }

            cumulative_minutes += entry.duration;
            let projected_end = schedule_utils::add_minutes(projection_base, cumulative_minutes)?;
            let over_capacity_minutes = (projected_end > shutdown)
                .then(|| projected_end.signed_duration_since(shutdown).num_minutes());

            let start = schedule_utils::to_local(start, tz);
            let end = schedule_utils::to_local(end, tz);
            let reasoning = build_reasoning(
                entry,
                ReasoningContext {
                    start,
                    end,
                    position,
                    total,
                    exact_fit,
                    projected_end: schedule_utils::to_local(projected_end, tz),
                    shutdown,
                    over_capacity_minutes,
                    tz,
                },
            );

            suggestions.push(Suggestion {
                task_id: entry.task.id.clone(),
                task_name: entry.task.name.clone(),
                duration_minutes: entry.duration,
                suggested_start: start,
                suggested_end: end,
                reasoning,
                score: score_placement(entry.task.priority_rank(), start, &window, exact_fit),
                over_capacity_minutes,
            });
        }

        info!(
            target: "app::scheduler",
            date = %input.work_window.date,
            candidates = total,
            placed = suggestions.len(),
            "suggestions computed"
        );

        Ok(suggestions)
    }

    /// Commits accepted suggestions one by one, re-checking each against the
    /// occupied set as it stands after the previous commits.
    pub fn apply_suggestions(
        &self,
        selected: &[SuggestionSelection],
        context: &PlacementContext,
    ) -> AppResult<ApplyReport> {
        for selection in selected {
            validate_selection(selection)?;
        }

        let context_slots = context.occupied_slots();
        let mut pending_slots: Vec<OccupiedSlot> = Vec::new();
        let mut moved: HashSet<String> = HashSet::new();
        let mut outcomes = Vec::with_capacity(selected.len());

        for selection in selected {
            let candidate = TimeInterval {
                start: selection.scheduled_start,
                end: selection.scheduled_end,
            };

            let conflicts: Vec<OccupiedSlot> = if moved.contains(&selection.task_id) {
                pending_slots
                    .iter()
                    .filter(|slot| slot.source_id.as_deref() == Some(selection.task_id.as_str()))
                    .cloned()
                    .collect()
            } else if let Some(manual) = manual_slot(context, &selection.task_id) {
                // a manual placement always wins over a suggestion for the same task
                vec![manual]
            } else {
                context_slots
                    .iter()
                    .filter(|slot| !is_own_or_moved(slot, &selection.task_id, &moved))
                    .chain(pending_slots.iter())
                    .filter(|slot| slot_overlaps(slot, &candidate))
                    .cloned()
                    .collect()
            };

            if conflicts.is_empty() {
                pending_slots.push(OccupiedSlot {
                    source: OccupiedSource::PendingPlacement,
                    source_id: Some(selection.task_id.clone()),
                    start: candidate.start,
                    end: candidate.end,
                });
                moved.insert(selection.task_id.clone());
                outcomes.push(ApplyOutcome::Committed {
                    placement: CommittedPlacement {
                        task_id: selection.task_id.clone(),
                        scheduled_start: candidate.start,
                        scheduled_end: candidate.end,
                        scheduling_method: SchedulingMethod::AutoSuggested,
                    },
                });
            } else {
                debug!(
                    target: "app::scheduler",
                    task_id = %selection.task_id,
                    conflicts = conflicts.len(),
                    "selected suggestion skipped"
                );
                outcomes.push(ApplyOutcome::Skipped {
                    task_id: selection.task_id.clone(),
                    error: OverlapError {
                        task_id: selection.task_id.clone(),
                        start: candidate.start,
                        end: candidate.end,
                        conflicts,
                    },
                });
            }
        }

        let report = ApplyReport { outcomes };
        info!(
            target: "app::scheduler",
            committed = report.committed_count(),
            skipped = report.skipped_count(),
            "suggestions applied"
        );
        Ok(report)
    }

    /// Accepts a user-chosen slot unless it collides with occupied time.
    /// Work hours do not bound manual placement.
    pub fn validate_manual_placement(
        &self,
        task_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
        context: &PlacementContext,
    ) -> AppResult<CommittedPlacement> {
        if task_id.trim().is_empty() {
            return Err(AppError::validation("task id must not be empty"));
        }
        let candidate = TimeInterval::new(start, end)?;

        let conflicts: Vec<OccupiedSlot> = context
            .occupied_slots()
            .into_iter()
            .filter(|slot| !is_own_or_moved(slot, task_id, &HashSet::new()))
            .filter(|slot| slot_overlaps(slot, &candidate))
            .collect();

        if !conflicts.is_empty() {
            return Err(AppError::overlap(OverlapError {
                task_id: task_id.to_string(),
                start,
                end,
                conflicts,
            }));
        }

        Ok(CommittedPlacement {
            task_id: task_id.to_string(),
            scheduled_start: start,
            scheduled_end: end,
            scheduling_method: SchedulingMethod::Manual,
        })
    }

    /// Moves a task to another plan day, dropping any placement it had.
    pub fn compute_deferral(&self, task: &TaskRecord, target_date: NaiveDate) -> TaskRecord {
        let mut deferred = task.clone();
        deferred.clear_placement();
        deferred.plan_date = Some(target_date);
        deferred
    }

    pub fn display_bucket(&self, task: &TaskRecord, today: NaiveDate, tz: Tz) -> DisplayBucket {
        let Some(start) = task.scheduled_start else {
            return DisplayBucket::Today;
        };
        let day = schedule_utils::local_date_of(start, tz);
        let tomorrow = today + Duration::days(1);

        if day == today {
            DisplayBucket::Today
        } else if day == tomorrow {
            DisplayBucket::Tomorrow
        } else if day >= next_monday(today) {
            DisplayBucket::NextWeek
        } else {
            DisplayBucket::Today
        }
    }
}

fn next_monday(today: NaiveDate) -> NaiveDate {
    let offset = 7 - i64::from(today.weekday().num_days_from_monday());
    today + Duration::days(offset)
}

fn resolve_work_window(window: &WorkWindow, tz: Tz) -> AppResult<TimeInterval> {
    let start_time = schedule_utils::parse_clock_time(&window.start_time)?;
    let end_time = schedule_utils::parse_clock_time(&window.end_time)?;
    if start_time >= end_time {
        return Err(AppError::validation_with_details(
            "work window must start before it ends",
            json!({"startTime": window.start_time, "endTime": window.end_time}),
        ));
    }
    let start = schedule_utils::resolve_local(window.date, start_time, tz)?;
    let end = schedule_utils::resolve_local(window.date, end_time, tz)?;
    TimeInterval::new(start, end)
}

fn validated_duration(task: &TaskRecord) -> AppResult<i64> {
    match task.duration_minutes {
        Some(minutes) if minutes > 0 => Ok(minutes),
        other => Err(AppError::validation_with_details(
            "task duration must be a positive number of minutes",
            json!({"taskId": task.id, "durationMinutes": other}),
        )),
    }
}

fn validate_selection(selection: &SuggestionSelection) -> AppResult<()> {
    if selection.task_id.trim().is_empty() {
        return Err(AppError::validation("task id must not be empty"));
    }
    schedule_utils::ensure_window(selection.scheduled_start, selection.scheduled_end)
}

fn busy_slot(busy: &BusyInterval) -> Option<OccupiedSlot> {
    let Some((start, end)) = busy.concrete_range() else {
        debug!(
            target: "app::scheduler",
            source_id = ?busy.source_id,
            all_day = busy.is_all_day,
            "busy interval without intraday range skipped"
        );
        return None;
    };
    Some(OccupiedSlot {
        source: OccupiedSource::CalendarEvent,
        source_id: busy.source_id.clone(),
        start,
        end,
    })
}

/// Interval a scheduled task occupies; a missing end is derived from its duration.
fn task_slot(task: &TaskRecord) -> Option<OccupiedSlot> {
    let start = task.scheduled_start?;
    let end = match task.scheduled_end {
        Some(end) => end,
        None => match schedule_utils::add_minutes(start, task.duration_minutes?) {
            Ok(end) => end,
            Err(_) => {
                debug!(
                    target: "app::scheduler",
                    task_id = %task.id,
                    duration = ?task.duration_minutes,
                    "scheduled task end out of range, slot skipped"
                );
                return None;
            }
        },
    };
    (end > start).then(|| OccupiedSlot {
        source: OccupiedSource::ScheduledTask,
        source_id: Some(task.id.clone()),
        start,
        end,
    })
}

fn manual_slot(context: &PlacementContext, task_id: &str) -> Option<OccupiedSlot> {
    context
        .scheduled_tasks
        .iter()
        .filter(|task| task.id == task_id)
        .find(|task| task.scheduling_method == Some(SchedulingMethod::Manual))
        .and_then(task_slot)
}

fn slot_overlaps(slot: &OccupiedSlot, candidate: &TimeInterval) -> bool {
    slot.start < candidate.end && candidate.start < slot.end
}

fn is_own_or_moved(slot: &OccupiedSlot, task_id: &str, moved: &HashSet<String>) -> bool {
    slot.source == OccupiedSource::ScheduledTask
        && slot
            .source_id
            .as_deref()
            .is_some_and(|id| id == task_id || moved.contains(id))
}

fn sum_unique_minutes(slots: &[OccupiedSlot]) -> i64 {
    let mut seen = HashSet::new();
    slots
        .iter()
        .filter(|slot| match slot.source_id.as_deref() {
            Some(id) => seen.insert(id.to_string()),
            None => true,
        })
        .map(|slot| slot.end.signed_duration_since(slot.start).num_minutes())
        .sum()
}

/// `(4 - rank) * 10` plus a fit bonus in `[0, 9]`, so a better rank always wins.
fn score_placement(
    rank: i64,
    start: DateTime<FixedOffset>,
    window: &TimeInterval,
    exact_fit: bool,
) -> f64 {
    let window_minutes = window.duration_minutes().max(1) as f64;
    let remaining = window.end.signed_duration_since(start).num_minutes().max(0) as f64;
    let earliness = (remaining / window_minutes).min(1.0);
    let fit = 8.0 * earliness + if exact_fit { 1.0 } else { 0.0 };
    let base = (NO_PRIORITY_RANK - rank).max(0) as f64 * 10.0;
    ((base + fit) * 100.0).round() / 100.0
}

struct ReasoningContext {
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
    position: usize,
    total: usize,
    exact_fit: bool,
    projected_end: DateTime<FixedOffset>,
    shutdown: DateTime<FixedOffset>,
    over_capacity_minutes: Option<i64>,
    tz: Tz,
}

fn build_reasoning(entry: &PendingTask<'_>, ctx: ReasoningContext) -> String {
    let priority = match entry.task.priority {
        Some(priority) => format!("{priority} priority"),
        None => "no priority".to_string(),
    };

    let mut text = format!(
        "Scheduled {}–{}, the earliest free slot that fits {} min. Task has {}, considered {} of {} in priority order.",
        schedule_utils::format_clock(ctx.start),
        schedule_utils::format_clock(ctx.end),
        entry.duration,
        priority,
        ordinal(ctx.position + 1),
        ctx.total,
    );

    if ctx.exact_fit {
        text.push_str(" It fills the free gap exactly.");
    }

    if let Some(due) = entry.task.due_at {
        if ctx.end > due {
            let late = ctx.end.signed_duration_since(due).num_minutes();
            text.push_str(&format!(
                " {WARNING_MARKER} Ends {late} minutes after its deadline ({}).",
                schedule_utils::format_clock(schedule_utils::to_local(due, ctx.tz)),
            ));
        }
    }

    if let Some(overflow) = ctx.over_capacity_minutes {
        text.push_str(&format!(
            " {WARNING_MARKER} Over capacity: projected end of day {} is {overflow} minutes past your {} shutdown.",
            schedule_utils::format_clock(ctx.projected_end),
            schedule_utils::format_clock(ctx.shutdown),
        ));
    }

    text
}

fn ordinal(value: usize) -> String {
    let suffix = match (value % 10, value % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{value}{suffix}")
}
