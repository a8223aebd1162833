//! Task status transitions and their audit trail.
//!
//! Any status may move to any other; nothing is terminal. What the engine
//! guarantees is the history: every change of status prepends exactly one
//! [`TaskHistoryEntry`], and a "change" to the current status writes nothing.

use chrono::{DateTime, Utc};

use crate::fields::TaskStatus;
use crate::task::{Task, TaskHistoryEntry, TaskPatch};

/// Observation recorded when a status change arrives without one.
pub const DEFAULT_OBSERVATION: &str = "Status changed with no detailed observation";

/// Move `task` to `status`, recording the change at the current time.
///
/// Returns `true` when a history entry was written.
pub fn apply_status_change(task: &mut Task, status: TaskStatus, observation: Option<&str>) -> bool {
    apply_status_change_at(task, status, observation, Utc::now())
}

/// [`apply_status_change`] with an explicit timestamp.
pub fn apply_status_change_at(
    task: &mut Task,
    status: TaskStatus,
    observation: Option<&str>,
    now: DateTime<Utc>,
) -> bool {
    if task.status == status {
        return false;
    }

    let observation = observation
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .unwrap_or(DEFAULT_OBSERVATION)
        .to_string();

    let entry = TaskHistoryEntry {
        status,
        observation,
        timestamp: now,
    };
    // Status and history move together; the entry is built before either is touched.
    task.history.insert(0, entry);
    task.status = status;
    true
}

/// Apply a partial update. Plain fields bypass the audit trail; a status
/// field goes through [`apply_status_change_at`] with the patch's observation.
///
/// Returns `true` when the status changed.
pub fn apply_patch(task: &mut Task, patch: TaskPatch, now: DateTime<Utc>) -> bool {
    let TaskPatch {
        title,
        description,
        status,
        observation,
        start_date,
        start_time,
        end_date,
        end_time,
        estimated_hours,
        priority,
    } = patch;

    if let Some(v) = title {
        task.title = v;
    }
    if let Some(v) = description {
        task.description = v;
    }
    if let Some(v) = start_date {
        task.start_date = v;
    }
    if let Some(v) = start_time {
        task.start_time = v;
    }
    if let Some(v) = end_date {
        task.end_date = v;
    }
    if let Some(v) = end_time {
        task.end_time = v;
    }
    if let Some(v) = estimated_hours {
        task.estimated_hours = v;
    }
    if let Some(v) = priority {
        task.priority = v;
    }

    match status {
        Some(s) => apply_status_change_at(task, s, observation.as_deref(), now),
        None => false,
    }
}
