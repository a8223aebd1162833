//! Task data structure and its status-change audit trail.
//!
//! A task belongs to one project and one phase, carries a time box used by the
//! weekly calendar, and owns an append-only history of status changes kept
//! most-recent-first.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::hhmm;
use crate::db::{Database, Record};
use crate::fields::{TaskPriority, TaskStatus};
use crate::lifecycle;

/// A schedulable work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub project_id: String,
    pub phase_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub status: TaskStatus,
    pub start_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    /// May be fractional.
    pub estimated_hours: f64,
    pub priority: TaskPriority,
    /// Most recent entry first. Only the lifecycle engine writes here.
    #[serde(default)]
    pub history: Vec<TaskHistoryEntry>,
    pub created_at: DateTime<Utc>,
}

/// Immutable record of one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskHistoryEntry {
    pub status: TaskStatus,
    pub observation: String,
    pub timestamp: DateTime<Utc>,
}

/// A task before persistence. New tasks always start `pending` with no history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub project_id: String,
    pub phase_id: String,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub estimated_hours: f64,
    pub priority: TaskPriority,
}

/// Partial task update.
///
/// Only `status` is audited; `observation` is consumed alongside it and
/// ignored when the status does not change.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub observation: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
    pub estimated_hours: Option<f64>,
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    /// A patch that only moves the task to `status`.
    pub fn status(status: TaskStatus, observation: Option<String>) -> Self {
        TaskPatch {
            status: Some(status),
            observation,
            ..Default::default()
        }
    }
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Not completed and its end date already passed.
    pub fn is_delayed(&self, today: NaiveDate) -> bool {
        !self.is_completed() && self.end_date < today
    }

    /// The most recent history entry, if any.
    pub fn last_change(&self) -> Option<&TaskHistoryEntry> {
        self.history.first()
    }
}

impl Record for Task {
    type Draft = TaskDraft;
    type Patch = TaskPatch;
    const KIND: &'static str = "task";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn from_draft(id: String, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Task {
            id,
            project_id: draft.project_id,
            phase_id: draft.phase_id,
            title: draft.title,
            description: draft.description,
            status: TaskStatus::Pending,
            start_date: draft.start_date,
            start_time: draft.start_time,
            end_date: draft.end_date,
            end_time: draft.end_time,
            estimated_hours: draft.estimated_hours,
            priority: draft.priority,
            history: Vec::new(),
            created_at: now,
        }
    }

    fn apply_patch(&mut self, patch: TaskPatch, now: DateTime<Utc>) {
        lifecycle::apply_patch(self, patch, now);
    }

    fn table(db: &Database) -> &Vec<Self> {
        &db.tasks
    }

    fn table_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.tasks
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }
}
