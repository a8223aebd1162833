//! Meetings and the time slots they occupy.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dates::hhmm;
use crate::db::{Database, Record};
use crate::fields::MeetingStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub project_id: String,
    /// Copied from the project when the meeting is scheduled.
    pub client_id: String,
    pub title: String,
    #[serde(default)]
    pub agenda: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub status: MeetingStatus,
    #[serde(default)]
    pub observations: String,
}

/// A meeting before persistence. `client_id` is filled in from the project by
/// the meeting store; whatever the caller puts there is overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingDraft {
    pub project_id: String,
    #[serde(default)]
    pub client_id: String,
    pub title: String,
    pub agenda: String,
    pub date: NaiveDate,
    #[serde(with = "hhmm")]
    pub start_time: NaiveTime,
    #[serde(with = "hhmm")]
    pub end_time: NaiveTime,
    pub observations: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingPatch {
    pub title: Option<String>,
    pub agenda: Option<String>,
    pub date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub status: Option<MeetingStatus>,
    pub observations: Option<String>,
}

/// The half-open interval `[start, end)` on one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSlot {
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Self {
        TimeSlot { date, start, end }
    }

    /// Same date and `self.start < other.end && self.end > other.start`.
    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.date == other.date && self.start < other.end && self.end > other.start
    }

    /// Ends strictly after it starts. Meetings never cross midnight.
    pub fn is_ordered(&self) -> bool {
        self.start < self.end
    }
}

impl Meeting {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.date, self.start_time, self.end_time)
    }

    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle) || self.agenda.to_lowercase().contains(&needle)
    }
}

impl MeetingDraft {
    pub fn slot(&self) -> TimeSlot {
        TimeSlot::new(self.date, self.start_time, self.end_time)
    }
}

impl MeetingPatch {
    /// The slot `current` would occupy once this patch is applied.
    pub fn slot_for(&self, current: &Meeting) -> TimeSlot {
        TimeSlot::new(
            self.date.unwrap_or(current.date),
            self.start_time.unwrap_or(current.start_time),
            self.end_time.unwrap_or(current.end_time),
        )
    }
}

impl Record for Meeting {
    type Draft = MeetingDraft;
    type Patch = MeetingPatch;
    const KIND: &'static str = "meeting";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn from_draft(id: String, draft: MeetingDraft, _now: DateTime<Utc>) -> Self {
        Meeting {
            id,
            project_id: draft.project_id,
            client_id: draft.client_id,
            title: draft.title,
            agenda: draft.agenda,
            date: draft.date,
            start_time: draft.start_time,
            end_time: draft.end_time,
            status: MeetingStatus::Scheduled,
            observations: draft.observations,
        }
    }

    fn apply_patch(&mut self, patch: MeetingPatch, _now: DateTime<Utc>) {
        if let Some(v) = patch.title {
            self.title = v;
        }
        if let Some(v) = patch.agenda {
            self.agenda = v;
        }
        if let Some(v) = patch.date {
            self.date = v;
        }
        if let Some(v) = patch.start_time {
            self.start_time = v;
        }
        if let Some(v) = patch.end_time {
            self.end_time = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.observations {
            self.observations = v;
        }
    }

    fn table(db: &Database) -> &Vec<Self> {
        &db.meetings
    }

    fn table_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.meetings
    }

    fn sort(records: &mut [Self]) {
        records.sort_by_key(|m| (m.date, m.start_time));
    }
}
