//! Projects, their phases and their attached files.
//!
//! A project belongs to one client and exclusively owns its file list. Phases
//! reference their project by id; the reference is a lookup relation, not
//! ownership.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Database, Record};
use crate::fields::{PhaseStatus, ProjectStatus};

/// A unit of billable work for a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub client_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Contract value.
    #[serde(default)]
    pub value: f64,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    pub status: ProjectStatus,
    /// Weak reference; not required to point at an existing phase.
    #[serde(default)]
    pub current_phase_id: Option<String>,
    /// Newest first.
    #[serde(default)]
    pub files: Vec<ProjectFile>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDraft {
    pub client_id: String,
    pub name: String,
    pub description: String,
    pub value: f64,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
}

/// Partial project update. The file list is deliberately absent: files only
/// change through the upload/delete flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub value: Option<f64>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: Option<ProjectStatus>,
    /// `Some(None)` clears the current phase.
    pub current_phase_id: Option<Option<String>>,
}

/// Metadata for a blob stored on behalf of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectFile {
    pub id: String,
    pub name: String,
    /// Blob store handle (or URL) used for download and removal.
    pub handle: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// File metadata ready to be attached to a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDraft {
    pub name: String,
    pub handle: String,
    pub mime_type: String,
    pub size: u64,
}

/// An ordered stage of a project's plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Phase {
    pub id: String,
    pub project_id: String,
    pub name: String,
    /// Display/execution order. Expected unique within a project, not enforced.
    pub order: i32,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDraft {
    pub project_id: String,
    pub name: String,
    pub order: i32,
    pub status: PhaseStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhasePatch {
    pub name: Option<String>,
    pub order: Option<i32>,
    pub status: Option<PhaseStatus>,
}

impl Project {
    pub fn matches(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }

    pub fn file(&self, file_id: &str) -> Option<&ProjectFile> {
        self.files.iter().find(|f| f.id == file_id)
    }
}

impl ProjectFile {
    pub fn from_draft(id: String, draft: FileDraft, now: DateTime<Utc>) -> Self {
        ProjectFile {
            id,
            name: draft.name,
            handle: draft.handle,
            mime_type: draft.mime_type,
            size: draft.size,
            uploaded_at: now,
        }
    }
}

/// Human file size ("0 B", "1.5 KB", "2 MB").
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".into();
    }
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 10.0).round() / 10.0;
    if rounded.fract() == 0.0 {
        format!("{} {}", rounded as u64, UNITS[unit])
    } else {
        format!("{:.1} {}", rounded, UNITS[unit])
    }
}

impl Record for Project {
    type Draft = ProjectDraft;
    type Patch = ProjectPatch;
    const KIND: &'static str = "project";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.client_id)
    }

    fn from_draft(id: String, draft: ProjectDraft, now: DateTime<Utc>) -> Self {
        Project {
            id,
            client_id: draft.client_id,
            name: draft.name,
            description: draft.description,
            value: draft.value,
            start_date: draft.start_date,
            due_date: draft.due_date,
            status: ProjectStatus::Active,
            current_phase_id: None,
            files: Vec::new(),
            created_at: now,
        }
    }

    fn apply_patch(&mut self, patch: ProjectPatch, _now: DateTime<Utc>) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.description {
            self.description = v;
        }
        if let Some(v) = patch.value {
            self.value = v;
        }
        if let Some(v) = patch.start_date {
            self.start_date = v;
        }
        if let Some(v) = patch.due_date {
            self.due_date = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
        if let Some(v) = patch.current_phase_id {
            self.current_phase_id = v;
        }
    }

    fn table(db: &Database) -> &Vec<Self> {
        &db.projects
    }

    fn table_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.projects
    }

    fn sort(records: &mut [Self]) {
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    fn remove_from(db: &mut Database, id: &str) -> bool {
        db.remove_project_cascade(id).is_some()
    }
}

impl Record for Phase {
    type Draft = PhaseDraft;
    type Patch = PhasePatch;
    const KIND: &'static str = "phase";

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        Some(&self.project_id)
    }

    fn from_draft(id: String, draft: PhaseDraft, _now: DateTime<Utc>) -> Self {
        Phase {
            id,
            project_id: draft.project_id,
            name: draft.name,
            order: draft.order,
            status: draft.status,
        }
    }

    fn apply_patch(&mut self, patch: PhasePatch, _now: DateTime<Utc>) {
        if let Some(v) = patch.name {
            self.name = v;
        }
        if let Some(v) = patch.order {
            self.order = v;
        }
        if let Some(v) = patch.status {
            self.status = v;
        }
    }

    fn table(db: &Database) -> &Vec<Self> {
        &db.phases
    }

    fn table_mut(db: &mut Database) -> &mut Vec<Self> {
        &mut db.phases
    }

    fn sort(records: &mut [Self]) {
        records.sort_by_key(|p| p.order);
    }

    fn remove_from(db: &mut Database, id: &str) -> bool {
        db.remove_phase_cascade(id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
    }

    #[test]
    fn test_patch_leaves_files_alone() {
        let now = Utc::now();
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let mut project = Project::from_draft(
            "p1".into(),
            ProjectDraft {
                client_id: "c1".into(),
                name: "Shop".into(),
                description: String::new(),
                value: 100.0,
                start_date: day,
                due_date: day,
            },
            now,
        );
        project.files.push(ProjectFile::from_draft(
            "f1".into(),
            FileDraft { name: "a.pdf".into(), handle: "p1/a.pdf".into(), mime_type: "application/pdf".into(), size: 3 },
            now,
        ));
        assert_eq!(project.status, ProjectStatus::Active);

        project.apply_patch(
            ProjectPatch { name: Some("Store".into()), current_phase_id: Some(Some("f2".into())), ..Default::default() },
            now,
        );
        assert_eq!(project.name, "Store");
        assert_eq!(project.current_phase_id.as_deref(), Some("f2"));
        assert_eq!(project.files.len(), 1);

        project.apply_patch(ProjectPatch { current_phase_id: Some(None), ..Default::default() }, now);
        assert_eq!(project.current_phase_id, None);
    }
}
