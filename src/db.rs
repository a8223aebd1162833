//! In-memory database holding every entity collection.
//!
//! `Database` is the single source of truth read by the dashboard, the weekly
//! view and the project detail view. The [`Record`] trait maps each entity
//! type to its collection so lookups and gateways can be written once.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::client::Client;
use crate::error::Result;
use crate::meeting::Meeting;
use crate::project::{Phase, Project};
use crate::task::Task;

/// An entity stored in one of the [`Database`] collections.
pub trait Record: Clone + Send + Sync + 'static {
    /// The entity without an id, as handed to `create`.
    type Draft: Send + Sync + 'static;
    /// An all-optional partial update.
    type Patch: Send + Sync + 'static;
    /// Singular entity name used in logs and errors.
    const KIND: &'static str;

    fn id(&self) -> &str;
    /// The id of the owning record used for `get_all` filtering: the client
    /// for projects, the project for phases, tasks and meetings.
    fn parent_id(&self) -> Option<&str>;
    fn from_draft(id: String, draft: Self::Draft, now: DateTime<Utc>) -> Self;
    fn apply_patch(&mut self, patch: Self::Patch, now: DateTime<Utc>);
    fn table(db: &Database) -> &Vec<Self>;
    fn table_mut(db: &mut Database) -> &mut Vec<Self>;
    /// Listing order.
    fn sort(_records: &mut [Self]) {}
    /// Remove the record and whatever must go with it. False if it was absent.
    fn remove_from(db: &mut Database, id: &str) -> bool {
        db.remove::<Self>(id).is_some()
    }
}

/// In-memory database for all dashboard entities.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Database {
    #[serde(default)]
    pub clients: Vec<Client>,
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub phases: Vec<Phase>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub meetings: Vec<Meeting>,
}

/// Records whose parent no longer exists.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct OrphanReport {
    pub projects: Vec<String>,
    pub phases: Vec<String>,
    pub tasks: Vec<String>,
    pub meetings: Vec<String>,
}

impl OrphanReport {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty() && self.phases.is_empty() && self.tasks.is_empty() && self.meetings.is_empty()
    }
}

/// What a cascading project removal took with it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Removed {
    pub phases: usize,
    pub tasks: usize,
    pub meetings: usize,
}

impl Database {
    /// Load the database from a JSON file, starting empty if the file doesn't exist
    /// or can't be read.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Database::default();
        }
        let mut buf = String::new();
        match File::open(path).and_then(|mut f| f.read_to_string(&mut buf)) {
            Ok(_) => match serde_json::from_str(&buf) {
                Ok(db) => db,
                Err(e) => {
                    tracing::error!("Error parsing store {}, starting fresh: {e}", path.display());
                    Database::default()
                }
            },
            Err(e) => {
                tracing::error!("Error reading store {}, starting fresh: {e}", path.display());
                Database::default()
            }
        }
    }

    /// Save to JSON using an atomic write (temp file + rename).
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(self)?;
        let mut f = File::create(&tmp)?;
        f.write_all(data.as_bytes())?;
        f.flush()?;
        fs::rename(tmp, path)?;
        Ok(())
    }

    pub fn all<R: Record>(&self) -> &[R] {
        R::table(self)
    }

    pub fn get<R: Record>(&self, id: &str) -> Option<&R> {
        R::table(self).iter().find(|r| r.id() == id)
    }

    pub fn get_mut<R: Record>(&mut self, id: &str) -> Option<&mut R> {
        R::table_mut(self).iter_mut().find(|r| r.id() == id)
    }

    pub fn contains<R: Record>(&self, id: &str) -> bool {
        self.get::<R>(id).is_some()
    }

    /// Replace the record with the same id, or append it.
    pub fn upsert<R: Record>(&mut self, record: R) {
        let table = R::table_mut(self);
        match table.iter_mut().find(|r| r.id() == record.id()) {
            Some(slot) => *slot = record,
            None => table.push(record),
        }
    }

    /// Remove a single record without touching anything that points at it.
    pub fn remove<R: Record>(&mut self, id: &str) -> Option<R> {
        let table = R::table_mut(self);
        let idx = table.iter().position(|r| r.id() == id)?;
        Some(table.remove(idx))
    }

    /// Phases of a project in display order.
    pub fn phases_for_project(&self, project_id: &str) -> Vec<&Phase> {
        let mut phases: Vec<&Phase> = self.phases.iter().filter(|p| p.project_id == project_id).collect();
        phases.sort_by_key(|p| p.order);
        phases
    }

    pub fn tasks_for_project(&self, project_id: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.project_id == project_id).collect()
    }

    pub fn tasks_for_phase(&self, phase_id: &str) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.phase_id == phase_id).collect()
    }

    pub fn meetings_for_project(&self, project_id: &str) -> Vec<&Meeting> {
        self.meetings.iter().filter(|m| m.project_id == project_id).collect()
    }

    /// Order for the next phase appended to a project.
    pub fn next_phase_order(&self, project_id: &str) -> i32 {
        self.phases.iter().filter(|p| p.project_id == project_id).count() as i32 + 1
    }

    /// Remove a phase and every task in it.
    pub fn remove_phase_cascade(&mut self, phase_id: &str) -> Option<(Phase, usize)> {
        let phase = self.remove::<Phase>(phase_id)?;
        let before = self.tasks.len();
        self.tasks.retain(|t| t.phase_id != phase_id);
        Some((phase, before - self.tasks.len()))
    }

    /// Remove a project together with its phases, tasks and meetings.
    pub fn remove_project_cascade(&mut self, project_id: &str) -> Option<(Project, Removed)> {
        let project = self.remove::<Project>(project_id)?;
        let mut removed = Removed::default();

        let before = self.phases.len();
        self.phases.retain(|p| p.project_id != project_id);
        removed.phases = before - self.phases.len();

        let before = self.tasks.len();
        self.tasks.retain(|t| t.project_id != project_id);
        removed.tasks = before - self.tasks.len();

        let before = self.meetings.len();
        self.meetings.retain(|m| m.project_id != project_id);
        removed.meetings = before - self.meetings.len();

        Some((project, removed))
    }

    /// Find records pointing at parents that do not exist.
    pub fn orphans(&self) -> OrphanReport {
        let clients: HashSet<&str> = self.clients.iter().map(|c| c.id.as_str()).collect();
        let projects: HashSet<&str> = self.projects.iter().map(|p| p.id.as_str()).collect();
        let phases: HashSet<&str> = self.phases.iter().map(|p| p.id.as_str()).collect();

        OrphanReport {
            projects: self
                .projects
                .iter()
                .filter(|p| !clients.contains(p.client_id.as_str()))
                .map(|p| p.id.clone())
                .collect(),
            phases: self
                .phases
                .iter()
                .filter(|p| !projects.contains(p.project_id.as_str()))
                .map(|p| p.id.clone())
                .collect(),
            tasks: self
                .tasks
                .iter()
                .filter(|t| !projects.contains(t.project_id.as_str()) || !phases.contains(t.phase_id.as_str()))
                .map(|t| t.id.clone())
                .collect(),
            meetings: self
                .meetings
                .iter()
                .filter(|m| !projects.contains(m.project_id.as_str()))
                .map(|m| m.id.clone())
                .collect(),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Small hand-built records shared by unit tests.

    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};

    use super::*;
    use crate::fields::*;

    pub fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    pub fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    pub fn client(id: &str) -> Client {
        Client {
            id: id.into(),
            name: "Joao Silva".into(),
            company: "Tech Solutions".into(),
            email: "joao@tech.example".into(),
            phone: String::new(),
            status: ClientStatus::Active,
            observations: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
        }
    }

    pub fn project(id: &str, client_id: &str) -> Project {
        Project {
            id: id.into(),
            client_id: client_id.into(),
            name: "Website E-commerce".into(),
            description: "New online store".into(),
            value: 15000.0,
            start_date: date("2024-05-01"),
            due_date: date("2024-06-15"),
            status: ProjectStatus::Active,
            current_phase_id: None,
            files: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    pub fn phase(id: &str, project_id: &str, order: i32) -> Phase {
        Phase {
            id: id.into(),
            project_id: project_id.into(),
            name: format!("Phase {order}"),
            order,
            status: PhaseStatus::NotStarted,
        }
    }

    pub fn task(id: &str, project_id: &str, phase_id: &str, day: &str, start: &str, hours: f64) -> Task {
        let start_time = time(start);
        Task {
            id: id.into(),
            project_id: project_id.into(),
            phase_id: phase_id.into(),
            title: format!("Task {id}"),
            description: String::new(),
            status: TaskStatus::Pending,
            start_date: date(day),
            start_time,
            end_date: date(day),
            end_time: start_time + chrono::Duration::minutes((hours * 60.0) as i64),
            estimated_hours: hours,
            priority: TaskPriority::Medium,
            history: Vec::new(),
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap(),
        }
    }

    pub fn meeting(id: &str, project_id: &str, day: &str, start: &str, end: &str) -> Meeting {
        Meeting {
            id: id.into(),
            project_id: project_id.into(),
            client_id: "c1".into(),
            title: format!("Meeting {id}"),
            agenda: String::new(),
            date: date(day),
            start_time: time(start),
            end_time: time(end),
            status: MeetingStatus::Scheduled,
            observations: String::new(),
        }
    }

    /// One client, one project with two phases, no tasks.
    pub fn seeded() -> Database {
        Database {
            clients: vec![client("c1")],
            projects: vec![project("p1", "c1")],
            phases: vec![phase("f2", "p1", 2), phase("f1", "p1", 1)],
            tasks: Vec::new(),
            meetings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut db = seeded();
        let mut p = db.get::<Project>("p1").cloned().unwrap();
        p.name = "Renamed".into();
        db.upsert(p);
        assert_eq!(db.projects.len(), 1);
        assert_eq!(db.get::<Project>("p1").unwrap().name, "Renamed");

        db.upsert(project("p2", "c1"));
        assert_eq!(db.projects.len(), 2);
    }

    #[test]
    fn test_phases_for_project_sorted_by_order() {
        let db = seeded();
        let ids: Vec<&str> = db.phases_for_project("p1").iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["f1", "f2"]);
        assert_eq!(db.next_phase_order("p1"), 3);
        assert_eq!(db.next_phase_order("nope"), 1);
    }

    #[test]
    fn test_removed_task_disappears_from_derived_lists() {
        let mut db = seeded();
        db.tasks.push(task("t1", "p1", "f1", "2024-05-15", "10:00", 4.0));
        db.tasks.push(task("t2", "p1", "f1", "2024-05-15", "14:00", 1.0));

        let removed = db.remove::<Task>("t1").unwrap();
        assert_eq!(removed.id, "t1");
        assert!(db.get::<Task>("t1").is_none());
        assert!(db.tasks_for_phase("f1").iter().all(|t| t.id != "t1"));
        assert!(db.tasks_for_project("p1").iter().all(|t| t.id != "t1"));
        assert!(db.remove::<Task>("t1").is_none());
    }

    #[test]
    fn test_project_cascade() {
        let mut db = seeded();
        db.tasks.push(task("t1", "p1", "f1", "2024-05-15", "10:00", 4.0));
        db.meetings.push(meeting("m1", "p1", "2024-05-15", "10:00", "11:00"));

        let (project, removed) = db.remove_project_cascade("p1").unwrap();
        assert_eq!(project.id, "p1");
        assert_eq!(removed, Removed { phases: 2, tasks: 1, meetings: 1 });
        assert!(db.phases.is_empty() && db.tasks.is_empty() && db.meetings.is_empty());
    }

    #[test]
    fn test_orphans() {
        let mut db = seeded();
        db.tasks.push(task("t1", "p1", "gone", "2024-05-15", "10:00", 1.0));
        db.meetings.push(meeting("m1", "nope", "2024-05-15", "10:00", "11:00"));
        db.remove::<Client>("c1");

        let report = db.orphans();
        assert_eq!(report.projects, ["p1"]);
        assert_eq!(report.tasks, ["t1"]);
        assert_eq!(report.meetings, ["m1"]);
        assert!(report.phases.is_empty());
        assert!(!report.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut db = seeded();
        db.tasks.push(task("t1", "p1", "f1", "2024-05-15", "10:00", 4.0));
        db.save(&path).unwrap();

        let loaded = Database::load(&path);
        assert_eq!(loaded, db);
        assert_eq!(Database::load(&dir.path().join("missing.json")), Database::default());
    }
}
