//! File-backed record store.
//!
//! One JSON document holds every collection. Each mutation is applied to a
//! copy of the current state, written atomically, and only then becomes the
//! live state, so a failed write leaves both disk and memory untouched.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{FileIndex, Gateway};
use crate::db::{Database, Record};
use crate::error::{Error, Result};
use crate::project::{FileDraft, Project, ProjectFile};

pub struct JsonStore {
    path: PathBuf,
    state: Mutex<Database>,
}

impl JsonStore {
    /// Open the store at `path`, starting empty if the file is missing or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Database::load(&path);
        tracing::debug!(
            "Opened store {} ({} projects, {} tasks)",
            path.display(),
            state.projects.len(),
            state.tasks.len()
        );
        JsonStore {
            path,
            state: Mutex::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply `f` to a copy of the state, persist it, then swap it in.
    async fn commit<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> Result<T> + Send,
        T: Send + 'static,
    {
        let mut live = self.state.lock().await;
        let mut next = live.clone();
        let out = f(&mut next)?;

        let path = self.path.clone();
        let saved = tokio::task::spawn_blocking(move || next.save(&path).map(|_| next))
            .await
            .map_err(|e| Error::Gateway(format!("store writer failed: {e}")))??;
        *live = saved;
        Ok(out)
    }
}

#[async_trait]
impl<R: Record> Gateway<R> for JsonStore {
    async fn get_all(&self, parent: Option<&str>) -> Result<Vec<R>> {
        let db = self.state.lock().await;
        let mut records: Vec<R> = R::table(&db)
            .iter()
            .filter(|r| parent.map_or(true, |p| r.parent_id() == Some(p)))
            .cloned()
            .collect();
        R::sort(&mut records);
        Ok(records)
    }

    async fn create(&self, draft: R::Draft) -> Result<R> {
        self.commit(move |db| {
            let record = R::from_draft(Uuid::new_v4().to_string(), draft, Utc::now());
            R::table_mut(db).push(record.clone());
            Ok(record)
        })
        .await
    }

    async fn update(&self, id: &str, patch: R::Patch) -> Result<R> {
        self.commit(move |db| {
            let record = db.get_mut::<R>(id).ok_or_else(|| Error::not_found(R::KIND, id))?;
            record.apply_patch(patch, Utc::now());
            Ok(record.clone())
        })
        .await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.commit(move |db| {
            if R::remove_from(db, id) {
                Ok(())
            } else {
                Err(Error::not_found(R::KIND, id))
            }
        })
        .await
    }
}

#[async_trait]
impl FileIndex for JsonStore {
    async fn list(&self, project_id: &str) -> Result<Vec<ProjectFile>> {
        let db = self.state.lock().await;
        db.get::<Project>(project_id)
            .map(|p| p.files.clone())
            .ok_or_else(|| Error::not_found(Project::KIND, project_id))
    }

    async fn attach(&self, project_id: &str, file: FileDraft) -> Result<ProjectFile> {
        self.commit(move |db| {
            let project = db
                .get_mut::<Project>(project_id)
                .ok_or_else(|| Error::not_found(Project::KIND, project_id))?;
            let stored = ProjectFile::from_draft(Uuid::new_v4().to_string(), file, Utc::now());
            project.files.insert(0, stored.clone());
            Ok(stored)
        })
        .await
    }

    async fn detach(&self, project_id: &str, file_id: &str) -> Result<()> {
        self.commit(move |db| {
            let project = db
                .get_mut::<Project>(project_id)
                .ok_or_else(|| Error::not_found(Project::KIND, project_id))?;
            let before = project.files.len();
            project.files.retain(|f| f.id != file_id);
            if project.files.len() == before {
                return Err(Error::not_found("file", file_id));
            }
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Client, ClientDraft, ClientPatch};
    use crate::db::fixtures::*;
    use crate::fields::{ClientStatus, PhaseStatus, TaskPriority, TaskStatus};
    use crate::project::{Phase, PhaseDraft, ProjectDraft};
    use crate::task::{Task, TaskDraft, TaskPatch};

    fn client_draft(name: &str) -> ClientDraft {
        ClientDraft {
            name: name.into(),
            company: "Design Pro".into(),
            email: "maria@design.example".into(),
            phone: String::new(),
            status: ClientStatus::Lead,
            observations: String::new(),
        }
    }

    #[tokio::test]
    async fn test_create_update_delete_round_trip_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonStore::open(&path);

        let created: Client = store.create(client_draft("Maria")).await.unwrap();
        assert!(!created.id.is_empty());

        let updated: Client = store
            .update(&created.id, ClientPatch { status: Some(ClientStatus::Active), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(updated.status, ClientStatus::Active);

        let reopened = JsonStore::open(&path);
        let all: Vec<Client> = reopened.get_all(None).await.unwrap();
        assert_eq!(all, vec![updated.clone()]);

        Gateway::<Client>::delete(&reopened, &created.id).await.unwrap();
        let err = Gateway::<Client>::delete(&reopened, &created.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(Gateway::<Client>::get_all(&JsonStore::open(&path), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json"));
        let err = Gateway::<Client>::update(&store, "ghost", ClientPatch::default()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_all_filters_by_parent_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json"));
        for (project, order) in [("p1", 2), ("p2", 1), ("p1", 1)] {
            let _: Phase = store
                .create(PhaseDraft {
                    project_id: project.into(),
                    name: format!("{project}-{order}"),
                    order,
                    status: PhaseStatus::NotStarted,
                })
                .await
                .unwrap();
        }
        let phases: Vec<Phase> = store.get_all(Some("p1")).await.unwrap();
        let names: Vec<&str> = phases.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["p1-1", "p1-2"]);
        assert_eq!(Gateway::<Phase>::get_all(&store, None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_task_update_with_observation_writes_history() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json"));
        let task: Task = store
            .create(TaskDraft {
                project_id: "p1".into(),
                phase_id: "f1".into(),
                title: "Requirements".into(),
                description: String::new(),
                start_date: date("2024-05-01"),
                start_time: time("09:00"),
                end_date: date("2024-05-01"),
                end_time: time("12:00"),
                estimated_hours: 3.0,
                priority: TaskPriority::High,
            })
            .await
            .unwrap();

        let moved: Task = store
            .update(&task.id, TaskPatch::status(TaskStatus::Completed, Some("signed off".into())))
            .await
            .unwrap();
        assert_eq!(moved.history.len(), 1);
        assert_eq!(moved.history[0].observation, "signed off");

        let same: Task = store
            .update(&task.id, TaskPatch::status(TaskStatus::Completed, Some("again".into())))
            .await
            .unwrap();
        assert_eq!(same.history.len(), 1);
    }

    #[tokio::test]
    async fn test_project_delete_cascades_in_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut seed = seeded();
        seed.tasks.push(task("t1", "p1", "f1", "2024-05-15", "10:00", 1.0));
        seed.save(&path).unwrap();

        let store = JsonStore::open(&path);
        Gateway::<Project>::delete(&store, "p1").await.unwrap();
        assert!(Gateway::<Phase>::get_all(&store, None).await.unwrap().is_empty());
        assert!(Gateway::<Task>::get_all(&store, None).await.unwrap().is_empty());
        assert_eq!(Gateway::<Client>::get_all(&store, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("store.json"));
        let project: Project = store
            .create(ProjectDraft {
                client_id: "c1".into(),
                name: "Brand refresh".into(),
                description: String::new(),
                value: 0.0,
                start_date: date("2024-05-01"),
                due_date: date("2024-05-31"),
            })
            .await
            .unwrap();

        let draft = |name: &str| FileDraft {
            name: name.into(),
            handle: format!("{}/{name}", project.id),
            mime_type: "application/pdf".into(),
            size: 10,
        };
        let first = store.attach(&project.id, draft("brief.pdf")).await.unwrap();
        let second = store.attach(&project.id, draft("contract.pdf")).await.unwrap();

        let files = store.list(&project.id).await.unwrap();
        assert_eq!(files, vec![second.clone(), first.clone()]);

        store.detach(&project.id, &first.id).await.unwrap();
        assert!(store.detach(&project.id, &first.id).await.unwrap_err().is_not_found());
        assert!(store.attach("ghost", draft("x.pdf")).await.unwrap_err().is_not_found());
        assert_eq!(store.list(&project.id).await.unwrap(), vec![second]);
    }
}
