//! Application state: the in-memory [`Database`] plus the gateways that
//! persist it.
//!
//! Callers never mutate the database directly. Each aggregate has a narrow
//! store (`ws.tasks()`, `ws.projects()`, ...) whose writes go to the gateway
//! first and touch memory only once the gateway has accepted them. Failures
//! are logged and reported as `None` / `false`; the prior state is kept.

use std::sync::Arc;

use chrono::NaiveTime;
use tokio::sync::broadcast;

use crate::client::{Client, ClientDraft, ClientPatch};
use crate::db::{Database, Record};
use crate::error::{Error, Result};
use crate::fields::{MeetingStatus, PhaseStatus, TaskPriority, TaskStatus};
use crate::gateway::{
    BlobGateway, FileIndex, FileUpload, FsBlobStore, Gateway, JsonStore, PlanSuggester, PlanSuggestion,
};
use crate::meeting::{Meeting, MeetingDraft, MeetingPatch, TimeSlot};
use crate::project::{FileDraft, Phase, PhaseDraft, PhasePatch, Project, ProjectDraft, ProjectFile, ProjectPatch};
use crate::task::{Task, TaskDraft, TaskHistoryEntry, TaskPatch};

const EVENT_CAPACITY: usize = 64;

/// Hours given to a suggested task that arrives without a usable estimate.
const DEFAULT_SUGGESTED_HOURS: f64 = 1.0;

/// A successful mutation, published after memory has been updated.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Created { kind: &'static str, id: String },
    Updated { kind: &'static str, id: String },
    Deleted { kind: &'static str, id: String },
    StatusChanged { task_id: String, from: TaskStatus, to: TaskStatus },
}

/// Every external boundary the workspace talks to.
#[derive(Clone)]
pub struct Gateways {
    pub clients: Arc<dyn Gateway<Client>>,
    pub projects: Arc<dyn Gateway<Project>>,
    pub phases: Arc<dyn Gateway<Phase>>,
    pub tasks: Arc<dyn Gateway<Task>>,
    pub meetings: Arc<dyn Gateway<Meeting>>,
    pub files: Arc<dyn FileIndex>,
    pub blobs: Arc<dyn BlobGateway>,
    pub planner: Option<Arc<dyn PlanSuggester>>,
}

impl Gateways {
    /// Route every record type through one JSON store.
    pub fn local(store: Arc<JsonStore>, blobs: FsBlobStore) -> Self {
        Gateways {
            clients: store.clone(),
            projects: store.clone(),
            phases: store.clone(),
            tasks: store.clone(),
            meetings: store.clone(),
            files: store,
            blobs: Arc::new(blobs),
            planner: None,
        }
    }

    pub fn with_planner(mut self, planner: Arc<dyn PlanSuggester>) -> Self {
        self.planner = Some(planner);
        self
    }
}

/// What [`Workspace::apply_plan`] managed to create.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PlanOutcome {
    pub phases: usize,
    pub tasks: usize,
}

pub struct Workspace {
    db: Database,
    gateways: Gateways,
    events: broadcast::Sender<Change>,
}

async fn fetch_all<R: Record>(gateway: &dyn Gateway<R>) -> Option<Vec<R>> {
    match gateway.get_all(None).await {
        Ok(records) => Some(records),
        Err(e) => {
            tracing::error!("Error loading {} records: {e}", R::KIND);
            None
        }
    }
}

/// Give up a store's exclusive borrow for a shared one of the same lifetime.
fn frozen(ws: &mut Workspace) -> &Database {
    &ws.db
}

fn replace<R>(slot: &mut Vec<R>, fetched: Option<Vec<R>>) -> bool {
    match fetched {
        Some(records) => {
            *slot = records;
            true
        }
        None => false,
    }
}

impl Workspace {
    pub fn new(gateways: Gateways) -> Self {
        Self::from_parts(Database::default(), gateways)
    }

    /// Start from an already-populated database.
    pub fn from_parts(db: Database, gateways: Gateways) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Workspace { db, gateways, events }
    }

    /// Fetch every collection. A collection whose fetch fails keeps its
    /// previous contents; returns false if any fetch failed.
    pub async fn load(&mut self) -> bool {
        let g = self.gateways.clone();
        let mut complete = true;
        complete &= replace(&mut self.db.clients, fetch_all(g.clients.as_ref()).await);
        complete &= replace(&mut self.db.projects, fetch_all(g.projects.as_ref()).await);
        complete &= replace(&mut self.db.phases, fetch_all(g.phases.as_ref()).await);
        complete &= replace(&mut self.db.tasks, fetch_all(g.tasks.as_ref()).await);
        complete &= replace(&mut self.db.meetings, fetch_all(g.meetings.as_ref()).await);
        complete
    }

    pub fn state(&self) -> &Database {
        &self.db
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.events.subscribe()
    }

    pub fn clients(&mut self) -> ClientStore<'_> {
        ClientStore { ws: self }
    }

    pub fn projects(&mut self) -> ProjectStore<'_> {
        ProjectStore { ws: self }
    }

    pub fn phases(&mut self) -> PhaseStore<'_> {
        PhaseStore { ws: self }
    }

    pub fn tasks(&mut self) -> TaskStore<'_> {
        TaskStore { ws: self }
    }

    pub fn meetings(&mut self) -> MeetingStore<'_> {
        MeetingStore { ws: self }
    }

    fn emit(&self, change: Change) {
        // No subscribers is not an error.
        let _ = self.events.send(change);
    }

    async fn create_via<R: Record>(&mut self, gateway: Arc<dyn Gateway<R>>, draft: R::Draft) -> Option<R> {
        match gateway.create(draft).await {
            Ok(record) => {
                tracing::debug!("Created {} {}", R::KIND, record.id());
                self.db.upsert(record.clone());
                self.emit(Change::Created { kind: R::KIND, id: record.id().to_string() });
                Some(record)
            }
            Err(e) => {
                tracing::error!("Error creating {}: {e}", R::KIND);
                None
            }
        }
    }

    async fn update_via<R: Record>(&mut self, gateway: Arc<dyn Gateway<R>>, id: &str, patch: R::Patch) -> Option<R> {
        match gateway.update(id, patch).await {
            Ok(record) => {
                tracing::debug!("Updated {} {id}", R::KIND);
                self.db.upsert(record.clone());
                self.emit(Change::Updated { kind: R::KIND, id: id.to_string() });
                Some(record)
            }
            Err(e) => {
                tracing::error!("Error updating {} {id}: {e}", R::KIND);
                None
            }
        }
    }

    async fn delete_via<R: Record>(&mut self, gateway: Arc<dyn Gateway<R>>, id: &str) -> bool {
        match gateway.delete(id).await {
            Ok(()) => {
                tracing::debug!("Deleted {} {id}", R::KIND);
                R::remove_from(&mut self.db, id);
                self.emit(Change::Deleted { kind: R::KIND, id: id.to_string() });
                true
            }
            Err(e) => {
                tracing::error!("Error deleting {} {id}: {e}", R::KIND);
                false
            }
        }
    }

    fn meeting_conflicts(&self, slot: &TimeSlot, exclude: Option<&str>) -> Vec<&Meeting> {
        self.db
            .meetings
            .iter()
            .filter(|m| exclude != Some(m.id.as_str()) && m.slot().overlaps(slot))
            .collect()
    }

    fn check_project_refs(&self, draft: &ProjectDraft) -> Result<()> {
        if !self.db.contains::<Client>(&draft.client_id) {
            return Err(Error::dangling(Project::KIND, Client::KIND, &draft.client_id));
        }
        Ok(())
    }

    fn check_phase_refs(&self, draft: &PhaseDraft) -> Result<()> {
        if !self.db.contains::<Project>(&draft.project_id) {
            return Err(Error::dangling(Phase::KIND, Project::KIND, &draft.project_id));
        }
        Ok(())
    }

    fn check_task_refs(&self, draft: &TaskDraft) -> Result<()> {
        if !self.db.contains::<Project>(&draft.project_id) {
            return Err(Error::dangling(Task::KIND, Project::KIND, &draft.project_id));
        }
        match self.db.get::<Phase>(&draft.phase_id) {
            Some(phase) if phase.project_id == draft.project_id => Ok(()),
            _ => Err(Error::dangling(Task::KIND, Phase::KIND, &draft.phase_id)),
        }
    }

    /// Ask the configured planner for a breakdown of the project.
    pub async fn suggest_plan(&self, project_id: &str) -> Option<PlanSuggestion> {
        let Some(planner) = &self.gateways.planner else {
            tracing::warn!("No plan service configured");
            return None;
        };
        let Some(project) = self.db.get::<Project>(project_id) else {
            tracing::error!("{}", Error::not_found(Project::KIND, project_id));
            return None;
        };
        match planner.suggest_plan(&project.name, &project.description).await {
            Ok(plan) => plan,
            Err(e) => {
                tracing::error!("Error suggesting plan for {project_id}: {e}");
                None
            }
        }
    }

    /// Create the suggested phases and tasks. Each phase is created before its
    /// tasks; a phase that fails to persist takes its tasks with it.
    pub async fn apply_plan(&mut self, project_id: &str, plan: &PlanSuggestion) -> Option<PlanOutcome> {
        let Some(project) = self.db.get::<Project>(project_id).cloned() else {
            tracing::error!("{}", Error::not_found(Project::KIND, project_id));
            return None;
        };
        let base = self.db.next_phase_order(project_id);
        let start_time = NaiveTime::from_hms_opt(9, 0, 0)?;
        let end_time = NaiveTime::from_hms_opt(10, 0, 0)?;
        let mut outcome = PlanOutcome::default();

        for (idx, suggested) in plan.phases.iter().enumerate() {
            let draft = PhaseDraft {
                project_id: project.id.clone(),
                name: suggested.name.clone(),
                order: base + idx as i32,
                status: PhaseStatus::NotStarted,
            };
            let Some(phase) = self.phases().create(draft).await else {
                tracing::warn!("Skipping tasks of suggested phase '{}'", suggested.name);
                continue;
            };
            outcome.phases += 1;

            for task in &suggested.tasks {
                let hours = task
                    .estimated_hours
                    .filter(|h| h.is_finite() && *h > 0.0)
                    .unwrap_or(DEFAULT_SUGGESTED_HOURS);
                let draft = TaskDraft {
                    project_id: project.id.clone(),
                    phase_id: phase.id.clone(),
                    title: task.title.clone(),
                    description: String::new(),
                    start_date: project.start_date,
                    start_time,
                    end_date: project.due_date,
                    end_time,
                    estimated_hours: hours,
                    priority: TaskPriority::Medium,
                };
                if self.tasks().create(draft).await.is_some() {
                    outcome.tasks += 1;
                }
            }
        }
        Some(outcome)
    }
}

pub struct ClientStore<'a> {
    ws: &'a mut Workspace,
}

impl<'a> ClientStore<'a> {
    /// Newest first, optionally filtered by name or company.
    pub fn list(self, needle: Option<&str>) -> Vec<&'a Client> {
        let mut clients: Vec<&Client> = frozen(self.ws)
            .clients
            .iter()
            .filter(|c| needle.map_or(true, |n| c.matches(n)))
            .collect();
        clients.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        clients
    }

    pub async fn create(&mut self, draft: ClientDraft) -> Option<Client> {
        let gateway = self.ws.gateways.clients.clone();
        self.ws.create_via(gateway, draft).await
    }

    pub async fn update(&mut self, id: &str, patch: ClientPatch) -> Option<Client> {
        let gateway = self.ws.gateways.clients.clone();
        self.ws.update_via(gateway, id, patch).await
    }

    /// Projects of the client stay behind; see [`Database::orphans`].
    pub async fn delete(&mut self, id: &str) -> bool {
        let gateway = self.ws.gateways.clients.clone();
        self.ws.delete_via(gateway, id).await
    }
}

pub struct ProjectStore<'a> {
    ws: &'a mut Workspace,
}

impl<'a> ProjectStore<'a> {
    pub fn list(self, needle: Option<&str>) -> Vec<&'a Project> {
        let mut projects: Vec<&Project> = frozen(self.ws)
            .projects
            .iter()
            .filter(|p| needle.map_or(true, |n| p.matches(n)))
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    pub async fn create(&mut self, draft: ProjectDraft) -> Option<Project> {
        if let Err(e) = self.ws.check_project_refs(&draft) {
            tracing::error!("Refusing to create project: {e}");
            return None;
        }
        let gateway = self.ws.gateways.projects.clone();
        self.ws.create_via(gateway, draft).await
    }

    /// Create the project, then upload the file to it. The file result is
    /// `None` if only the upload failed.
    pub async fn create_with_file(
        &mut self,
        draft: ProjectDraft,
        upload: FileUpload,
    ) -> Option<(Project, Option<ProjectFile>)> {
        let project = self.create(draft).await?;
        let file = self.upload_file(&project.id, upload).await;
        let project = self.ws.db.get::<Project>(&project.id).cloned().unwrap_or(project);
        Some((project, file))
    }

    pub async fn update(&mut self, id: &str, patch: ProjectPatch) -> Option<Project> {
        if let Some(Some(phase_id)) = &patch.current_phase_id {
            let owned = self.ws.db.get::<Phase>(phase_id).is_some_and(|p| p.project_id == id);
            if !owned {
                tracing::error!(
                    "Refusing to update project {id}: {}",
                    Error::dangling(Project::KIND, Phase::KIND, phase_id)
                );
                return None;
            }
        }
        let gateway = self.ws.gateways.projects.clone();
        self.ws.update_via(gateway, id, patch).await
    }

    /// Delete the project with its phases, tasks, meetings and stored files.
    pub async fn delete(&mut self, id: &str) -> bool {
        let handles: Vec<String> = self
            .ws
            .db
            .get::<Project>(id)
            .map(|p| p.files.iter().map(|f| f.handle.clone()).collect())
            .unwrap_or_default();

        let gateway = self.ws.gateways.projects.clone();
        if !self.ws.delete_via(gateway, id).await {
            return false;
        }
        let blobs = self.ws.gateways.blobs.clone();
        for handle in handles {
            if let Err(e) = blobs.remove(&handle).await {
                tracing::warn!("Could not remove stored file {handle} of deleted project {id}: {e}");
            }
        }
        true
    }

    /// Re-read the file list of a project from the file index.
    pub async fn refresh_files(&mut self, project_id: &str) -> Vec<ProjectFile> {
        match self.ws.gateways.files.list(project_id).await {
            Ok(files) => {
                if let Some(project) = self.ws.db.get_mut::<Project>(project_id) {
                    project.files = files.clone();
                }
                files
            }
            Err(e) => {
                tracing::error!("Error listing files of project {project_id}: {e}");
                Vec::new()
            }
        }
    }

    /// Store the bytes, then record the metadata. If recording fails the
    /// stored bytes are removed again.
    pub async fn upload_file(&mut self, project_id: &str, upload: FileUpload) -> Option<ProjectFile> {
        if !self.ws.db.contains::<Project>(project_id) {
            tracing::error!("Refusing upload: {}", Error::not_found(Project::KIND, project_id));
            return None;
        }
        let blobs = self.ws.gateways.blobs.clone();
        let handle = match blobs.put(project_id, &upload).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("Error uploading {}: {e}", upload.name);
                return None;
            }
        };

        let draft = FileDraft {
            name: upload.name.clone(),
            handle: handle.clone(),
            mime_type: upload.mime_type.clone(),
            size: upload.size(),
        };
        match self.ws.gateways.files.attach(project_id, draft).await {
            Ok(file) => {
                if let Some(project) = self.ws.db.get_mut::<Project>(project_id) {
                    project.files.insert(0, file.clone());
                }
                self.ws.emit(Change::Created { kind: "file", id: file.id.clone() });
                Some(file)
            }
            Err(e) => {
                tracing::error!("Error recording {}: {e}", upload.name);
                if let Err(e) = blobs.remove(&handle).await {
                    tracing::warn!("Could not remove orphaned upload {handle}: {e}");
                }
                None
            }
        }
    }

    /// Remove the stored bytes (best effort), then the metadata.
    pub async fn delete_file(&mut self, project_id: &str, file_id: &str) -> bool {
        let Some(file) = self.ws.db.get::<Project>(project_id).and_then(|p| p.file(file_id)).cloned() else {
            tracing::error!("{}", Error::not_found("file", file_id));
            return false;
        };
        if let Err(e) = self.ws.gateways.blobs.remove(&file.handle).await {
            tracing::warn!("Could not remove stored file {}, continuing: {e}", file.handle);
        }
        match self.ws.gateways.files.detach(project_id, file_id).await {
            Ok(()) => {
                if let Some(project) = self.ws.db.get_mut::<Project>(project_id) {
                    project.files.retain(|f| f.id != file_id);
                }
                self.ws.emit(Change::Deleted { kind: "file", id: file_id.to_string() });
                true
            }
            Err(e) => {
                tracing::error!("Error removing file {file_id}: {e}");
                false
            }
        }
    }

    pub async fn download_file(&self, project_id: &str, file_id: &str) -> Option<(ProjectFile, Vec<u8>)> {
        let Some(file) = self.ws.db.get::<Project>(project_id).and_then(|p| p.file(file_id)) else {
            tracing::error!("{}", Error::not_found("file", file_id));
            return None;
        };
        match self.ws.gateways.blobs.fetch(&file.handle).await {
            Ok(bytes) => Some((file.clone(), bytes)),
            Err(e) => {
                tracing::error!("Error downloading {}: {e}", file.name);
                None
            }
        }
    }
}

pub struct PhaseStore<'a> {
    ws: &'a mut Workspace,
}

impl<'a> PhaseStore<'a> {
    pub fn for_project(self, project_id: &str) -> Vec<&'a Phase> {
        frozen(self.ws).phases_for_project(project_id)
    }

    pub async fn create(&mut self, draft: PhaseDraft) -> Option<Phase> {
        if let Err(e) = self.ws.check_phase_refs(&draft) {
            tracing::error!("Refusing to create phase: {e}");
            return None;
        }
        let gateway = self.ws.gateways.phases.clone();
        self.ws.create_via(gateway, draft).await
    }

    /// Add a phase after the existing ones.
    pub async fn append(&mut self, project_id: &str, name: &str) -> Option<Phase> {
        let order = self.ws.db.next_phase_order(project_id);
        self.create(PhaseDraft {
            project_id: project_id.to_string(),
            name: name.to_string(),
            order,
            status: PhaseStatus::NotStarted,
        })
        .await
    }

    pub async fn update(&mut self, id: &str, patch: PhasePatch) -> Option<Phase> {
        let gateway = self.ws.gateways.phases.clone();
        self.ws.update_via(gateway, id, patch).await
    }

    /// Delete the phase and its tasks.
    pub async fn delete(&mut self, id: &str) -> bool {
        let gateway = self.ws.gateways.phases.clone();
        self.ws.delete_via(gateway, id).await
    }
}

pub struct TaskStore<'a> {
    ws: &'a mut Workspace,
}

impl<'a> TaskStore<'a> {
    /// Newest first, optionally only one project's tasks.
    pub fn list(self, project_id: Option<&str>) -> Vec<&'a Task> {
        let mut tasks: Vec<&Task> = frozen(self.ws)
            .tasks
            .iter()
            .filter(|t| project_id.map_or(true, |p| t.project_id == p))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        tasks
    }

    pub fn history(self, id: &str) -> Option<&'a [TaskHistoryEntry]> {
        frozen(self.ws).get::<Task>(id).map(|t| t.history.as_slice())
    }

    pub async fn create(&mut self, draft: TaskDraft) -> Option<Task> {
        if let Err(e) = self.ws.check_task_refs(&draft) {
            tracing::error!("Refusing to create task: {e}");
            return None;
        }
        let gateway = self.ws.gateways.tasks.clone();
        self.ws.create_via(gateway, draft).await
    }

    /// Apply a patch. A status field goes through the lifecycle rules and
    /// publishes [`Change::StatusChanged`] when it actually moved.
    pub async fn update(&mut self, id: &str, patch: TaskPatch) -> Option<Task> {
        let before = self.ws.db.get::<Task>(id).map(|t| t.status);
        let gateway = self.ws.gateways.tasks.clone();
        let task = self.ws.update_via(gateway, id, patch).await?;
        if let Some(from) = before.filter(|s| *s != task.status) {
            tracing::debug!("Task {id} moved {from} -> {}", task.status);
            self.ws.emit(Change::StatusChanged { task_id: id.to_string(), from, to: task.status });
        }
        Some(task)
    }

    pub async fn change_status(&mut self, id: &str, status: TaskStatus, observation: Option<&str>) -> Option<Task> {
        self.update(id, TaskPatch::status(status, observation.map(str::to_string))).await
    }

    pub async fn delete(&mut self, id: &str) -> bool {
        let gateway = self.ws.gateways.tasks.clone();
        self.ws.delete_via(gateway, id).await
    }
}

pub struct MeetingStore<'a> {
    ws: &'a mut Workspace,
}

impl<'a> MeetingStore<'a> {
    /// By date then start time, optionally filtered by title or agenda.
    pub fn list(self, needle: Option<&str>) -> Vec<&'a Meeting> {
        let mut meetings: Vec<&Meeting> = frozen(self.ws)
            .meetings
            .iter()
            .filter(|m| needle.map_or(true, |n| m.matches(n)))
            .collect();
        meetings.sort_by_key(|m| (m.date, m.start_time));
        meetings
    }

    /// Meetings overlapping `slot`, skipping `exclude` (the meeting being edited).
    pub fn conflicts_for(self, slot: &TimeSlot, exclude: Option<&str>) -> Vec<&'a Meeting> {
        let ws: &'a Workspace = self.ws;
        ws.meeting_conflicts(slot, exclude)
    }

    /// Schedule a meeting. Overlaps are logged, not refused.
    pub async fn create(&mut self, mut draft: MeetingDraft) -> Option<Meeting> {
        let Some(project) = self.ws.db.get::<Project>(&draft.project_id) else {
            tracing::error!(
                "Refusing to create meeting: {}",
                Error::dangling(Meeting::KIND, Project::KIND, &draft.project_id)
            );
            return None;
        };
        draft.client_id = project.client_id.clone();
        if !draft.slot().is_ordered() {
            tracing::error!("Refusing to create meeting '{}': it must end after it starts", draft.title);
            return None;
        }

        let clashes = self.ws.meeting_conflicts(&draft.slot(), None).len();
        if clashes > 0 {
            tracing::warn!("Meeting '{}' overlaps {clashes} existing meeting(s)", draft.title);
        }
        let gateway = self.ws.gateways.meetings.clone();
        self.ws.create_via(gateway, draft).await
    }

    /// Refuses a patch that would leave the meeting ending before it starts.
    pub async fn update(&mut self, id: &str, patch: MeetingPatch) -> Option<Meeting> {
        if let Some(current) = self.ws.db.get::<Meeting>(id) {
            if !patch.slot_for(current).is_ordered() {
                tracing::error!("Refusing to update meeting {id}: it must end after it starts");
                return None;
            }
        }
        let gateway = self.ws.gateways.meetings.clone();
        self.ws.update_via(gateway, id, patch).await
    }

    pub async fn mark_held(&mut self, id: &str, observations: Option<String>) -> Option<Meeting> {
        self.update(id, MeetingPatch { status: Some(MeetingStatus::Held), observations, ..Default::default() })
            .await
    }

    pub async fn cancel(&mut self, id: &str) -> Option<Meeting> {
        self.update(id, MeetingPatch { status: Some(MeetingStatus::Cancelled), ..Default::default() })
            .await
    }

    pub async fn delete(&mut self, id: &str) -> bool {
        let gateway = self.ws.gateways.meetings.clone();
        self.ws.delete_via(gateway, id).await
    }
}
