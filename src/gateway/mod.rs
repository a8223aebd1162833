//! Boundaries to the outside world: the record store, the blob store and the
//! plan-suggestion service.
//!
//! Every call is async and fallible. The traits return plain `Result`s; the
//! fail-soft behavior (empty list, `None`, `false` plus a log line) lives in
//! the workspace stores that call them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::db::Record;
use crate::error::Result;
use crate::project::{FileDraft, ProjectFile};

pub mod blob;
pub mod json_store;
pub mod plan;

pub use blob::FsBlobStore;
pub use json_store::JsonStore;
pub use plan::{parse_plan, HttpPlanSuggester};

/// CRUD access to one entity type in the remote store.
#[async_trait]
pub trait Gateway<R: Record>: Send + Sync {
    /// All records, optionally only those whose parent is `parent`.
    async fn get_all(&self, parent: Option<&str>) -> Result<Vec<R>>;

    async fn create(&self, draft: R::Draft) -> Result<R>;

    /// Apply a partial update and return the stored record.
    async fn update(&self, id: &str, patch: R::Patch) -> Result<R>;

    async fn delete(&self, id: &str) -> Result<()>;
}

/// Project file metadata, kept next to the project record.
#[async_trait]
pub trait FileIndex: Send + Sync {
    /// Newest first.
    async fn list(&self, project_id: &str) -> Result<Vec<ProjectFile>>;

    async fn attach(&self, project_id: &str, file: FileDraft) -> Result<ProjectFile>;

    async fn detach(&self, project_id: &str, file_id: &str) -> Result<()>;
}

/// Bytes plus the metadata needed to store them.
#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    pub name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Opaque blob storage. Handles are whatever the store hands back from `put`.
#[async_trait]
pub trait BlobGateway: Send + Sync {
    async fn put(&self, project_id: &str, upload: &FileUpload) -> Result<String>;

    async fn remove(&self, handle: &str) -> Result<()>;

    async fn fetch(&self, handle: &str) -> Result<Vec<u8>>;
}

/// A proposed phase/task breakdown for a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSuggestion {
    pub phases: Vec<SuggestedPhase>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedPhase {
    pub name: String,
    #[serde(default)]
    pub tasks: Vec<SuggestedTask>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedTask {
    pub title: String,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
}

/// Produces plan suggestions. `Ok(None)` means "nothing to suggest"; callers
/// treat errors the same way.
#[async_trait]
pub trait PlanSuggester: Send + Sync {
    async fn suggest_plan(&self, project_name: &str, description: &str) -> Result<Option<PlanSuggestion>>;
}
