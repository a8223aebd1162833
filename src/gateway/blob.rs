//! Local-disk blob storage for project files.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{BlobGateway, FileUpload};
use crate::error::{Error, Result};

/// Stores each upload under `<root>/<project_id>/<millis>-<uuid>.<ext>`.
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsBlobStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a handle under the root, refusing anything that would escape it.
    fn resolve(&self, handle: &str) -> Result<PathBuf> {
        let rel = Path::new(handle);
        let clean = !handle.is_empty() && rel.components().all(|c| matches!(c, Component::Normal(_)));
        if !clean {
            return Err(Error::InvalidInput(format!("bad blob handle '{handle}'")));
        }
        Ok(self.root.join(rel))
    }
}

/// Build the storage name for an upload. Only the extension of the original
/// name survives, so user-supplied names never reach the filesystem.
fn blob_name(project_id: &str, original: &str) -> String {
    let stamp = Utc::now().timestamp_millis();
    let random = Uuid::new_v4().simple().to_string();
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!("{project_id}/{stamp}-{random}.{}", ext.to_ascii_lowercase())
        }
        _ => format!("{project_id}/{stamp}-{random}"),
    }
}

#[async_trait]
impl BlobGateway for FsBlobStore {
    async fn put(&self, project_id: &str, upload: &FileUpload) -> Result<String> {
        let handle = blob_name(project_id, &upload.name);
        let path = self.resolve(&handle)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &upload.bytes).await?;
        tracing::debug!("Stored {} bytes at {}", upload.bytes.len(), path.display());
        Ok(handle)
    }

    async fn remove(&self, handle: &str) -> Result<()> {
        let path = self.resolve(handle)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found("blob", handle)),
            Err(e) => Err(e.into()),
        }
    }

    async fn fetch(&self, handle: &str) -> Result<Vec<u8>> {
        let path = self.resolve(handle)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found("blob", handle)),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> FileUpload {
        FileUpload {
            name: name.into(),
            mime_type: "application/pdf".into(),
            bytes: b"%PDF-1.4".to_vec(),
        }
    }

    #[test]
    fn test_blob_name_keeps_extension_only() {
        let name = blob_name("p1", "../../Contract Final.PDF");
        assert!(name.starts_with("p1/"));
        assert!(name.ends_with(".pdf"));
        assert!(!name.contains("Contract"));

        let bare = blob_name("p1", "README");
        assert!(!bare.contains('.'));
    }

    #[tokio::test]
    async fn test_put_fetch_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());

        let handle = store.put("p1", &upload("brief.pdf")).await.unwrap();
        assert_eq!(store.fetch(&handle).await.unwrap(), b"%PDF-1.4");

        store.remove(&handle).await.unwrap();
        assert!(store.fetch(&handle).await.unwrap_err().is_not_found());
        assert!(store.remove(&handle).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_handles_cannot_escape_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path().join("blobs"));
        for handle in ["../secret", "/etc/passwd", "", "p1/../../x"] {
            assert!(matches!(store.fetch(handle).await, Err(Error::InvalidInput(_))), "{handle}");
        }
    }
}
