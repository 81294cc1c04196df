//! JSON output file with backup-on-write
//!
//! A write goes to `<file>.tmp` first, the previous file is copied to
//! `<file>.backup`, then the temporary file is renamed over the target.
//! A failure at any step leaves the previous output untouched.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::domain::SessionDocument;
use crate::error::PersistError;

#[derive(Debug, Clone)]
pub struct OutputStore {
    path: PathBuf,
    backup_previous: bool,
}

impl OutputStore {
    pub fn new(path: impl Into<PathBuf>, backup_previous: bool) -> Self {
        Self {
            path: path.into(),
            backup_previous,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn temp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "backup")
    }

    /// Previous session file, if one exists
    pub async fn load(&self) -> Result<Option<SessionDocument>, PersistError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistError::io(&self.path, e)),
        };
        let document: SessionDocument = serde_json::from_slice(&bytes)?;
        debug!(path = %self.path.display(), products = document.products.len(), "previous output loaded");
        Ok(Some(document))
    }

    pub async fn write(&self, document: &SessionDocument) -> Result<(), PersistError> {
        write_json_atomically(&self.path, document, self.backup_previous).await?;
        info!(
            path = %self.path.display(),
            products = document.products.len(),
            session_id = %document.metadata.session_id,
            "output written"
        );
        Ok(())
    }
}

/// Pretty-printed JSON written through a temporary sibling
pub async fn write_json_atomically<T: Serialize>(
    path: &Path,
    value: &T,
    backup_previous: bool,
) -> Result<(), PersistError> {
    let bytes = serde_json::to_vec_pretty(value)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| PersistError::io(parent, e))?;
    }

    let temp = sibling(path, "tmp");
    if let Err(e) = write_and_sync(&temp, &bytes).await {
        discard(&temp).await;
        return Err(e);
    }

    if backup_previous && fs::try_exists(path).await.unwrap_or(false) {
        let backup = sibling(path, "backup");
        if let Err(e) = fs::copy(path, &backup).await {
            discard(&temp).await;
            return Err(PersistError::io(backup, e));
        }
        debug!(backup = %backup.display(), "previous output backed up");
    }

    if let Err(e) = fs::rename(&temp, path).await {
        discard(&temp).await;
        return Err(PersistError::io(path, e));
    }
    Ok(())
}

async fn write_and_sync(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let mut file = fs::File::create(path)
        .await
        .map_err(|e| PersistError::io(path, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| PersistError::io(path, e))?;
    file.sync_all().await.map_err(|e| PersistError::io(path, e))?;
    Ok(())
}

async fn discard(temp: &Path) {
    if fs::metadata(temp).await.map(|m| m.is_file()).unwrap_or(false) {
        if let Err(e) = fs::remove_file(temp).await {
            warn!(path = %temp.display(), error = %e, "failed to remove temporary file");
        }
    }
}

/// `products.json` -> `products.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sibling_names() {
        let store = OutputStore::new("out/products.json", true);
        assert_eq!(store.temp_path(), PathBuf::from("out/products.json.tmp"));
        assert_eq!(store.backup_path(), PathBuf::from("out/products.json.backup"));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = OutputStore::new(dir.path().join("missing.json"), true);
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_write_json_creates_parent_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.json");
        write_json_atomically(&path, &serde_json::json!({"ok": true}), false)
            .await
            .unwrap();
        assert!(path.is_file());
        assert!(!sibling(&path, "tmp").exists());
        assert!(!sibling(&path, "backup").exists());
    }
}
