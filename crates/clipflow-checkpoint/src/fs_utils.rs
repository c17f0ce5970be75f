//! Filesystem helpers for crash-safe writes.
//!
//! A write goes to a sibling temp file first and is then renamed over the
//! destination, so readers only ever see the old or the new content. The temp
//! file lives in the same directory to keep the rename on one filesystem.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{CheckpointError, CheckpointResult};

/// Sibling temp path used while writing `path` (`name.json` -> `name.json.tmp`).
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| OsString::from("checkpoint"));
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `bytes` to the temp sibling of `path` and flush it to disk.
///
/// Returns the temp path. The temp file is removed if the write fails.
pub async fn write_temp(path: &Path, bytes: &[u8]) -> CheckpointResult<PathBuf> {
    let tmp = temp_path_for(path);

    let result = async {
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await
    }
    .await;

    if let Err(e) = result {
        discard(&tmp).await;
        tracing::error!("Failed to write temp file {}: {}", tmp.display(), e);
        return Err(CheckpointError::io(&tmp, e));
    }

    Ok(tmp)
}

/// Atomically move a finished temp file over `dst`.
///
/// On failure the temp file is removed and `dst` is left untouched.
pub async fn replace_with(tmp: &Path, dst: &Path) -> CheckpointResult<()> {
    fs::rename(tmp, dst).await.map_err(|e| {
        let _ = std::fs::remove_file(tmp);
        tracing::error!(
            "Failed to rename temp file {} -> {}: {}",
            tmp.display(),
            dst.display(),
            e
        );
        CheckpointError::io(dst, e)
    })
}

/// Best-effort removal of a leftover temp file.
pub async fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!("Failed to remove temp file {}: {}", tmp.display(), e);
        }
    }
}

/// Write `bytes` to `path` via temp file and rename.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> CheckpointResult<()> {
    let tmp = write_temp(path, bytes).await?;
    replace_with(&tmp, path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_for() {
        let tmp = temp_path_for(Path::new("/data/checkpoint_demo.json"));
        assert_eq!(tmp, PathBuf::from("/data/checkpoint_demo.json.tmp"));
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        write_atomic(&path, b"old").await.unwrap();
        write_atomic(&path, b"new").await.unwrap();

        assert_eq!(fs::read_to_string(&path).await.unwrap(), "new");
        assert!(!temp_path_for(&path).exists(), "temp file should be gone");
    }

    #[tokio::test]
    async fn test_failed_rename_keeps_destination_and_removes_temp() {
        let dir = TempDir::new().unwrap();
        // A non-empty directory at the destination makes the rename fail
        let path = dir.path().join("state.json");
        fs::create_dir(&path).await.unwrap();
        fs::write(path.join("keep"), b"x").await.unwrap();

        let result = write_atomic(&path, b"new").await;

        assert!(matches!(result, Err(CheckpointError::Io { .. })));
        assert!(path.join("keep").exists());
        assert!(!temp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_write_temp_into_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("state.json");
        assert!(write_temp(&path, b"x").await.is_err());
    }
}
