//! Atomic replacement of on-disk snapshots
//!
//! Snapshots are written to a staging file in the target's directory and
//! renamed over the target, so readers see either the previous snapshot or the
//! complete new one.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::errors::AgentError;

/// Unique sibling path of `target` used while a replacement is being built.
pub fn staging_path(target: &Path) -> PathBuf {
    let file_name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    target.with_file_name(format!(
        ".{}.{}.tmp",
        file_name,
        uuid::Uuid::new_v4().simple()
    ))
}

pub async fn ensure_parent_dir(target: &Path) -> Result<(), AgentError> {
    match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).await?;
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Moves a finished staging file over `target`.
pub async fn commit(staging: &Path, target: &Path) -> Result<(), AgentError> {
    if let Err(err) = fs::rename(staging, target).await {
        let _ = fs::remove_file(staging).await;
        return Err(AgentError::IoError(format!(
            "Failed to replace {}: {}",
            target.display(),
            err
        )));
    }
    Ok(())
}

/// Writes `contents` to `target` through a staging file.
pub async fn write_atomically(target: &Path, contents: &[u8]) -> Result<(), AgentError> {
    ensure_parent_dir(target).await?;
    let staging = staging_path(target);
    if let Err(err) = fs::write(&staging, contents).await {
        let _ = fs::remove_file(&staging).await;
        return Err(err.into());
    }
    commit(&staging, target).await
}

pub async fn exists(path: &Path) -> bool {
    fs::try_exists(path).await.unwrap_or(false)
}
