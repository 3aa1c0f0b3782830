//! Atomic file writes for the persistent lock store.
//!
//! Records are written to a temporary file in the target directory, synced
//! to disk, and renamed over the target. On POSIX the rename is atomic;
//! readers observe either the previous record or the complete new one,
//! never a partial write.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use crate::error::{ArbiterError, Result};

/// Atomically write `content` to `path`.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            ArbiterError::Storage(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = temp_path_for(path)?;
    write_and_sync(&temp_path, content)?;
    replace(&temp_path, path)
}

/// Temporary file path in the same directory as the target, so the final
/// rename never crosses a filesystem boundary.
fn temp_path_for(target: &Path) -> Result<std::path::PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| ArbiterError::Storage(format!("invalid path '{}'", target.display())))?;
    Ok(parent.join(format!(".{}.tmp", filename)))
}

fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        ArbiterError::Storage(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;
    let write_result = file
        .write_all(content)
        .and_then(|_| file.sync_all())
        .map_err(|e| ArbiterError::Storage(format!("failed to write record: {}", e)));
    if write_result.is_err() {
        let _ = fs::remove_file(path);
    }
    write_result
}

#[cfg(unix)]
fn replace(source: &Path, target: &Path) -> Result<()> {
    // rename() replaces an existing destination atomically on POSIX.
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        ArbiterError::Storage(format!("failed to replace '{}': {}", target.display(), e))
    })
}

#[cfg(not(unix))]
fn replace(source: &Path, target: &Path) -> Result<()> {
    // Best effort where rename onto an existing file is not atomic.
    if target.exists() {
        let _ = fs::remove_file(target);
    }
    fs::rename(source, target).map_err(|e| {
        let _ = fs::remove_file(source);
        ArbiterError::Storage(format!("failed to replace '{}': {}", target.display(), e))
    })
}
