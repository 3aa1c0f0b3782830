//! File-backed lock store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::audit::{AuditAction, AuditEvent, AuditLog};
use crate::error::{ArbiterError, Result};
use crate::host::RunningBuild;
use crate::model::{BuildId, Lock};

use super::{LockStore, parse_record, serialize_record};

/// Lock store keeping one record file per running build under a root
/// directory. Writes are atomic (write-temp-then-rename), so concurrent
/// readers never observe a partial record.
#[derive(Debug, Clone)]
pub struct FileLockStore {
    root: PathBuf,
    audit: Option<AuditLog>,
}

impl FileLockStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            audit: None,
        }
    }

    /// Attach an audit log recording store and remove transitions.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    fn record_path(&self, build_id: BuildId) -> PathBuf {
        self.root.join(format!("{}.locks", build_id))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl LockStore for FileLockStore {
    fn store(&self, build: &RunningBuild, locks: &BTreeMap<String, Lock>) -> Result<()> {
        let path = self.record_path(build.build_id);
        crate::fs::atomic_write(&path, serialize_record(locks).as_bytes())?;
        debug!(build = build.build_id, locks = locks.len(), "stored lock record");
        if let Some(audit) = &self.audit {
            audit.append_best_effort(
                &AuditEvent::new(AuditAction::LocksStored)
                    .for_build(build.build_id)
                    .for_promotion(build.promotion.id()),
            );
        }
        Ok(())
    }

    fn locks_stored(&self, build: &RunningBuild) -> bool {
        self.record_path(build.build_id).exists()
    }

    fn load(&self, build: &RunningBuild) -> Result<BTreeMap<String, Lock>> {
        let path = self.record_path(build.build_id);
        let content = fs::read_to_string(&path).map_err(|e| {
            ArbiterError::Storage(format!(
                "failed to read lock record '{}': {}",
                path.display(),
                e
            ))
        })?;
        parse_record(&content)
    }

    fn remove(&self, build: &RunningBuild) -> Result<()> {
        let path = self.record_path(build.build_id);
        match fs::remove_file(&path) {
            Ok(()) => {
                if let Some(audit) = &self.audit {
                    audit.append_best_effort(
                        &AuditEvent::new(AuditAction::LocksReleased).for_build(build.build_id),
                    );
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArbiterError::Storage(format!(
                "failed to remove lock record '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}
