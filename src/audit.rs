//! Arbitration audit trail.
//!
//! Append-only NDJSON log (one JSON object per line) of arbitration
//! outcomes and lock-store transitions, for after-the-fact inspection of
//! who was granted what and why a build waited.
//!
//! The log is optional: hosts construct an [`AuditLog`] and attach it to
//! the arbiter or the file store. Append failures are logged and never
//! propagate; auditing must not affect decisions.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ArbiterError, Result};
use crate::model::{BuildId, PromotionId};

/// Actions recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A queued build was cleared to start.
    Granted,
    /// A queued build received a wait reason.
    Denied,
    /// A running build's acquired locks were persisted.
    LocksStored,
    /// A finished build's lock record was removed.
    LocksReleased,
}

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// RFC3339 timestamp of the event.
    pub ts: DateTime<Utc>,

    pub action: AuditAction,

    /// Promotion the event concerns, when applicable.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub promotion: Option<PromotionId>,

    /// Running-build id, for store transitions.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub build: Option<BuildId>,

    /// Action-specific details.
    #[serde(skip_serializing_if = "Value::is_null", default)]
    pub details: Value,
}

impl AuditEvent {
    pub fn new(action: AuditAction) -> Self {
        Self {
            ts: Utc::now(),
            action,
            promotion: None,
            build: None,
            details: Value::Null,
        }
    }

    pub fn for_promotion(mut self, promotion: PromotionId) -> Self {
        self.promotion = Some(promotion);
        self
    }

    pub fn for_build(mut self, build: BuildId) -> Self {
        self.build = Some(build);
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }
}

/// Append-only NDJSON audit log.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single JSON line.
    pub fn append(&self, event: &AuditEvent) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ArbiterError::Storage(format!(
                    "failed to create audit directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut line = serde_json::to_string(event)
            .map_err(|e| ArbiterError::Storage(format!("failed to serialize audit event: {}", e)))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| {
                ArbiterError::Storage(format!(
                    "failed to open audit log '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;
        file.write_all(line.as_bytes())
            .map_err(|e| ArbiterError::Storage(format!("failed to append audit event: {}", e)))
    }

    /// Append, logging instead of propagating failures.
    pub fn append_best_effort(&self, event: &AuditEvent) {
        if let Err(e) = self.append(event) {
            tracing::warn!(error = %e, "failed to append audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn appends_one_json_object_per_line() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("audit.ndjson"));

        log.append(&AuditEvent::new(AuditAction::Granted).for_promotion(1))
            .unwrap();
        log.append(
            &AuditEvent::new(AuditAction::Denied)
                .for_promotion(2)
                .with_details(json!({"reason": "db unavailable"})),
        )
        .unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: AuditEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.action, AuditAction::Granted);
        assert_eq!(first.promotion, Some(1));

        let second: AuditEvent = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second.action, AuditAction::Denied);
        assert_eq!(second.details["reason"], "db unavailable");
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path().join("nested").join("audit.ndjson"));
        log.append(&AuditEvent::new(AuditAction::LocksStored).for_build(100))
            .unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn best_effort_append_swallows_errors() {
        // Directory as target: the open fails but nothing panics.
        let dir = TempDir::new().unwrap();
        let log = AuditLog::new(dir.path());
        log.append_best_effort(&AuditEvent::new(AuditAction::Granted));
    }
}
