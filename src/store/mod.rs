//! Persistent lock store.
//!
//! When a build transitions to running, the scheduler records which locks
//! it actually acquired, with the values the arbiter chose at grant time.
//! The taken-lock collector prefers this record over re-extracting the
//! build's declarations, because the declarations do not carry chosen
//! values and may no longer be reachable once the build is running.
//!
//! # Record format
//!
//! One record per running build, addressed by running-build id. The
//! encoding is line-oriented text, one lock per line:
//!
//! ```text
//! name<TAB>mode<TAB>value
//! ```
//!
//! with `mode` one of `readLock` / `writeLock`. An empty value leaves the
//! field empty, so the line ends with a trailing tab.
//!
//! # Failure semantics
//!
//! Missing or corrupt records surface as errors from [`LockStore::load`];
//! the collector recovers by falling back to extraction. Write failures
//! are the host's to log; the build is then tallied via extraction,
//! accepting a minor overshoot risk.

mod file;
mod memory;


use std::collections::BTreeMap;

use crate::error::{ArbiterError, Result};
use crate::host::RunningBuild;
use crate::model::{Lock, LockMode};

pub use file::FileLockStore;
pub use memory::MemoryLockStore;

/// Storage contract for per-build lock records.
///
/// Implementations must be safe under concurrent reads and
/// single-writer-per-build writes.
pub trait LockStore: Send + Sync {
    /// Persist the locks a build is holding. Called once when the build
    /// starts; a second call for the same build replaces the record.
    fn store(&self, build: &RunningBuild, locks: &BTreeMap<String, Lock>) -> Result<()>;

    /// Whether a record exists for this build.
    fn locks_stored(&self, build: &RunningBuild) -> bool;

    /// Load the record for this build, keyed by resource name.
    fn load(&self, build: &RunningBuild) -> Result<BTreeMap<String, Lock>>;

    /// Delete the record when the build ends. Removing a missing record
    /// is not an error.
    fn remove(&self, build: &RunningBuild) -> Result<()>;
}

/// Serialize a lock record to its line-oriented form.
fn serialize_record(locks: &BTreeMap<String, Lock>) -> String {
    let mut out = String::new();
    for lock in locks.values() {
        out.push_str(&lock.name);
        out.push('\t');
        out.push_str(lock.mode.as_str());
        out.push('\t');
        out.push_str(&lock.value);
        out.push('\n');
    }
    out
}

/// Parse a lock record from its line-oriented form.
fn parse_record(content: &str) -> Result<BTreeMap<String, Lock>> {
    let mut locks = BTreeMap::new();
    for (index, line) in content.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, '\t');
        let name = parts.next().unwrap_or("");
        let mode = parts.next().and_then(LockMode::parse);
        let value = parts.next();
        match (name, mode, value) {
            (name, Some(mode), Some(value)) if !name.is_empty() => {
                locks.insert(
                    name.to_string(),
                    Lock::with_value(name, mode, value.to_string()),
                );
            }
            _ => {
                return Err(ArbiterError::MalformedRecord(format!(
                    "line {}: '{}'",
                    index + 1,
                    line
                )));
            }
        }
    }
    Ok(locks)
}
