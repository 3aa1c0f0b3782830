//! In-memory lock store.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{ArbiterError, Result};
use crate::host::RunningBuild;
use crate::model::{BuildId, Lock};

use super::LockStore;

/// In-memory double of the lock store, for tests and for hosts running in
/// emulation without a persistence directory.
#[derive(Debug, Default)]
pub struct MemoryLockStore {
    records: Mutex<BTreeMap<BuildId, BTreeMap<String, Lock>>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_records<T>(&self, f: impl FnOnce(&mut BTreeMap<BuildId, BTreeMap<String, Lock>>) -> T) -> T {
        let mut records = self
            .records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        f(&mut records)
    }
}

impl LockStore for MemoryLockStore {
    fn store(&self, build: &RunningBuild, locks: &BTreeMap<String, Lock>) -> Result<()> {
        self.with_records(|records| {
            records.insert(build.build_id, locks.clone());
        });
        Ok(())
    }

    fn locks_stored(&self, build: &RunningBuild) -> bool {
        self.with_records(|records| records.contains_key(&build.build_id))
    }

    fn load(&self, build: &RunningBuild) -> Result<BTreeMap<String, Lock>> {
        self.with_records(|records| {
            records.get(&build.build_id).cloned().ok_or_else(|| {
                ArbiterError::Storage(format!("no lock record for build {}", build.build_id))
            })
        })
    }

    fn remove(&self, build: &RunningBuild) -> Result<()> {
        self.with_records(|records| {
            records.remove(&build.build_id);
        });
        Ok(())
    }
}
