//! Per-resource tally of currently held locks.
//!
//! A [`TakenLock`] groups the holders of one resource by lock mode. The
//! holder is recorded by promotion id together with the value it holds and
//! the id of its build configuration, which the wait-reason formatter uses
//! to name the current holders.

use std::collections::{BTreeMap, BTreeSet};

use super::{Lock, LockMode, PromotionId};

/// What one holder has on a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldValue {
    /// The held value. Empty for quoted resources and ANY/ALL locks.
    pub value: String,

    /// Build-configuration id of the holder, when known.
    pub build_type_id: Option<String>,
}

/// Aggregation of the locks currently held on one resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TakenLock {
    read_locks: BTreeMap<PromotionId, HeldValue>,
    write_locks: BTreeMap<PromotionId, HeldValue>,
}

impl TakenLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `lock` as held by the given promotion.
    pub fn add_lock(&mut self, holder: PromotionId, build_type_id: Option<&str>, lock: &Lock) {
        let held = HeldValue {
            value: lock.value.clone(),
            build_type_id: build_type_id.map(str::to_string),
        };
        match lock.mode {
            LockMode::Read => self.read_locks.insert(holder, held),
            LockMode::Write => self.write_locks.insert(holder, held),
        };
    }

    pub fn has_read_locks(&self) -> bool {
        !self.read_locks.is_empty()
    }

    pub fn has_write_locks(&self) -> bool {
        !self.write_locks.is_empty()
    }

    pub fn read_locks(&self) -> &BTreeMap<PromotionId, HeldValue> {
        &self.read_locks
    }

    pub fn write_locks(&self) -> &BTreeMap<PromotionId, HeldValue> {
        &self.write_locks
    }

    /// Whether any write holder claims the whole resource (empty value).
    pub fn has_all_write_lock(&self) -> bool {
        self.write_locks.values().any(|held| held.value.is_empty())
    }

    /// Non-empty values held across both modes.
    pub fn taken_values(&self) -> BTreeSet<String> {
        self.read_locks
            .values()
            .chain(self.write_locks.values())
            .filter(|held| !held.value.is_empty())
            .map(|held| held.value.clone())
            .collect()
    }

    /// Build-configuration ids of all holders, deduplicated and sorted.
    pub fn holder_build_types(&self) -> BTreeSet<String> {
        self.read_locks
            .values()
            .chain(self.write_locks.values())
            .filter_map(|held| held.build_type_id.clone())
            .collect()
    }

    /// A copy of this tally without the given holders.
    ///
    /// Used by the chain-aware grant rules: holders that belong to the
    /// requesting build's own chain do not contend with it.
    pub fn without_holders(&self, exclude: &BTreeSet<PromotionId>) -> TakenLock {
        let keep = |map: &BTreeMap<PromotionId, HeldValue>| {
            map.iter()
                .filter(|(id, _)| !exclude.contains(id))
                .map(|(id, held)| (*id, held.clone()))
                .collect()
        };
        TakenLock {
            read_locks: keep(&self.read_locks),
            write_locks: keep(&self.write_locks),
        }
    }
}
