//! In-cycle reservations of custom-resource value picks.
//!
//! When the arbiter grants a build a read lock on a custom resource with
//! no specific value, it picks one of the free values. The pick must be
//! visible to every later decision in the same scheduling pass, or two
//! builds cleared in one pass could start with the same value. This module
//! is that cross-decision memory.
//!
//! Entries are pruned at the start of each arbitration
//! ([`ResourceAffinity::actualize`]) to the promotions still running or
//! queued to start, so abandoned picks from aborted passes disappear on
//! their own.
//!
//! All operations take the same internal mutex, so each is atomic and the
//! set tolerates concurrent readers such as monitoring.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use tracing::debug;

use crate::model::{PromotionId, Resource};

type Assignments = BTreeMap<PromotionId, BTreeMap<String, String>>;

/// Reservation set: promotion id to (resource id to chosen value).
#[derive(Debug, Default)]
pub struct ResourceAffinity {
    assignments: Mutex<Assignments>,
}

impl ResourceAffinity {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_assignments<T>(&self, f: impl FnOnce(&mut Assignments) -> T) -> T {
        let mut assignments = self
            .assignments
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        f(&mut assignments)
    }

    /// Drop entries whose promotion id is not in `live`.
    pub fn actualize(&self, live: &BTreeSet<PromotionId>) {
        self.with_assignments(|assignments| {
            let before = assignments.len();
            assignments.retain(|id, _| live.contains(id));
            let dropped = before - assignments.len();
            if dropped > 0 {
                debug!(dropped, "pruned stale affinity entries");
            }
        });
    }

    /// Record this cycle's picks for a promotion, replacing any prior
    /// entry for the same promotion.
    pub fn store(&self, promotion: PromotionId, picks: BTreeMap<String, String>) {
        self.with_assignments(|assignments| {
            assignments.insert(promotion, picks);
        });
    }

    /// Values assigned to promotions other than `promotion` for the given
    /// resource in this cycle.
    pub fn other_assigned_values(
        &self,
        resource: &Resource,
        promotion: PromotionId,
    ) -> BTreeSet<String> {
        self.with_assignments(|assignments| {
            assignments
                .iter()
                .filter(|(id, _)| **id != promotion)
                .filter_map(|(_, picks)| picks.get(&resource.id))
                .filter(|value| !value.is_empty())
                .cloned()
                .collect()
        })
    }

    /// The picks recorded for a promotion, if any.
    pub fn assigned_values(&self, promotion: PromotionId) -> Option<BTreeMap<String, String>> {
        self.with_assignments(|assignments| assignments.get(&promotion).cloned())
    }
}
