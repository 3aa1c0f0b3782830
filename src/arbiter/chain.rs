//! Build-chain composition.
//!
//! A composite chain schedules several builds together; locks held by a
//! chain member must not block other members of the same chain, while
//! still blocking unrelated builds. The chain walk gathers the locks the
//! chain already holds into a [`ChainLocks`] set, and the grant rules then
//! evaluate every request against a view of the taken-lock tally with
//! those holders subtracted.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use tracing::warn;

use crate::extractor;
use crate::host::{self, BuildPromotion, RunningBuild};
use crate::model::{Lock, PromotionId, Resource, TakenLock};
use crate::waitreason::WaitReason;

use super::LockArbiter;

/// Locks held inside the requesting build's chain:
/// resource name to (holder promotion to lock).
#[derive(Debug, Default)]
pub(crate) struct ChainLocks {
    by_resource: BTreeMap<String, BTreeMap<PromotionId, Lock>>,
}

impl ChainLocks {
    fn add(&mut self, holder: PromotionId, locks: &[Lock]) {
        for lock in locks {
            self.by_resource
                .entry(lock.name.clone())
                .or_default()
                .insert(holder, lock.clone());
        }
    }

    /// The tally for `name` with this chain's holders subtracted.
    pub(crate) fn view_for(
        &self,
        name: &str,
        taken: &BTreeMap<String, TakenLock>,
    ) -> TakenLock {
        let Some(tally) = taken.get(name) else {
            return TakenLock::new();
        };
        match self.by_resource.get(name) {
            None => tally.clone(),
            Some(holders) => {
                let exclude: BTreeSet<PromotionId> = holders.keys().copied().collect();
                tally.without_holders(&exclude)
            }
        }
    }
}

/// Composite promotions the build depends on, nearest first, deduplicated.
fn chain_members(promotion: &BuildPromotion) -> Vec<Arc<BuildPromotion>> {
    let mut seen = BTreeSet::new();
    let mut members = Vec::new();
    let mut pending: VecDeque<Arc<BuildPromotion>> =
        promotion.depends_on().iter().cloned().collect();
    while let Some(candidate) = pending.pop_front() {
        if !candidate.is_composite() || !seen.insert(candidate.id()) {
            continue;
        }
        pending.extend(candidate.depends_on().iter().cloned());
        members.push(candidate);
    }
    members
}

impl LockArbiter {
    /// Chain-aware grant procedure.
    ///
    /// Walks the build's composite ancestors: members already running
    /// contribute their held locks to the chain set; members still queued
    /// must themselves be grantable against the chain-adjusted view. The
    /// first denial along the walk becomes the whole build's wait reason.
    pub(super) fn arbitrate_chain(
        &self,
        running: &[RunningBuild],
        promotion: &BuildPromotion,
        locks: &[Lock],
        taken: &BTreeMap<String, TakenLock>,
        resources: &BTreeMap<String, Resource>,
        emulation: bool,
    ) -> Result<(), WaitReason> {
        let mut chain = ChainLocks::default();
        for member in chain_members(promotion) {
            if let Some(running_build) = host::find_running(running, member.id()) {
                // A running chain member holds its locks chain-internally.
                // The persisted record carries the values chosen at grant
                // time; extraction is the fallback.
                let member_locks: Vec<Lock> = if self.store.locks_stored(running_build) {
                    match self.store.load(running_build) {
                        Ok(record) => record.into_values().collect(),
                        Err(e) => {
                            warn!(
                                build = running_build.build_id,
                                error = %e,
                                "unreadable chain lock record, falling back to extraction"
                            );
                            extractor::from_promotion(&member)
                        }
                    }
                } else {
                    extractor::from_promotion(&member)
                };
                chain.add(member.id(), &member_locks);
                continue;
            }

            // Still queued: the member must be grantable too, seeing the
            // chain's held locks as non-contending. Its own locks join the
            // chain set first, so a member already cleared this cycle (and
            // therefore present in the tally) does not contend with itself
            // or with the rest of the chain.
            let member_locks = extractor::from_promotion(&member);
            if member_locks.is_empty() {
                continue;
            }
            chain.add(member.id(), &member_locks);
            self.arbitrate_single(&member, &member_locks, taken, resources, &chain, emulation)?;
        }

        self.arbitrate_single(promotion, locks, taken, resources, &chain, emulation)
    }
}
