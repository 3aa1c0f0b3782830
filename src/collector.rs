//! Taken-lock collection.
//!
//! Builds the per-resource tally of locks currently held, scoped to one
//! project: running builds contribute their persisted lock record when one
//! exists (authoritative, because values were chosen at grant time) and
//! fall back to extraction otherwise; queued builds already cleared this
//! cycle always contribute via extraction, since nothing is persisted for
//! them yet.

use std::collections::BTreeMap;

use tracing::warn;

use crate::extractor;
use crate::host::{BuildPromotion, QueuedBuild, RunningBuild};
use crate::model::{Lock, TakenLock};
use crate::store::LockStore;

/// Collect the taken-lock tally for a project.
pub fn collect_taken_locks(
    store: &dyn LockStore,
    running: &[RunningBuild],
    cleared: &[QueuedBuild],
    project_id: &str,
) -> BTreeMap<String, TakenLock> {
    let mut taken = BTreeMap::new();

    for build in running {
        let promotion = &build.promotion;
        if promotion.project_id() != Some(project_id) {
            continue;
        }
        let locks = if store.locks_stored(build) {
            match store.load(build) {
                Ok(record) => record.into_values().collect(),
                Err(e) => {
                    warn!(
                        build = build.build_id,
                        error = %e,
                        "unreadable lock record, falling back to extraction"
                    );
                    extractor::from_promotion(promotion)
                }
            }
        } else {
            extractor::from_promotion(promotion)
        };
        add_locks(&mut taken, promotion, &locks);
    }

    for build in cleared {
        let promotion = &build.promotion;
        if promotion.project_id() != Some(project_id) {
            continue;
        }
        let locks = extractor::from_promotion(promotion);
        add_locks(&mut taken, promotion, &locks);
    }

    taken
}

fn add_locks(taken: &mut BTreeMap<String, TakenLock>, holder: &BuildPromotion, locks: &[Lock]) {
    for lock in locks {
        taken
            .entry(lock.name.clone())
            .or_default()
            .add_lock(holder.id(), holder.build_type_id(), lock);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LockMode;
    use crate::store::MemoryLockStore;
    use crate::test_support::{promotion_with_locks, queued, running};
    use std::collections::BTreeMap as Map;

    #[test]
    fn running_build_prefers_stored_record() {
        let store = MemoryLockStore::new();
        let promo = promotion_with_locks(1, "project", &[Lock::new("db", LockMode::Read)]);
        let build = running(100, promo);
        // The stored record has the value the arbiter actually chose.
        store
            .store(
                &build,
                &Map::from([(
                    "slots".to_string(),
                    Lock::with_value("slots", LockMode::Read, "v1"),
                )]),
            )
            .unwrap();

        let taken = collect_taken_locks(&store, &[build], &[], "project");
        assert!(taken.contains_key("slots"));
        assert!(!taken.contains_key("db"));
    }

    #[test]
    fn running_build_without_record_is_extracted() {
        let store = MemoryLockStore::new();
        let build = running(
            100,
            promotion_with_locks(1, "project", &[Lock::new("db", LockMode::Read)]),
        );

        let taken = collect_taken_locks(&store, &[build], &[], "project");
        assert!(taken["db"].has_read_locks());
    }

    #[test]
    fn cleared_builds_are_extracted() {
        let store = MemoryLockStore::new();
        let build = queued(promotion_with_locks(
            2,
            "project",
            &[Lock::new("db", LockMode::Write)],
        ));

        let taken = collect_taken_locks(&store, &[], &[build], "project");
        assert!(taken["db"].has_write_locks());
    }

    #[test]
    fn other_projects_are_out_of_scope() {
        let store = MemoryLockStore::new();
        let running_build = running(
            100,
            promotion_with_locks(1, "other", &[Lock::new("db", LockMode::Read)]),
        );
        let cleared_build = queued(promotion_with_locks(
            2,
            "other",
            &[Lock::new("db", LockMode::Write)],
        ));

        let taken = collect_taken_locks(&store, &[running_build], &[cleared_build], "project");
        assert!(taken.is_empty());
    }

    #[test]
    fn holders_aggregate_per_resource() {
        let store = MemoryLockStore::new();
        let first = running(
            100,
            promotion_with_locks(1, "project", &[Lock::new("db", LockMode::Read)]),
        );
        let second = queued(promotion_with_locks(
            2,
            "project",
            &[Lock::new("db", LockMode::Read)],
        ));

        let taken = collect_taken_locks(&store, &[first], &[second], "project");
        assert_eq!(taken["db"].read_locks().len(), 2);
    }
}
