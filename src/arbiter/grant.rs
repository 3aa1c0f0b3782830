//! Per-kind grant rules.
//!
//! One dispatching check per resource kind, evaluated against the
//! (possibly chain-adjusted) taken-lock view and the in-cycle affinity
//! reservations of other promotions.

use std::collections::BTreeSet;

use crate::model::{Lock, LockMode, Quota, Resource, ResourceKind, TakenLock};

/// Whether `lock` is grantable against the current state of its resource.
///
/// `taken` is the tally for this resource (chain holders already
/// subtracted); `affinity_others` holds the values other promotions
/// reserved on this resource in the current cycle, and is empty for
/// quoted resources.
pub(crate) fn check_against_resource(
    lock: &Lock,
    resource: &Resource,
    taken: &TakenLock,
    affinity_others: &BTreeSet<String>,
) -> bool {
    match &resource.kind {
        ResourceKind::Quoted { quota } => check_quoted(lock, *quota, taken),
        ResourceKind::Custom { values } => check_custom(lock, values, taken, affinity_others),
    }
}

fn check_quoted(lock: &Lock, quota: Quota, taken: &TakenLock) -> bool {
    match lock.mode {
        LockMode::Read => {
            if taken.has_write_locks() {
                return false;
            }
            match quota {
                Quota::Infinite => true,
                Quota::Finite(limit) => (taken.read_locks().len() as u32) < limit,
            }
        }
        LockMode::Write => !taken.has_read_locks() && !taken.has_write_locks(),
    }
}

fn check_custom(
    lock: &Lock,
    pool: &[String],
    taken: &TakenLock,
    affinity_others: &BTreeSet<String>,
) -> bool {
    match lock.mode {
        LockMode::Read => {
            // A write lock with no value claims the whole resource.
            if taken.has_all_write_lock() {
                return false;
            }
            let mut taken_values = taken.taken_values();
            taken_values.extend(affinity_others.iter().cloned());
            if lock.value.is_empty() {
                // ANY: some pool value must still be free.
                pool.iter().any(|value| !taken_values.contains(value))
            } else {
                !taken_values.contains(&lock.value)
            }
        }
        LockMode::Write => {
            if lock.value.is_empty() {
                // ALL: exclusive over the whole resource.
                !taken.has_read_locks() && !taken.has_write_locks()
            } else {
                // Specific writes on distinct values coexist; the only
                // contention for a specific write is its exact value.
                !taken.taken_values().contains(&lock.value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PromotionId;

    fn slots() -> Resource {
        Resource::custom("slots_id", "project", "slots", ["v1", "v2", "v3"])
    }

    fn taken_with(locks: &[(PromotionId, Lock)]) -> TakenLock {
        let mut taken = TakenLock::new();
        for (holder, lock) in locks {
            taken.add_lock(*holder, Some("Bt"), lock);
        }
        taken
    }

    fn no_affinity() -> BTreeSet<String> {
        BTreeSet::new()
    }

    #[test]
    fn quoted_read_respects_quota() {
        let resource = Resource::quoted("r", "project", "db", 2);
        let read = Lock::new("db", LockMode::Read);

        let one_reader = taken_with(&[(1, read.clone())]);
        assert!(check_against_resource(&read, &resource, &one_reader, &no_affinity()));

        let two_readers = taken_with(&[(1, read.clone()), (2, read.clone())]);
        assert!(!check_against_resource(&read, &resource, &two_readers, &no_affinity()));
    }

    #[test]
    fn quoted_infinite_read_never_runs_out() {
        let resource = Resource::infinite("r", "project", "db");
        let read = Lock::new("db", LockMode::Read);
        let many: Vec<(PromotionId, Lock)> = (0..100).map(|i| (i, read.clone())).collect();
        assert!(check_against_resource(&read, &resource, &taken_with(&many), &no_affinity()));
    }

    #[test]
    fn quoted_write_holder_blocks_reads() {
        let resource = Resource::quoted("r", "project", "db", 3);
        let taken = taken_with(&[(1, Lock::new("db", LockMode::Write))]);
        assert!(!check_against_resource(
            &Lock::new("db", LockMode::Read),
            &resource,
            &taken,
            &no_affinity()
        ));
    }

    #[test]
    fn quoted_write_requires_exclusive_access() {
        let resource = Resource::quoted("r", "project", "db", 3);
        let write = Lock::new("db", LockMode::Write);

        assert!(check_against_resource(&write, &resource, &TakenLock::new(), &no_affinity()));

        let reader = taken_with(&[(1, Lock::new("db", LockMode::Read))]);
        assert!(!check_against_resource(&write, &resource, &reader, &no_affinity()));

        let writer = taken_with(&[(1, write.clone())]);
        assert!(!check_against_resource(&write, &resource, &writer, &no_affinity()));
    }

    #[test]
    fn custom_read_any_needs_a_free_value() {
        let read_any = Lock::new("slots", LockMode::Read);

        let two_taken = taken_with(&[
            (1, Lock::with_value("slots", LockMode::Read, "v1")),
            (2, Lock::with_value("slots", LockMode::Write, "v2")),
        ]);
        assert!(check_against_resource(&read_any, &slots(), &two_taken, &no_affinity()));

        let all_taken = taken_with(&[
            (1, Lock::with_value("slots", LockMode::Read, "v1")),
            (2, Lock::with_value("slots", LockMode::Read, "v2")),
            (3, Lock::with_value("slots", LockMode::Read, "v3")),
        ]);
        assert!(!check_against_resource(&read_any, &slots(), &all_taken, &no_affinity()));
    }

    #[test]
    fn custom_read_any_counts_affinity_reservations() {
        let read_any = Lock::new("slots", LockMode::Read);
        let taken = taken_with(&[(1, Lock::with_value("slots", LockMode::Read, "v1"))]);

        let one_reserved = BTreeSet::from(["v2".to_string()]);
        assert!(check_against_resource(&read_any, &slots(), &taken, &one_reserved));

        let pool_exhausted = BTreeSet::from(["v2".to_string(), "v3".to_string()]);
        assert!(!check_against_resource(&read_any, &slots(), &taken, &pool_exhausted));
    }

    #[test]
    fn custom_all_write_blocks_every_read() {
        let taken = taken_with(&[(1, Lock::new("slots", LockMode::Write))]);
        assert!(!check_against_resource(
            &Lock::new("slots", LockMode::Read),
            &slots(),
            &taken,
            &no_affinity()
        ));
        assert!(!check_against_resource(
            &Lock::with_value("slots", LockMode::Read, "v3"),
            &slots(),
            &taken,
            &no_affinity()
        ));
    }

    #[test]
    fn custom_specific_read_checks_its_value() {
        let taken = taken_with(&[(1, Lock::with_value("slots", LockMode::Read, "v1"))]);
        assert!(!check_against_resource(
            &Lock::with_value("slots", LockMode::Read, "v1"),
            &slots(),
            &taken,
            &no_affinity()
        ));
        assert!(check_against_resource(
            &Lock::with_value("slots", LockMode::Read, "v2"),
            &slots(),
            &taken,
            &no_affinity()
        ));
        // A reservation on the value denies it just like a running holder.
        assert!(!check_against_resource(
            &Lock::with_value("slots", LockMode::Read, "v2"),
            &slots(),
            &taken,
            &BTreeSet::from(["v2".to_string()])
        ));
    }

    #[test]
    fn custom_all_write_requires_exclusive_access() {
        let all_write = Lock::new("slots", LockMode::Write);
        assert!(check_against_resource(&all_write, &slots(), &TakenLock::new(), &no_affinity()));

        let reader = taken_with(&[(1, Lock::with_value("slots", LockMode::Read, "v1"))]);
        assert!(!check_against_resource(&all_write, &slots(), &reader, &no_affinity()));
    }

    #[test]
    fn custom_specific_writes_on_distinct_values_coexist() {
        let taken = taken_with(&[(1, Lock::with_value("slots", LockMode::Write, "v1"))]);
        assert!(check_against_resource(
            &Lock::with_value("slots", LockMode::Write, "v2"),
            &slots(),
            &taken,
            &no_affinity()
        ));
        assert!(!check_against_resource(
            &Lock::with_value("slots", LockMode::Write, "v1"),
            &slots(),
            &taken,
            &no_affinity()
        ));
    }
}
