//! Lock extraction from build declarations.
//!
//! Builds declare locks in one of two encodings:
//!
//! - Primary: the feature parameter `locks-param`, whose value is a
//!   newline-separated block of `name<SP>mode[<SP>value]` records with
//!   `mode` one of `readLock` / `writeLock`.
//! - Legacy: individual build parameters of the form
//!   `teamcity.locks.<mode>.<name>` with the value as the parameter value.
//!   Used when reading locks from a build that is already running, whose
//!   original feature may no longer be reachable.
//!
//! Duplicate names within one build's declarations collapse to the first
//! occurrence. Unparsable records are skipped with a debug log rather than
//! failing the build.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::host::BuildPromotion;
use crate::model::{Lock, LockMode};

/// Feature parameter holding the serialized lock declarations.
pub const LOCKS_FEATURE_PARAM_KEY: &str = "locks-param";

/// Prefix of the legacy per-lock build parameters.
pub const LEGACY_LOCK_PREFIX: &str = "teamcity.locks.";

/// Parse the serialized feature-parameter block into locks.
pub fn from_feature_param_value(serialized: &str) -> Vec<Lock> {
    let mut seen = BTreeSet::new();
    let mut locks = Vec::new();
    for line in serialized.lines() {
        match Lock::from_feature_line(line) {
            Some(lock) => {
                if seen.insert(lock.name.clone()) {
                    locks.push(lock);
                }
            }
            None => {
                if !line.trim().is_empty() {
                    debug!(line, "skipping unparsable lock record");
                }
            }
        }
    }
    locks
}

/// Extract locks from one feature's parameter map.
pub fn from_feature_params(params: &BTreeMap<String, String>) -> Vec<Lock> {
    params
        .get(LOCKS_FEATURE_PARAM_KEY)
        .map(|serialized| from_feature_param_value(serialized))
        .unwrap_or_default()
}

/// Extract locks from the legacy `teamcity.locks.<mode>.<name>` build
/// parameters.
pub fn from_build_parameters(params: &BTreeMap<String, String>) -> Vec<Lock> {
    let mut locks = Vec::new();
    let mut seen = BTreeSet::new();
    for (key, value) in params {
        let Some(rest) = key.strip_prefix(LEGACY_LOCK_PREFIX) else {
            continue;
        };
        let Some((mode_str, name)) = rest.split_once('.') else {
            debug!(key = %key, "skipping legacy lock parameter without a name");
            continue;
        };
        let Some(mode) = LockMode::parse(mode_str) else {
            debug!(key = %key, "skipping legacy lock parameter with unknown mode");
            continue;
        };
        if name.is_empty() {
            continue;
        }
        if seen.insert(name.to_string()) {
            locks.push(Lock::with_value(name, mode, value.clone()));
        }
    }
    locks
}

/// Extract the locks a promotion declares.
///
/// Prefers the feature encoding; falls back to the legacy build
/// parameters when no feature declares any locks.
pub fn from_promotion(promotion: &BuildPromotion) -> Vec<Lock> {
    let mut seen = BTreeSet::new();
    let mut locks = Vec::new();
    for params in promotion.feature_params() {
        for lock in from_feature_params(params) {
            if seen.insert(lock.name.clone()) {
                locks.push(lock);
            }
        }
    }
    if locks.is_empty() {
        locks = from_build_parameters(promotion.build_params());
    }
    locks
}

/// Serialize locks to the feature-parameter block form, one record per
/// line, newline-terminated.
pub fn as_feature_param(locks: &[Lock]) -> String {
    let mut out = String::new();
    for lock in locks {
        out.push_str(&lock.to_feature_line());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn parses_feature_block() {
        let locks = from_feature_param_value("db readLock\nslots writeLock v1\n");
        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0], Lock::new("db", LockMode::Read));
        assert_eq!(locks[1], Lock::with_value("slots", LockMode::Write, "v1"));
    }

    #[test]
    fn duplicates_keep_first_occurrence() {
        let locks = from_feature_param_value("db readLock\ndb writeLock\n");
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].mode, LockMode::Read);
    }

    #[test]
    fn unparsable_lines_are_skipped() {
        let locks = from_feature_param_value("db readLock\ngarbage\n\nslots writeLock\n");
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn legacy_parameters_round_trip_modes() {
        let params = BTreeMap::from([
            ("teamcity.locks.readLock.db".to_string(), String::new()),
            (
                "teamcity.locks.writeLock.slots".to_string(),
                "v1".to_string(),
            ),
            ("unrelated.parameter".to_string(), "x".to_string()),
            ("teamcity.locks.badMode.db".to_string(), String::new()),
        ]);
        let locks = from_build_parameters(&params);
        assert_eq!(locks.len(), 2);
        assert_eq!(locks[0], Lock::new("db", LockMode::Read));
        assert_eq!(locks[1], Lock::with_value("slots", LockMode::Write, "v1"));
    }

    #[test]
    fn promotion_prefers_feature_encoding() {
        let promotion = BuildPromotion::new(1)
            .with_feature(BTreeMap::from([(
                LOCKS_FEATURE_PARAM_KEY.to_string(),
                "db readLock\n".to_string(),
            )]))
            .with_build_params(BTreeMap::from([(
                "teamcity.locks.writeLock.slots".to_string(),
                String::new(),
            )]));
        let locks = from_promotion(&promotion);
        assert_eq!(locks, vec![Lock::new("db", LockMode::Read)]);
    }

    #[test]
    fn promotion_falls_back_to_legacy_parameters() {
        let promotion = Arc::new(BuildPromotion::new(1).with_build_params(BTreeMap::from([(
            "teamcity.locks.writeLock.slots".to_string(),
            "v2".to_string(),
        )])));
        let locks = from_promotion(&promotion);
        assert_eq!(locks, vec![Lock::with_value("slots", LockMode::Write, "v2")]);
    }

    #[test]
    fn promotion_without_declarations_yields_nothing() {
        let promotion = BuildPromotion::new(1);
        assert!(from_promotion(&promotion).is_empty());
    }

    #[test]
    fn serializer_matches_parser() {
        let locks = vec![
            Lock::new("db", LockMode::Read),
            Lock::with_value("slots", LockMode::Write, "v1"),
        ];
        let serialized = as_feature_param(&locks);
        assert_eq!(serialized, "db readLock\nslots writeLock v1\n");
        assert_eq!(from_feature_param_value(&serialized), locks);
    }
}
