//! Wait-reason formatting.
//!
//! A denial names every unavailable resource and, when known, the build
//! configurations currently holding it:
//!
//! ```text
//! Build is waiting for the following resource to become available: db (locked by Bt1, Bt2)
//! ```
//!
//! The holder list is deduplicated, lexicographically sorted, and omitted
//! when empty, which happens for denials caused purely by in-cycle
//! reservations where no running holder exists yet.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::inspector::ConfigError;
use crate::model::{Lock, TakenLock};

/// Why a queued build cannot start this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitReason {
    description: String,
}

impl WaitReason {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl std::fmt::Display for WaitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description)
    }
}

/// Format the wait reason for a set of unavailable locks.
pub fn unavailable_locks_reason(
    taken: &BTreeMap<String, TakenLock>,
    unavailable: &[Lock],
) -> WaitReason {
    let mut names = Vec::new();
    let mut seen = BTreeSet::new();
    for lock in unavailable {
        if seen.insert(lock.name.as_str()) {
            names.push(lock.name.as_str());
        }
    }

    let mut description = format!(
        "Build is waiting for the following {} to become available: ",
        if names.len() > 1 {
            "resources"
        } else {
            "resource"
        }
    );
    for (index, name) in names.iter().enumerate() {
        if index > 0 {
            description.push_str(", ");
        }
        description.push_str(name);
        if let Some(tally) = taken.get(*name) {
            let holders = tally.holder_build_types();
            if !holders.is_empty() {
                description.push_str(" (locked by ");
                let list: Vec<&str> = holders.iter().map(String::as_str).collect();
                description.push_str(&list.join(", "));
                description.push(')');
            }
        }
    }
    WaitReason::new(description)
}

/// Format the wait reason for a misconfigured build.
pub fn configuration_error_reason(errors: &[ConfigError]) -> WaitReason {
    let messages: Vec<&str> = errors.iter().map(|error| error.message.as_str()).collect();
    WaitReason::new(format!(
        "Build can not be started because of a shared resources configuration error: {}",
        messages.join("; ")
    ))
}
