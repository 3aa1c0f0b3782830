//! The arbitration decision core.
//!
//! One call per queued build per scheduling pass: given the runtime
//! snapshot, either clear the build to start (returning `None` and
//! reserving any custom-resource values that had to be picked) or return a
//! wait reason. The arbiter never raises to the scheduler; internal
//! failures are logged and resolved toward a grant, because blocking a
//! build on an internal bug is worse than proceeding.
//!
//! # Decision procedure
//!
//! 1. Prune the affinity set to promotions still alive this pass.
//! 2. Grant silently when the promotion has no project or no build
//!    configuration (nothing can be attributed), or declares no locks.
//! 3. Short-circuit misconfigured builds with a configuration-error wait
//!    reason.
//! 4. Under the pass-level critical section: snapshot the taken locks for
//!    the project, evaluate every desired lock through the per-kind grant
//!    rules (chain-aware when the build is part of a composite chain), and
//!    on success reserve the picked values and stamp them onto the
//!    promotion.
//!
//! In emulation mode the decision is computed identically but every side
//! effect (affinity write, attribute stamp, audit record) is suppressed.

mod chain;
mod grant;


use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde_json::json;
use tracing::{debug, error, warn};

use crate::affinity::ResourceAffinity;
use crate::audit::{AuditAction, AuditEvent, AuditLog};
use crate::collector;
use crate::config::ArbiterConfig;
use crate::extractor;
use crate::host::{BuildPromotion, QueuedBuild, RunningBuild};
use crate::inspector::ConfigurationInspector;
use crate::model::{Lock, LockMode, Resource, ResourceKind, TakenLock};
use crate::registry::ResourceRegistry;
use crate::store::LockStore;
use crate::waitreason::{self, WaitReason};

use chain::ChainLocks;

/// Attribute prefix under which picked values are stamped onto the
/// promotion, completed by the resource id.
pub const RESERVED_ATTRIBUTE_PREFIX: &str = "teamcity.sharedResources.reserved.";

/// Everything the host hands the arbiter for one decision.
#[derive(Clone, Copy)]
pub struct ArbitrationRequest<'a> {
    /// The queued build under consideration.
    pub queued: &'a QueuedBuild,

    /// Builds currently executing.
    pub running: &'a [RunningBuild],

    /// Peer queued builds already cleared to start in this cycle. Must not
    /// include the build under consideration.
    pub cleared: &'a [QueuedBuild],

    /// Resource definitions for this cycle.
    pub registry: &'a ResourceRegistry,

    /// When set, the decision is returned but every side effect is
    /// suppressed.
    pub emulation: bool,
}

/// The lock arbiter. Lives across the arbitration calls of a scheduling
/// pass; the affinity set inside it is the only state shared between
/// calls.
pub struct LockArbiter {
    store: Arc<dyn LockStore>,
    affinity: ResourceAffinity,
    config: ArbiterConfig,
    audit: Option<AuditLog>,
    /// Serializes the read-tally/read-affinity/decide/write-affinity
    /// sequence so concurrent calls cannot interleave value picks.
    pass_guard: Mutex<()>,
}

impl LockArbiter {
    pub fn new(store: Arc<dyn LockStore>, config: ArbiterConfig) -> Self {
        Self {
            store,
            affinity: ResourceAffinity::new(),
            config,
            audit: None,
            pass_guard: Mutex::new(()),
        }
    }

    /// Attach an audit log recording grants and denials.
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// The in-cycle reservation set, exposed for monitoring.
    pub fn affinity(&self) -> &ResourceAffinity {
        &self.affinity
    }

    /// Decide whether the queued build can start now.
    ///
    /// Returns `None` to authorize the start, or a wait reason naming
    /// every unavailable resource and its current holders.
    pub fn arbitrate(&self, req: &ArbitrationRequest<'_>) -> Option<WaitReason> {
        let promotion = &req.queued.promotion;

        let mut live: BTreeSet<_> = req.running.iter().map(|rb| rb.promotion.id()).collect();
        live.extend(req.cleared.iter().map(|qb| qb.promotion.id()));
        live.insert(promotion.id());
        self.affinity.actualize(&live);

        let Some(project_id) = promotion.project_id() else {
            debug!(promotion = promotion.id(), "no project on promotion, granting");
            return None;
        };
        if promotion.build_type_id().is_none() {
            debug!(promotion = promotion.id(), "no build configuration on promotion, granting");
            return None;
        }

        let locks = extractor::from_promotion(promotion);
        if locks.is_empty() {
            return None;
        }

        let errors = ConfigurationInspector::new(req.registry).inspect(project_id, &locks);
        if !errors.is_empty() {
            let reason = waitreason::configuration_error_reason(&errors);
            self.record_denial(promotion, &reason, req.emulation);
            return Some(reason);
        }

        // Critical section: the taken-lock snapshot, the affinity reads,
        // the decision, and the reservation must not interleave with
        // another arbitration's pick on the same resources.
        let _pass = self
            .pass_guard
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());

        let taken =
            collector::collect_taken_locks(self.store.as_ref(), req.running, req.cleared, project_id);
        let resources = match req.registry.resolve(project_id) {
            Ok(resources) => resources,
            Err(e) => {
                // The inspector resolved this project moments ago. Grant
                // rather than block a build on an internal inconsistency.
                error!(
                    promotion = promotion.id(),
                    error = %e,
                    "project resolution failed mid-decision, granting"
                );
                return None;
            }
        };

        let chained = self.config.resources_in_chains
            && promotion.depends_on().iter().any(|parent| parent.is_composite());
        let decision = if chained {
            self.arbitrate_chain(req.running, promotion, &locks, &taken, &resources, req.emulation)
        } else {
            self.arbitrate_single(
                promotion,
                &locks,
                &taken,
                &resources,
                &ChainLocks::default(),
                req.emulation,
            )
        };

        match decision {
            Ok(()) => {
                self.record_grant(promotion, req.emulation);
                None
            }
            Err(reason) => {
                self.record_denial(promotion, &reason, req.emulation);
                Some(reason)
            }
        }
    }

    /// Single-build grant procedure against a chain-adjusted view.
    fn arbitrate_single(
        &self,
        promotion: &BuildPromotion,
        locks: &[Lock],
        taken: &BTreeMap<String, TakenLock>,
        resources: &BTreeMap<String, Resource>,
        chain: &ChainLocks,
        emulation: bool,
    ) -> Result<(), WaitReason> {
        let unavailable = self.unavailable_locks(promotion, locks, taken, resources, chain);
        if !unavailable.is_empty() {
            return Err(waitreason::unavailable_locks_reason(taken, &unavailable));
        }
        if !emulation {
            self.reserve_values(promotion, locks, taken, resources, chain);
        }
        Ok(())
    }

    /// The desired locks that fail their per-kind grant rule.
    fn unavailable_locks(
        &self,
        promotion: &BuildPromotion,
        locks: &[Lock],
        taken: &BTreeMap<String, TakenLock>,
        resources: &BTreeMap<String, Resource>,
        chain: &ChainLocks,
    ) -> Vec<Lock> {
        let mut unavailable = Vec::new();
        for lock in locks {
            let Some(resource) = resources.get(&lock.name) else {
                // Undefined names were reported by the inspector already.
                continue;
            };
            let view = chain.view_for(&lock.name, taken);
            let affinity_others = if resource.is_custom() {
                self.affinity.other_assigned_values(resource, promotion.id())
            } else {
                BTreeSet::new()
            };
            if !grant::check_against_resource(lock, resource, &view, &affinity_others) {
                unavailable.push(lock.clone());
            }
        }
        unavailable
    }

    /// Reserve the value every granted custom read lock settles on, record
    /// the picks in the affinity set, and stamp them onto the promotion.
    fn reserve_values(
        &self,
        promotion: &BuildPromotion,
        locks: &[Lock],
        taken: &BTreeMap<String, TakenLock>,
        resources: &BTreeMap<String, Resource>,
        chain: &ChainLocks,
    ) {
        let mut picks = BTreeMap::new();
        for lock in locks {
            let Some(resource) = resources.get(&lock.name) else {
                continue;
            };
            let ResourceKind::Custom { values: pool } = &resource.kind else {
                continue;
            };
            if lock.mode != LockMode::Read {
                continue;
            }

            let chosen = if !lock.value.is_empty() {
                lock.value.clone()
            } else {
                self.pick_free_value(promotion, lock, resource, pool, taken, chain)
            };
            promotion.set_attribute(
                format!("{}{}", RESERVED_ATTRIBUTE_PREFIX, resource.id),
                chosen.clone(),
            );
            picks.insert(resource.id.clone(), chosen);
        }
        if !picks.is_empty() {
            self.affinity.store(promotion.id(), picks);
        }
    }

    /// First pool value neither held nor reserved by another promotion.
    fn pick_free_value(
        &self,
        promotion: &BuildPromotion,
        lock: &Lock,
        resource: &Resource,
        pool: &[String],
        taken: &BTreeMap<String, TakenLock>,
        chain: &ChainLocks,
    ) -> String {
        let view = chain.view_for(&lock.name, taken);
        let mut taken_values = view.taken_values();
        taken_values.extend(self.affinity.other_assigned_values(resource, promotion.id()));

        for value in &taken_values {
            if !pool.contains(value) {
                // A holder kept a value the pool no longer defines; it
                // stays occupied until released.
                warn!(resource = %resource.name, value = %value, "held value is not in the current pool");
            }
        }

        match pool.iter().find(|value| !taken_values.contains(*value)) {
            Some(value) => value.clone(),
            None => {
                // The grant rule saw a free value; losing it here means a
                // pick raced or a rule is wrong. The build still starts.
                warn!(
                    promotion = promotion.id(),
                    resource = %resource.name,
                    "no free value left for a granted lock"
                );
                String::new()
            }
        }
    }

    fn record_grant(&self, promotion: &BuildPromotion, emulation: bool) {
        if emulation {
            return;
        }
        debug!(promotion = promotion.id(), "build granted");
        if let Some(audit) = &self.audit {
            audit.append_best_effort(
                &AuditEvent::new(AuditAction::Granted).for_promotion(promotion.id()),
            );
        }
    }

    fn record_denial(&self, promotion: &BuildPromotion, reason: &WaitReason, emulation: bool) {
        if emulation {
            return;
        }
        debug!(promotion = promotion.id(), reason = %reason, "build denied");
        if let Some(audit) = &self.audit {
            audit.append_best_effort(
                &AuditEvent::new(AuditAction::Denied)
                    .for_promotion(promotion.id())
                    .with_details(json!({ "reason": reason.description() })),
            );
        }
    }
}
