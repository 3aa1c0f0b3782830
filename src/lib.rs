//! Gatelock: shared-resource lock arbiter for CI build scheduling.
//!
//! Builds declare named locks against shared resources; the scheduler asks
//! this crate, for each queued build it is about to start, whether all of
//! the build's locks are currently grantable given the builds already
//! running, the builds already cleared to start in the same scheduling
//! cycle, and the arbiter's own in-cycle reservations. A grantable build
//! gets its multi-valued picks reserved atomically so later decisions in
//! the same cycle stay consistent; a non-grantable build gets a
//! human-readable wait reason.
//!
//! # Architecture
//!
//! - [`registry`]: resource definitions resolved over the project
//!   hierarchy (nearest definition wins).
//! - [`extractor`]: locks a build declares, read from its feature
//!   parameters or the legacy per-lock build parameters.
//! - [`collector`]: per-resource tally of locks currently held by
//!   running and cleared-to-start builds.
//! - [`store`]: persistent record of the locks a running build actually
//!   acquired, so its tally survives the build's parameter lifecycle.
//! - [`affinity`]: in-cycle reservations of custom-resource value picks.
//! - [`arbiter`]: the decision core, including the build-chain rule that
//!   lets chain members share locks instead of contending for them.
//! - [`inspector`]: detection of locks referencing undefined or
//!   duplicated resources.
//! - [`waitreason`]: human-readable denial messages naming the
//!   unavailable resources and their current holders.
//!
//! The arbiter never raises to the scheduler: every arbitration returns
//! either a grant (`None`) or a [`waitreason::WaitReason`].

pub mod affinity;
pub mod arbiter;
pub mod audit;
pub mod collector;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fs;
pub mod host;
pub mod inspector;
pub mod model;
pub mod registry;
pub mod store;
pub mod waitreason;

#[cfg(test)]
mod test_support;

pub use affinity::ResourceAffinity;
pub use arbiter::{ArbitrationRequest, LockArbiter};
pub use config::ArbiterConfig;
pub use error::{ArbiterError, Result};
pub use host::{BuildPromotion, QueuedBuild, RunningBuild};
pub use model::{BuildId, Lock, LockMode, PromotionId, Quota, Resource, ResourceKind, TakenLock};
pub use registry::ResourceRegistry;
pub use store::{FileLockStore, LockStore, MemoryLockStore};
pub use waitreason::WaitReason;
