//! Core data model: resources, locks, and taken-lock tallies.
//!
//! Resources and lock holders are referred to by stable string and numeric
//! ids rather than object references, decoupling the model's lifetime from
//! the host scheduler's build objects.

mod lock;
mod resource;
mod taken;

pub use lock::{Lock, LockMode};
pub use resource::{Quota, Resource, ResourceKind};
pub use taken::{HeldValue, TakenLock};

/// Scheduler-side identity of a build promotion. Outlives the build's
/// queued and running transitions.
pub type PromotionId = u64;

/// Identity of a running build. Addresses persisted lock records.
pub type BuildId = u64;
