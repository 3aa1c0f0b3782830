//! Shared fixtures for unit tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::extractor::{self, LOCKS_FEATURE_PARAM_KEY};
use crate::host::{BuildPromotion, QueuedBuild, RunningBuild};
use crate::model::{BuildId, Lock, PromotionId, Resource};
use crate::registry::ResourceRegistry;

pub(crate) const PROJECT: &str = "project";

/// Registry with a single root project holding the given resources.
pub(crate) fn single_project_registry(
    resources: impl IntoIterator<Item = Resource>,
) -> ResourceRegistry {
    let mut registry = ResourceRegistry::new();
    registry.add_project(PROJECT, None);
    for resource in resources {
        registry.add_resource(resource).unwrap();
    }
    registry
}

/// A promotion in `project` declaring the given locks through the feature
/// encoding, with build type `Bt<id>`.
pub(crate) fn promotion_with_locks(
    id: PromotionId,
    project: &str,
    locks: &[Lock],
) -> Arc<BuildPromotion> {
    Arc::new(
        BuildPromotion::new(id)
            .in_project(project)
            .of_build_type(format!("Bt{}", id))
            .with_feature(BTreeMap::from([(
                LOCKS_FEATURE_PARAM_KEY.to_string(),
                extractor::as_feature_param(locks),
            )])),
    )
}

pub(crate) fn running(build_id: BuildId, promotion: Arc<BuildPromotion>) -> RunningBuild {
    RunningBuild::new(build_id, promotion)
}

pub(crate) fn queued(promotion: Arc<BuildPromotion>) -> QueuedBuild {
    QueuedBuild::new(promotion)
}
