//! Configuration inspection.
//!
//! Detects build lock declarations that can never be granted because the
//! configuration itself is broken: locks referencing a resource no project
//! in scope defines, and resource names defined more than once at the same
//! project level. The arbiter consults the inspector up front and
//! short-circuits misconfigured builds with a configuration-error wait
//! reason instead of silently denying them.

use std::collections::BTreeMap;

use crate::model::Lock;
use crate::registry::ResourceRegistry;

/// Kind of configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// The lock's name resolves to no resource in the project scope.
    UndefinedResource,
    /// The resolved resource's name is defined more than once at the same
    /// project level.
    DuplicateName,
}

/// One configuration error attributed to a lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError {
    pub lock_name: String,
    pub kind: ConfigErrorKind,
    pub message: String,
}

/// Inspects lock declarations against a registry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct ConfigurationInspector<'a> {
    registry: &'a ResourceRegistry,
}

impl<'a> ConfigurationInspector<'a> {
    pub fn new(registry: &'a ResourceRegistry) -> Self {
        Self { registry }
    }

    /// Check the locks a build declares within its project scope.
    pub fn inspect(&self, project_id: &str, locks: &[Lock]) -> Vec<ConfigError> {
        let Ok(effective) = self.registry.resolve(project_id) else {
            // The project itself is gone; every lock is unresolvable.
            return locks
                .iter()
                .map(|lock| ConfigError {
                    lock_name: lock.name.clone(),
                    kind: ConfigErrorKind::UndefinedResource,
                    message: format!(
                        "lock '{}' cannot be resolved: project '{}' not found",
                        lock.name, project_id
                    ),
                })
                .collect();
        };

        let mut errors = Vec::new();
        for lock in locks {
            match effective.get(&lock.name) {
                None => errors.push(ConfigError {
                    lock_name: lock.name.clone(),
                    kind: ConfigErrorKind::UndefinedResource,
                    message: format!(
                        "lock '{}' references a resource not defined in project '{}' or its ancestors",
                        lock.name, project_id
                    ),
                }),
                Some(resource) => {
                    let definitions = self
                        .registry
                        .own_resources(&resource.project_id)
                        .iter()
                        .filter(|candidate| candidate.name == lock.name)
                        .count();
                    if definitions > 1 {
                        errors.push(ConfigError {
                            lock_name: lock.name.clone(),
                            kind: ConfigErrorKind::DuplicateName,
                            message: format!(
                                "resource '{}' is defined {} times in project '{}'",
                                lock.name, definitions, resource.project_id
                            ),
                        });
                    }
                }
            }
        }
        errors
    }

    /// Like [`inspect`](Self::inspect), keyed by lock name.
    pub fn inspect_as_map(&self, project_id: &str, locks: &[Lock]) -> BTreeMap<String, ConfigError> {
        self.inspect(project_id, locks)
            .into_iter()
            .map(|error| (error.lock_name.clone(), error))
            .collect()
    }
}
