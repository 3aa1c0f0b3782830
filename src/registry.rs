//! Resource registry resolved over the project hierarchy.
//!
//! Projects form a tree; a resource is defined at one project and is
//! visible to that project's whole subtree. A descendant project may
//! override an ancestor's definition by reusing its name; the nearest
//! definition wins. Resolution walks the project path root first, leaf
//! last, so the order is deterministic.
//!
//! The registry is a per-cycle snapshot handed in by the host scheduler.
//! [`ResourceRegistry::resolve`] returns an owned map, safe to iterate
//! while other builds are being arbitrated.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ArbiterError, Result};
use crate::model::Resource;

#[derive(Debug, Clone, Default)]
struct ProjectEntry {
    parent: Option<String>,
    resources: Vec<Resource>,
}

/// Snapshot of projects and the resources they define.
#[derive(Debug, Clone, Default)]
pub struct ResourceRegistry {
    projects: BTreeMap<String, ProjectEntry>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a project. The root project has no parent.
    pub fn add_project(&mut self, id: impl Into<String>, parent: Option<&str>) {
        self.projects.insert(
            id.into(),
            ProjectEntry {
                parent: parent.map(str::to_string),
                resources: Vec::new(),
            },
        );
    }

    /// Attach a resource definition to its project.
    ///
    /// Duplicate names at the same project level are accepted here; the
    /// configuration inspector reports them as errors.
    pub fn add_resource(&mut self, resource: Resource) -> Result<()> {
        let entry = self
            .projects
            .get_mut(&resource.project_id)
            .ok_or_else(|| ArbiterError::UnknownProject(resource.project_id.clone()))?;
        entry.resources.push(resource);
        Ok(())
    }

    /// Resources defined at this project only, in definition order.
    pub fn own_resources(&self, project_id: &str) -> &[Resource] {
        self.projects
            .get(project_id)
            .map(|entry| entry.resources.as_slice())
            .unwrap_or(&[])
    }

    /// The project path from the root down to `project_id`.
    pub fn project_path(&self, project_id: &str) -> Result<Vec<&str>> {
        let mut path = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(project_id);
        while let Some(id) = current {
            let (key, entry) = self
                .projects
                .get_key_value(id)
                .ok_or_else(|| ArbiterError::UnknownProject(id.to_string()))?;
            if !seen.insert(key.as_str()) {
                // A parent cycle would otherwise loop forever.
                break;
            }
            path.push(key.as_str());
            current = entry.parent.as_deref();
        }
        path.reverse();
        Ok(path)
    }

    /// The effective view for a project: name to nearest definition.
    ///
    /// Walks the project path root first so that a leafward definition
    /// replaces an ancestor's definition of the same name. When a project
    /// defines the same name twice, the later definition lands in the map;
    /// the inspector flags that configuration separately.
    pub fn resolve(&self, project_id: &str) -> Result<BTreeMap<String, Resource>> {
        let mut effective = BTreeMap::new();
        for id in self.project_path(project_id)? {
            for resource in self.own_resources(id) {
                effective.insert(resource.name.clone(), resource.clone());
            }
        }
        Ok(effective)
    }
}
