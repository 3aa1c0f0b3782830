//! Shared resource definitions.
//!
//! A resource is identified by (project scope, name) and comes in two
//! kinds: quoted resources are capacity-based semaphores with a numeric or
//! infinite quota; custom resources are finite pools of distinct string
//! values where each value is a unit of allocation. The per-kind grant
//! rules live in the arbiter and dispatch on [`ResourceKind`].

use serde::{Deserialize, Serialize};

/// Capacity of a quoted resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quota {
    /// At most this many simultaneous read holders.
    Finite(u32),
    /// No capacity limit.
    Infinite,
}

impl Quota {
    pub fn is_infinite(&self) -> bool {
        matches!(self, Quota::Infinite)
    }
}

/// The kind of a shared resource, with its kind-specific definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResourceKind {
    /// Semaphore-like resource with a capacity and no distinguishable
    /// value identities.
    Quoted { quota: Quota },
    /// Finite set of distinct string values (the value pool).
    Custom { values: Vec<String> },
}

/// A shared resource definition.
///
/// `name` is unique within a project; a descendant project may override a
/// name defined by an ancestor. `id` is a stable identity distinct from
/// the name, used for affinity stamping so renames do not invalidate
/// reservations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Stable string id, distinct from the name.
    pub id: String,

    /// Id of the project the resource is defined in.
    pub project_id: String,

    /// Resource name, unique within its project.
    pub name: String,

    /// Kind-specific definition.
    pub kind: ResourceKind,
}

impl Resource {
    /// Create a quoted resource with a finite quota.
    pub fn quoted(
        id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
        quota: u32,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            kind: ResourceKind::Quoted {
                quota: Quota::Finite(quota),
            },
        }
    }

    /// Create a quoted resource with infinite quota.
    pub fn infinite(
        id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            kind: ResourceKind::Quoted {
                quota: Quota::Infinite,
            },
        }
    }

    /// Create a custom resource from its value pool.
    pub fn custom(
        id: impl Into<String>,
        project_id: impl Into<String>,
        name: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            name: name.into(),
            kind: ResourceKind::Custom {
                values: values.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self.kind, ResourceKind::Custom { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_constructor_sets_finite_quota() {
        let r = Resource::quoted("r1", "project", "db", 3);
        assert_eq!(
            r.kind,
            ResourceKind::Quoted {
                quota: Quota::Finite(3)
            }
        );
        assert!(!r.is_custom());
    }

    #[test]
    fn infinite_constructor_has_no_cap() {
        let r = Resource::infinite("r1", "project", "db");
        match r.kind {
            ResourceKind::Quoted { quota } => assert!(quota.is_infinite()),
            _ => panic!("expected quoted resource"),
        }
    }

    #[test]
    fn custom_constructor_preserves_pool_order() {
        let r = Resource::custom("r1", "project", "slots", ["a", "b", "c"]);
        assert!(r.is_custom());
        match &r.kind {
            ResourceKind::Custom { values } => assert_eq!(values, &["a", "b", "c"]),
            _ => panic!("expected custom resource"),
        }
    }
}
