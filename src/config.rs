//! Arbiter configuration.
//!
//! The few knobs the arbiter honors are read from the host's string
//! parameter map; unknown parameters are ignored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Host parameter toggling the build-chain composition rule.
pub const RESOURCES_IN_CHAINS_PARAM: &str = "teamcity.sharedResources.resourcesInChains.enabled";

/// Configuration for the lock arbiter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArbiterConfig {
    /// Whether chain members share locks instead of contending for them.
    /// When false, every build goes through the single-build procedure.
    #[serde(default = "default_true")]
    pub resources_in_chains: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ArbiterConfig {
    fn default() -> Self {
        Self {
            resources_in_chains: default_true(),
        }
    }
}

impl ArbiterConfig {
    /// Read configuration from the host's parameter map. Absent parameters
    /// keep their defaults.
    pub fn from_host_params(params: &BTreeMap<String, String>) -> Self {
        let resources_in_chains = params
            .get(RESOURCES_IN_CHAINS_PARAM)
            .map(|value| value.trim().eq_ignore_ascii_case("true"))
            .unwrap_or_else(default_true);
        Self {
            resources_in_chains,
        }
    }
}
